//! End-to-end integration tests for writing and reading records.
//!
//! Records go through `Container::write` / `Container::read` against
//! MemoryBackend; attributes and arrays must come back exactly.

use pretty_assertions::assert_eq;
use qcstore::storage::{Dataset, DatasetBuffer};
use qcstore::{AnyArray, Array, Container, Error, MemoryBackend, Record, Schema, StorageBackend, TypeTag};

fn container() -> Container<MemoryBackend> {
    let schema = Schema::deserialize("Base [ Molecule [ Geometry Calculation [ Property ] ] ]").unwrap();
    let mut c = Container::open_memory(schema).unwrap();
    c.add_group("/Ethanol", TypeTag::Molecule).unwrap();
    c
}

// ============================================================================
// 1. The canonical geometry round trip
// ============================================================================

#[test]
fn test_geometry_round_trip() {
    let mut c = container();

    let mut geom = Record::geometry("initial");
    geom.set_attribute("theory", "b3lyp");
    geom.set_attribute("energy", 3.1415);
    geom.set_attribute("n", 5);
    let a = geom.create_array_2d::<i32>(2, 3);
    for (i, row) in [[1, 2, 3], [4, 5, 6]].iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            a[[i, j]] = *v;
        }
    }
    c.write("/Ethanol", &geom).unwrap();

    let mut back = Record::geometry("");
    c.read("/Ethanol/initial", &mut back).unwrap();

    assert_eq!(back.label(), "initial");
    assert_eq!(back.attributes(), geom.attributes());
    assert_eq!(back.get_attribute::<String>("theory").as_deref(), Some("b3lyp"));
    assert_eq!(back.get_attribute::<f64>("energy"), Some(3.1415));
    assert_eq!(back.get_attribute::<i32>("n"), Some(5));

    let array = back.array_as::<i32, 2>(0).unwrap();
    assert_eq!(array.dims(), &[2, 3]);
    assert_eq!(array[[0, 2]], 3);
    assert_eq!(array[[1, 0]], 4);
    assert_eq!(back, geom);
}

// ============================================================================
// 2. Heterogeneous arrays keep their order, rank and kind
// ============================================================================

#[test]
fn test_mixed_arrays_round_trip() {
    let mut c = container();

    let mut calc = Record::calculation("scf");
    calc.create_array_1d::<i32>(4).fill_sequential();
    calc.create_array_2d::<f64>(4, 6).fill_sequential();
    calc.create_array_3d::<f64>(3, 4, 8).fill_sequential();
    calc.create_array_3d::<i32>(2, 2, 2).zero();
    calc.push_array(Array::<f64, 1>::from_vec([2], vec![0.5, -0.5]).unwrap());
    c.write("/Ethanol", &calc).unwrap();

    let mut back = Record::calculation("scf");
    c.read("/Ethanol/scf", &mut back).unwrap();

    let shapes: Vec<(usize, Vec<usize>)> =
        back.arrays().iter().map(|a| (a.rank(), a.dims().to_vec())).collect();
    assert_eq!(
        shapes,
        vec![
            (1, vec![4]),
            (2, vec![4, 6]),
            (3, vec![3, 4, 8]),
            (3, vec![2, 2, 2]),
            (1, vec![2]),
        ]
    );
    assert!(matches!(back.array(1), Some(AnyArray::Double2(_))));
    assert!(matches!(back.array(3), Some(AnyArray::Int3(_))));
    assert_eq!(back.array_as::<f64, 3>(2).unwrap()[[2, 3, 7]], 95.0);
    assert_eq!(back, calc);
}

// ============================================================================
// 3. Rewriting a record replaces it
// ============================================================================

#[test]
fn test_rewrite_replaces_contents() {
    let mut c = container();

    let mut prop = Record::calculation("dipole");
    prop.set_attribute("units", "Debye");
    prop.create_array_1d::<f64>(3).fill_sequential();
    prop.create_array_1d::<f64>(3).zero();
    c.write("/Ethanol", &prop).unwrap();

    let mut shorter = Record::calculation("dipole");
    shorter.set_attribute("units", "au");
    shorter.create_array_1d::<f64>(3).zero();
    c.write("/Ethanol", &shorter).unwrap();

    let mut back = Record::calculation("dipole");
    c.read("/Ethanol/dipole", &mut back).unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back.get_attribute::<String>("units").as_deref(), Some("au"));
}

// ============================================================================
// 4. Nested records and schema placement
// ============================================================================

#[test]
fn test_property_under_calculation() {
    let mut c = container();
    c.write("/Ethanol", &Record::calculation("scf")).unwrap();

    let mut energy = Record::property("energy");
    energy.set_attribute("value", -154.9);
    c.write("/Ethanol/scf", &energy).unwrap();

    // not directly under the molecule, nor under a geometry
    assert!(matches!(c.write("/Ethanol", &energy), Err(Error::SchemaViolation { .. })));
    c.write("/Ethanol", &Record::geometry("g")).unwrap();
    assert!(matches!(c.write("/Ethanol/g", &energy), Err(Error::SchemaViolation { .. })));

    let mut back = Record::default();
    c.read("/Ethanol/scf/energy", &mut back).unwrap();
    assert_eq!(back.tag(), TypeTag::Property);
    assert_eq!(back.get_attribute::<f64>("value"), Some(-154.9));
}

#[test]
fn test_reading_a_calculation_skips_nested_records() {
    let mut c = container();
    let mut calc = Record::calculation("scf");
    calc.create_array_1d::<f64>(2).zero();
    c.write("/Ethanol", &calc).unwrap();
    c.write("/Ethanol/scf", &Record::property("energy")).unwrap();

    let mut back = Record::calculation("");
    c.read("/Ethanol/scf", &mut back).unwrap();
    assert_eq!(back.len(), 1);
}

// ============================================================================
// 5. Failures
// ============================================================================

#[test]
fn test_read_with_mismatched_tag() {
    let mut c = container();
    c.write("/Ethanol", &Record::geometry("g")).unwrap();

    let mut wrong = Record::calculation("");
    let err = c.read("/Ethanol/g", &mut wrong).unwrap_err();
    assert!(matches!(
        err,
        Error::TypeMismatch { expected: TypeTag::Calculation, found: TypeTag::Geometry, .. }
    ));
    assert!(c.last_error().is_some_and(|e| e.contains("Type mismatch")));
}

#[test]
fn test_unsupported_dataset_is_reported_but_rest_is_read() {
    let mut c = container();
    let mut geom = Record::geometry("g");
    geom.create_array_1d::<f64>(3).fill_sequential();
    c.write("/Ethanol", &geom).unwrap();

    // a foreign writer left single-precision data next to ours
    let mut store = c.backend().clone();
    let floats = Dataset::new(&[2], DatasetBuffer::Float32(vec![1.0, 2.0])).unwrap();
    store.write_dataset("/Ethanol/g/1", floats).unwrap();

    let mut back = Record::geometry("");
    match c.read("/Ethanol/g", &mut back) {
        Err(Error::PartialFailure { failed: 1, total: 2, .. }) => {}
        other => panic!("expected PartialFailure, got {other:?}"),
    }
    assert_eq!(back.len(), 1);
    assert_eq!(back.array_as::<f64, 1>(0).unwrap().as_slice(), &[0.0, 1.0, 2.0]);
}

#[test]
fn test_read_missing_record() {
    let mut c = container();
    assert!(matches!(
        c.read("/Ethanol/nothing", &mut Record::default()),
        Err(Error::NotFound(_))
    ));
}
