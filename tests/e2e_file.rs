//! End-to-end integration tests for FileBackend-backed containers.
//!
//! Each test works in its own temp directory, closes the container, and
//! reopens the file to check what actually reached disk.

use pretty_assertions::assert_eq;
use qcstore::export::export_to_string;
use qcstore::{
    BackendConfig, Container, ContainerConfig, Error, FileBackend, OpenMode, Record, Schema,
    Status, StorageBackend, TypeTag,
};

fn schema() -> Schema {
    let mut s = Schema::new(TypeTag::Base);
    let molecules = s.append_child(s.root(), TypeTag::MoleculeGroup);
    let molecule = s.append_child(molecules, TypeTag::Molecule);
    s.append_child(molecule, TypeTag::Geometry);
    s.append_child(molecule, TypeTag::Orbitals);
    s
}

#[test]
fn test_new_close_old_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("ethanol.qcs");

    {
        let mut c = Container::open_file(&file, OpenMode::New, Some(schema())).unwrap();
        c.add_group("/Molecules", TypeTag::MoleculeGroup).unwrap();
        c.add_group("/Molecules/Ethanol", TypeTag::Molecule).unwrap();

        let mut orbitals = Record::new("scf", TypeTag::Orbitals);
        orbitals.set_attribute("basis", "cc-pVDZ");
        orbitals.set_attribute("nbasis", 48u32);
        orbitals.create_array_2d::<f64>(48, 48).fill_sequential();
        orbitals.create_array_1d::<f64>(48).zero();
        c.write("/Molecules/Ethanol", &orbitals).unwrap();
        c.close().unwrap();
    }
    assert!(file.is_file());

    let mut c = Container::open_file(&file, OpenMode::Old, Some(schema())).unwrap();
    let mut back = Record::new("", TypeTag::Orbitals);
    c.read("/Molecules/Ethanol/scf", &mut back).unwrap();

    assert_eq!(back.get_attribute::<String>("basis").as_deref(), Some("cc-pVDZ"));
    assert_eq!(back.get_attribute::<u32>("nbasis"), Some(48));
    let coefficients = back.array_as::<f64, 2>(0).unwrap();
    assert_eq!(coefficients[[47, 47]], (48 * 48 - 1) as f64);
    assert_eq!(back.array_as::<f64, 1>(1).unwrap().len(), 48);
}

#[test]
fn test_drop_flushes_pending_writes() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("store.qcs");

    {
        let mut c = Container::open_file(&file, OpenMode::New, Some(schema())).unwrap();
        c.add_group("/Molecules", TypeTag::MoleculeGroup).unwrap();
        assert!(c.backend().is_dirty());
    }

    let c = Container::open_file(&file, OpenMode::Old, None).unwrap();
    assert_eq!(c.type_at("/Molecules"), TypeTag::MoleculeGroup);
}

#[test]
fn test_open_mode_matrix_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("matrix.qcs");

    assert!(matches!(
        Container::open_file(&file, OpenMode::Old, None),
        Err(Error::StorageError(_))
    ));
    assert!(!file.exists());

    Container::open_file(&file, OpenMode::New, Some(schema())).unwrap();
    assert!(matches!(
        Container::open_file(&file, OpenMode::New, Some(schema())),
        Err(Error::AlreadyExists(_))
    ));

    let replacement = Schema::new(TypeTag::Project);
    let c = Container::open_file(&file, OpenMode::Overwrite, Some(replacement.clone())).unwrap();
    assert_eq!(c.schema(), Some(&replacement));
    drop(c);

    assert!(matches!(
        Container::open_file(&file, OpenMode::Old, Some(schema())),
        Err(Error::SchemaMismatch { .. })
    ));
}

#[test]
fn test_corrupt_file_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("corrupt.qcs");
    std::fs::write(&file, b"{ not a store").unwrap();

    let mut c = Container::new(FileBackend::new(&file));
    assert!(matches!(c.open(OpenMode::Old, None), Err(Error::StorageError(_))));
    assert_eq!(c.status(), Status::Error);
}

#[test]
fn test_backend_config_drives_container() {
    let dir = tempfile::tempdir().unwrap();
    let json = format!(
        r#"{{"kind": "file", "path": {}}}"#,
        serde_json::to_string(&dir.path().join("configured.qcs")).unwrap()
    );
    let backend: BackendConfig = serde_json::from_str(&json).unwrap();
    let config = ContainerConfig::from_json(r#"{"diagnostics": "verbose"}"#).unwrap();

    let mut c = Container::connect(&backend, config);
    c.open(OpenMode::New, Some(schema())).unwrap();
    c.add_group("/Molecules", TypeTag::MoleculeGroup).unwrap();
    c.flush().unwrap();
    assert!(dir.path().join("configured.qcs").is_file());
    assert!(c.backend().target_exists());
}

#[test]
fn test_export_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("export.qcs");

    {
        let mut c = Container::open_file(&file, OpenMode::New, Some(schema())).unwrap();
        c.add_group("/Molecules", TypeTag::MoleculeGroup).unwrap();
        c.add_group("/Molecules/Water", TypeTag::Molecule).unwrap();
        let mut geom = Record::geometry("eq");
        geom.create_array_2d::<f64>(3, 3).zero();
        c.write("/Molecules/Water", &geom).unwrap();
    }

    let c = Container::open_file(&file, OpenMode::Old, None).unwrap();
    let listing = export_to_string(&c).unwrap();
    assert!(listing.starts_with("/ {\n"));
    assert!(listing.contains("  Group: Molecules [MoleculeGroup] {\n"));
    assert!(listing.contains("    Group: Water [Molecule] {\n"));
    assert!(listing.contains("      Group: eq [Geometry] {\n"));
    assert!(listing.contains("        Attribute: units = \"Bohr\"\n"));
    assert!(listing.contains("        Dataset: 0 f64 (3, 3)\n"));
    assert!(listing.ends_with("}\n"));
}

#[test]
fn test_non_finite_doubles_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("nan.qcs");

    {
        let mut c = Container::open_file(&file, OpenMode::New, Some(schema())).unwrap();
        c.add_group("/Molecules", TypeTag::MoleculeGroup).unwrap();
        c.add_group("/Molecules/Water", TypeTag::Molecule).unwrap();

        let mut geom = Record::geometry("g");
        geom.set_attribute("energy", f64::NAN);
        geom.create_array_1d::<f64>(4)
            .as_mut_slice()
            .copy_from_slice(&[1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY]);
        c.write("/Molecules/Water", &geom).unwrap();

        let mut sibling = Record::geometry("h");
        sibling.create_array_1d::<i32>(2).fill_sequential();
        c.write("/Molecules/Water", &sibling).unwrap();
        c.close().unwrap();
    }

    let mut c = Container::open_file(&file, OpenMode::Old, Some(schema())).unwrap();
    let mut back = Record::geometry("");
    c.read("/Molecules/Water/g", &mut back).unwrap();
    assert!(back.get_attribute::<f64>("energy").unwrap().is_nan());
    let values = back.array_as::<f64, 1>(0).unwrap().as_slice();
    assert_eq!(values[0], 1.0);
    assert!(values[1].is_nan());
    assert_eq!(values[2], f64::INFINITY);
    assert_eq!(values[3], f64::NEG_INFINITY);

    let mut sibling = Record::geometry("");
    c.read("/Molecules/Water/h", &mut sibling).unwrap();
    assert_eq!(sibling.array_as::<i32, 1>(0).unwrap().as_slice(), &[0, 1]);
}

#[test]
fn test_dataset_with_overflowing_extents_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("tampered.qcs");
    std::fs::write(
        &file,
        r#"{"nodes":{
            "/":{"Group":{"attributes":[],"children":["0"]}},
            "/0":{"Dataset":{"extents":[4294967296,4294967296],"data":{"type":"Int32","values":[]}}}
        }}"#,
    )
    .unwrap();

    let mut c = Container::new(FileBackend::new(&file));
    match c.open(OpenMode::Old, None) {
        Err(Error::StorageError(message)) => assert!(message.contains("do not match")),
        other => panic!("expected StorageError, got {other:?}"),
    }
    assert_eq!(c.status(), Status::Error);
}
