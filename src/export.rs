//! Hierarchy export: a human-readable listing of everything in a container.
//!
//! ```text
//! / {
//!   Attribute: Schema = "Base [ Molecule [ Geometry ] ]"
//!   Group: Ethanol [Molecule] {
//!     Group: initial [Geometry] {
//!       Attribute: units = "Bohr"
//!       Dataset: 0 f64 (3, 9)
//!     }
//!   }
//! }
//! ```
//!
//! The `DataType` attribute is shown as the bracketed tag after the group
//! name rather than as an attribute line.

use std::io::Write;

use crate::container::Container;
use crate::model::{TypeTag, TAG_ATTRIBUTE};
use crate::path;
use crate::storage::{AttributeValue, NodeKind, StorageBackend};
use crate::{Error, Result};

/// Write the listing of an open container to `writer`.
pub fn export_hierarchy<B: StorageBackend>(
    container: &Container<B>,
    writer: &mut dyn Write,
) -> Result<()> {
    if !container.is_open() {
        return Err(Error::NotOpen(container.status()));
    }
    let backend = container.backend();

    writeln!(writer, "/ {{")?;
    write_group(backend, path::ROOT, 1, writer)?;
    writeln!(writer, "}}")?;
    Ok(())
}

/// [`export_hierarchy`] into a `String`.
pub fn export_to_string<B: StorageBackend>(container: &Container<B>) -> Result<String> {
    let mut buf = Vec::new();
    export_hierarchy(container, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_group<B: StorageBackend>(
    backend: &B,
    group: &str,
    depth: usize,
    writer: &mut dyn Write,
) -> Result<()> {
    let indent = "  ".repeat(depth);

    for (name, value) in backend.attributes(group)? {
        if name == TAG_ATTRIBUTE {
            continue;
        }
        writeln!(writer, "{indent}Attribute: {name} = {value}")?;
    }

    for (name, kind) in backend.children(group)? {
        let child = path::join(group, &name);
        match kind {
            NodeKind::Group => {
                match backend.attribute(&child, TAG_ATTRIBUTE)? {
                    Some(AttributeValue::UInt(id)) => {
                        writeln!(writer, "{indent}Group: {name} [{}] {{", TypeTag::from_id(id))?;
                    }
                    _ => writeln!(writer, "{indent}Group: {name} {{")?,
                }
                write_group(backend, &child, depth + 1, writer)?;
                writeln!(writer, "{indent}}}")?;
            }
            NodeKind::Dataset => {
                let info = backend.dataset_info(&child)?;
                let extents: Vec<String> = info.extents.iter().map(usize::to_string).collect();
                writeln!(
                    writer,
                    "{indent}Dataset: {name} {} ({})",
                    info.element_type,
                    extents.join(", ")
                )?;
            }
        }
    }
    Ok(())
}
