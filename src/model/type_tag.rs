//! TypeTag: the closed vocabulary of record kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Semantic kind of a hierarchy node or persisted record.
///
/// The numeric ids are persisted (attribute `DataType`) and must never be
/// reordered. `Base` is the "unset" sentinel and the default; `Invalid` is the
/// "unknown" sentinel produced by failed lookups and unmatched names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum TypeTag {
    #[default]
    Base = 0,
    Group,
    Project,
    Molecule,
    Geometry,
    State,
    Orbitals,
    Calculation,
    Property,
    Externals,
    BasisSet,
    ProjectGroup,
    MoleculeGroup,
    GeometryGroup,
    StateGroup,
    CalculationGroup,
    PropertyGroup,
    Invalid,
}

impl TypeTag {
    /// Every tag, in id order.
    pub const ALL: [TypeTag; 18] = [
        TypeTag::Base,
        TypeTag::Group,
        TypeTag::Project,
        TypeTag::Molecule,
        TypeTag::Geometry,
        TypeTag::State,
        TypeTag::Orbitals,
        TypeTag::Calculation,
        TypeTag::Property,
        TypeTag::Externals,
        TypeTag::BasisSet,
        TypeTag::ProjectGroup,
        TypeTag::MoleculeGroup,
        TypeTag::GeometryGroup,
        TypeTag::StateGroup,
        TypeTag::CalculationGroup,
        TypeTag::PropertyGroup,
        TypeTag::Invalid,
    ];

    /// Tag for a persisted id. Ids outside the vocabulary map to `Invalid`.
    pub fn from_id(id: u32) -> Self {
        Self::ALL.get(id as usize).copied().unwrap_or(TypeTag::Invalid)
    }

    /// Case-insensitive lookup by name. Unmatched names map to `Invalid`.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.name().eq_ignore_ascii_case(name))
            .unwrap_or(TypeTag::Invalid)
    }

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Base => "Base",
            TypeTag::Group => "Group",
            TypeTag::Project => "Project",
            TypeTag::Molecule => "Molecule",
            TypeTag::Geometry => "Geometry",
            TypeTag::State => "State",
            TypeTag::Orbitals => "Orbitals",
            TypeTag::Calculation => "Calculation",
            TypeTag::Property => "Property",
            TypeTag::Externals => "Externals",
            TypeTag::BasisSet => "BasisSet",
            TypeTag::ProjectGroup => "ProjectGroup",
            TypeTag::MoleculeGroup => "MoleculeGroup",
            TypeTag::GeometryGroup => "GeometryGroup",
            TypeTag::StateGroup => "StateGroup",
            TypeTag::CalculationGroup => "CalculationGroup",
            TypeTag::PropertyGroup => "PropertyGroup",
            TypeTag::Invalid => "Invalid",
        }
    }

    /// True for the "unset" sentinel.
    pub fn is_unset(self) -> bool {
        self == TypeTag::Base
    }

    /// True for the "unknown" sentinel.
    pub fn is_invalid(self) -> bool {
        self == TypeTag::Invalid
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TypeTag::from_name(s))
    }
}

impl From<TypeTag> for u32 {
    fn from(tag: TypeTag) -> u32 {
        tag.id()
    }
}
