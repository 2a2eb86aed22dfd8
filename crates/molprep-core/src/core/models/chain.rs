use super::ids::ResidueId;
use std::fmt;

/// Structured chain identifier.
///
/// Chains copied into a biological assembly carry the assembly instance they were
/// generated for. Keeping the instance separate from the original name means chain
/// names that themselves contain `.` never have to be split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainName {
    pub instance: Option<String>,
    pub name: String,
}

impl ChainName {
    /// A chain name as found in the asymmetric unit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            instance: None,
            name: name.into(),
        }
    }

    /// A chain name generated for an assembly instance.
    pub fn with_instance(instance: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            instance: Some(instance.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ChainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => write!(f, "{}.{}", instance, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl From<&str> for ChainName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub name: ChainName,                 // Structured chain identifier
    pub author_name: Option<String>,     // Author-provided chain id, when it differs
    pub(crate) residues: Vec<ResidueId>, // Ordered list of residue IDs belonging to this chain
}

impl Chain {
    pub(crate) fn new(name: ChainName) -> Self {
        Self {
            name,
            author_name: None,
            residues: Vec::new(),
        }
    }

    pub fn residues(&self) -> &[ResidueId] {
        &self.residues
    }
}
