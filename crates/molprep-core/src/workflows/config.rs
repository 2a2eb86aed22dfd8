use crate::core::io::profile::Tolerance;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Options of the mmCIF preparation workflow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrepConfig {
    /// Assembly to build from the asymmetric unit; `None` keeps the asymmetric unit.
    pub biounit: Option<String>,
    /// Return every non-polymer entity as its own system.
    pub extract_nonpoly: bool,
    /// Return entity sequences and the chain to entity mapping.
    pub extract_seqres_mapping: bool,
    pub tolerance: Tolerance,
}

#[derive(Default)]
pub struct PrepConfigBuilder {
    biounit: Option<String>,
    extract_nonpoly: bool,
    extract_seqres_mapping: bool,
    tolerance: Tolerance,
}

impl PrepConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn biounit(mut self, id: impl Into<String>) -> Self {
        self.biounit = Some(id.into());
        self
    }
    pub fn extract_nonpoly(mut self, flag: bool) -> Self {
        self.extract_nonpoly = flag;
        self
    }
    pub fn extract_seqres_mapping(mut self, flag: bool) -> Self {
        self.extract_seqres_mapping = flag;
        self
    }
    pub fn fault_tolerant(mut self, flag: bool) -> Self {
        self.tolerance = Tolerance::Explicit(flag);
        self
    }
    pub fn profile(mut self, name: &str) -> Self {
        self.tolerance = Tolerance::profile(name);
        self
    }

    pub fn build(self) -> Result<PrepConfig, ConfigError> {
        if let Some(id) = &self.biounit {
            if id.trim().is_empty() {
                return Err(ConfigError::InvalidParameter {
                    name: "biounit",
                    reason: "assembly id is empty".to_string(),
                });
            }
        }
        Ok(PrepConfig {
            biounit: self.biounit,
            extract_nonpoly: self.extract_nonpoly,
            extract_seqres_mapping: self.extract_seqres_mapping,
            tolerance: self.tolerance,
        })
    }
}
