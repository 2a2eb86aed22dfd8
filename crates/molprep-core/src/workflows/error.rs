use crate::core::assembly::AssemblyError;
use crate::core::error::ErrorCategory;
use crate::core::io::mmcif::MmcifError;
use crate::core::io::pdb::PdbError;
use crate::core::io::profile::ProfileError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("Failed to load mmCIF structure: {0}")]
    Mmcif(#[from] MmcifError),

    #[error("Failed to load PDB structure: {0}")]
    Pdb(#[from] PdbError),

    #[error("Could not resolve fault tolerance: {0}")]
    Profile(#[from] ProfileError),

    #[error("Failed to build assembly: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Specified biounit '{0}' not in mmCIF file")]
    BiounitNotFound(String),

    #[error("mmCIF file does not contain entity type information for chains: {}", .chains.join(", "))]
    MissingEntityTypes { chains: Vec<String> },

    #[error(
        "Cannot extract non-polymer entities: mmCIF file does not contain entity type information for chains: {}",
        .chains.join(", ")
    )]
    NonPolymerWithoutEntityTypes { chains: Vec<String> },

    #[error("Expected non-polymer entities to contain exactly 1 residue. Got {count} in chain {chain}")]
    NonPolymerResidueCount { chain: String, count: usize },

    #[error("Non-polymer '{residue}' in chain {chain} is not in the compound library")]
    UnknownCompound { chain: String, residue: String },

    #[error("mmCIF file does not contain SEQRES information for all polymer chains: {}", .chains.join(", "))]
    MissingSequences { chains: Vec<String> },
}

impl PrepError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PrepError::Mmcif(_) | PrepError::Pdb(_) => ErrorCategory::Format,
            PrepError::MissingEntityTypes { .. }
            | PrepError::NonPolymerWithoutEntityTypes { .. }
            | PrepError::NonPolymerResidueCount { .. }
            | PrepError::MissingSequences { .. } => ErrorCategory::Metadata,
            PrepError::Profile(_)
            | PrepError::Assembly(_)
            | PrepError::BiounitNotFound(_)
            | PrepError::UnknownCompound { .. } => ErrorCategory::Lookup,
        }
    }
}
