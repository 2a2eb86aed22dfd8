//! Macromolecular CIF reader and writer.
//!
//! The reader builds the molecular graph from `_atom_site` (first model, first
//! alternate location of every residue) and collects the entity, sequence and
//! assembly categories into [`MmcifInfo`]. Chains are keyed by `label_asym_id`; the
//! author chain id is kept on [`Chain::author_name`](crate::core::models::chain::Chain).

mod info;
mod lexer;
mod reader;
mod writer;

pub use info::{
    AssemblyGenerator, BioUnitSpec, EntityDesc, MmcifInfo, SequenceRecord, SymmetryOperator,
};
pub use lexer::{Category, CifBlock, Row};

use crate::core::io::profile::{ProfileError, Tolerance};
use crate::core::io::traits::MolecularFile;
use crate::core::models::system::MolecularSystem;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MmcifReadOptions {
    pub tolerance: Tolerance,
}

impl MmcifReadOptions {
    pub fn fault_tolerant(flag: bool) -> Self {
        Self {
            tolerance: Tolerance::Explicit(flag),
        }
    }

    pub fn profile(name: &str) -> Self {
        Self {
            tolerance: Tolerance::profile(name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MmcifWriteOptions {
    /// Name written after `data_`; `"molprep"` when empty.
    pub block_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct MmcifMetadata {
    pub info: MmcifInfo,
    /// Canonical sequences named by `label_asym_id`.
    pub seqres: Vec<SequenceRecord>,
}

#[derive(Debug, Error)]
pub enum MmcifError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: MmcifParseErrorKind,
    },
    #[error("Missing required category: _{0}")]
    MissingCategory(&'static str),
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MmcifParseErrorKind {
    #[error("Text field is never closed")]
    UnterminatedTextField,
    #[error("Tag '{0}' has no value")]
    TagWithoutValue(String),
    #[error("Value outside of any tag or loop")]
    UnexpectedValue,
    #[error("loop_ without tags")]
    LoopWithoutTags,
    #[error("Loop of _{category} has {values} values, not a multiple of its {columns} columns")]
    LoopSizeMismatch {
        category: String,
        columns: usize,
        values: usize,
    },
    #[error("Required field {0} is empty")]
    MissingField(String),
    #[error("Invalid integer in {field} (value: '{value}')")]
    InvalidInt { field: String, value: String },
    #[error("Invalid float in {field} (value: '{value}')")]
    InvalidFloat { field: String, value: String },
}

pub struct MmcifFile;

impl MolecularFile for MmcifFile {
    type Metadata = MmcifMetadata;
    type ReadOptions = MmcifReadOptions;
    type WriteOptions = MmcifWriteOptions;
    type Error = MmcifError;

    fn read_from(
        reader: &mut impl BufRead,
        options: &Self::ReadOptions,
    ) -> Result<(MolecularSystem, Self::Metadata), Self::Error> {
        let fault_tolerant = options.tolerance.resolve()?;
        let block = lexer::parse(reader, fault_tolerant)?;
        reader::read_block(&block, fault_tolerant)
    }

    fn write_to(
        system: &MolecularSystem,
        metadata: &Self::Metadata,
        options: &Self::WriteOptions,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        writer::write_block(system, &metadata.info, &options.block_name, writer)
    }

    fn write_system_to(
        system: &MolecularSystem,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        Self::write_to(
            system,
            &MmcifMetadata::default(),
            &MmcifWriteOptions::default(),
            writer,
        )
    }
}
