//! # Core Module
//!
//! The building blocks every preparation workflow is assembled from.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, residues, chains, bonds and systems
//! - **File I/O** ([`io`]) - SDF (V2000/V3000), mmCIF and PDB codecs, plus the I/O profile registry
//! - **Chemical Knowledge** ([`compounds`]) - Component dictionary and residue annotation
//! - **Assemblies** ([`assembly`]) - Operator expressions and biological unit construction
//! - **Diagnostics** ([`logging`], [`error`]) - Scoped verbosity and error categories
//! - **Utilities** ([`utils`]) - Residue identifiers and bond perception

pub mod assembly;
pub mod compounds;
pub mod error;
pub mod io;
pub mod logging;
pub mod models;
pub mod utils;
