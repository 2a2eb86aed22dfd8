//! # molprep Core Library
//!
//! Reading, writing and preparing molecular structures for downstream scoring.
//!
//! ## Architectural Philosophy
//!
//! The library is split into two layers:
//!
//! - **[`core`]: The Foundation.** Data models (`MolecularSystem`), the SDF, mmCIF and
//!   PDB codecs, the named I/O profiles that decide fault tolerance, the compound
//!   library, assembly expansion and the scoped logging controls.
//!
//! - **[`workflows`]: The Public API.** Complete preparation procedures built on
//!   [`core`]: hydrogen cleanup, biological assembly construction, entity
//!   classification, non-polymer extraction and sequence mapping.

pub mod core;
pub mod workflows;
