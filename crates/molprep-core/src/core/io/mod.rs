//! Provides input/output functionality for molecular file formats.
//!
//! Every format implements [`traits::MolecularFile`]. Readers take a
//! [`profile::Tolerance`] in their options that decides whether recoverable defects
//! are errors or logged and worked around.

pub mod mmcif;
pub mod pdb;
pub mod profile;
pub mod sdf;
pub mod traits;
