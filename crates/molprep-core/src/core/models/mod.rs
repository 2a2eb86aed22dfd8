//! # Core Models Module
//!
//! This module contains the molecular graph that every reader produces and every
//! writer consumes.
//!
//! ## Overview
//!
//! A [`system::MolecularSystem`] owns chains, residues and atoms in slot maps and keeps
//! a bond list with a cached adjacency. The invariants the codecs rely on are:
//!
//! - **Referential integrity** - every bond references two atoms present in the system
//! - **Single ownership** - every atom belongs to exactly one residue, every residue to
//!   exactly one chain
//! - **Stable order** - chains, residues and atoms iterate in the order they were added
//!
//! ## Key Components
//!
//! - [`atom`] - Atoms with element, formal charge and coordinates
//! - [`residue`] - Residues and their chemical class annotation
//! - [`chain`] - Chains and the structured [`chain::ChainName`] identifier
//! - [`system`] - The complete molecular graph
//! - [`topology`] - Bonds and bond orders
//! - [`ids`] - Unique identifier types for atoms, residues, and chains
//!
//! ## Usage
//!
//! ```ignore
//! use molprep::core::models::{atom::Atom, chain::ChainName, system::MolecularSystem};
//!
//! let mut system = MolecularSystem::new();
//! let chain_id = system.add_chain(ChainName::new("A"));
//! let residue_id = system.add_residue(chain_id, 1, None, "ALA").unwrap();
//! system.add_atom_to_residue(residue_id, Atom::new("CA", "C", residue_id, Point3::origin()));
//! ```

pub mod atom;
pub mod chain;
pub mod ids;
pub mod residue;
pub mod system;
pub mod topology;
