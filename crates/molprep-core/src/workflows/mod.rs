//! # Workflows Module
//!
//! High-level preparation procedures that take a structure file to a scoring-ready
//! system.
//!
//! ## Architecture
//!
//! - **Preparation** ([`prep`]) - mmCIF and PDB preparation pipelines
//! - **Configuration** ([`config`]) - Validated options for a preparation run
//! - **Progress** ([`progress`]) - Phase reporting for long-running callers
//! - **Errors** ([`error`]) - Failures a preparation run can report, with categories
//!
//! Every stage that can recover from incomplete input does so only when the resolved
//! fault tolerance allows it, logging a warning for each fallback taken.

pub mod config;
pub mod error;
pub mod prep;
pub mod progress;
