//! Named I/O profiles controlling how strictly readers treat malformed input.
//!
//! A process-wide registry holds the built-in `STRICT`, `SLOPPY` and `DEFAULT`
//! profiles. `DEFAULT` is consulted whenever a caller neither passes an explicit
//! fault-tolerance flag nor names a profile. Changing `DEFAULT` is intentional
//! global configuration: every later read without an override sees the new value.
//!
//! The registry sits behind a `RwLock`, so concurrent access is memory safe, but a
//! parse that starts while another thread is swapping `DEFAULT` may observe either
//! value. Confine mutation of `DEFAULT` to one coordinating thread, or serialize it
//! with the parses that depend on it.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{LazyLock, RwLock};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PROFILE: &str = "DEFAULT";
pub const STRICT_PROFILE: &str = "STRICT";
pub const SLOPPY_PROFILE: &str = "SLOPPY";

/// Format-policy flags applied by readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IoProfile {
    /// Accept non-standard extensions and skip malformed records instead of failing.
    #[serde(default)]
    pub fault_tolerant: bool,
}

impl IoProfile {
    pub const STRICT: IoProfile = IoProfile {
        fault_tolerant: false,
    };
    pub const SLOPPY: IoProfile = IoProfile {
        fault_tolerant: true,
    };
}

/// Value assigned to a registry entry: a profile, or the name of a profile to copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSource {
    Profile(IoProfile),
    Named(String),
}

impl From<IoProfile> for ProfileSource {
    fn from(profile: IoProfile) -> Self {
        ProfileSource::Profile(profile)
    }
}

impl From<&str> for ProfileSource {
    fn from(name: &str) -> Self {
        ProfileSource::Named(name.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Unknown I/O profile '{0}'")]
    Unknown(String),
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("The global profile registry lock is poisoned")]
    Poisoned,
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: HashMap<String, IoProfile>,
}

/// Name to profile mapping. A `DEFAULT` entry always exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRegistry {
    profiles: HashMap<String, IoProfile>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(STRICT_PROFILE.to_string(), IoProfile::STRICT);
        profiles.insert(SLOPPY_PROFILE.to_string(), IoProfile::SLOPPY);
        profiles.insert(DEFAULT_PROFILE.to_string(), IoProfile::STRICT);
        Self { profiles }
    }
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Result<IoProfile, ProfileError> {
        self.profiles
            .get(name)
            .copied()
            .ok_or_else(|| ProfileError::Unknown(name.to_string()))
    }

    /// Stores `source` under `name`. A named source is copied, so later changes to
    /// the source entry do not propagate.
    pub fn set(&mut self, name: &str, source: impl Into<ProfileSource>) -> Result<(), ProfileError> {
        let profile = match source.into() {
            ProfileSource::Profile(profile) => profile,
            ProfileSource::Named(other) => self.get(&other)?,
        };
        self.profiles.insert(name.to_string(), profile);
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(|name| name.as_str())
    }

    /// Merges the `[profiles.<NAME>]` tables of a TOML file into the registry.
    pub fn load(&mut self, path: &Path) -> Result<(), ProfileError> {
        let content = std::fs::read_to_string(path).map_err(|e| ProfileError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: ProfileFile = toml::from_str(&content).map_err(|e| ProfileError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        for (name, profile) in file.profiles {
            debug!("Loaded I/O profile '{}' ({:?})", name, profile);
            self.profiles.insert(name, profile);
        }
        Ok(())
    }
}

static GLOBAL_REGISTRY: LazyLock<RwLock<ProfileRegistry>> =
    LazyLock::new(|| RwLock::new(ProfileRegistry::default()));

/// Reads a profile from the process-wide registry.
pub fn global_get(name: &str) -> Result<IoProfile, ProfileError> {
    GLOBAL_REGISTRY
        .read()
        .map_err(|_| ProfileError::Poisoned)?
        .get(name)
}

/// Writes a profile into the process-wide registry.
pub fn global_set(name: &str, source: impl Into<ProfileSource>) -> Result<(), ProfileError> {
    GLOBAL_REGISTRY
        .write()
        .map_err(|_| ProfileError::Poisoned)?
        .set(name, source)
}

/// Merges profiles from a TOML file into the process-wide registry.
pub fn global_load(path: &Path) -> Result<(), ProfileError> {
    GLOBAL_REGISTRY
        .write()
        .map_err(|_| ProfileError::Poisoned)?
        .load(path)
}

/// Replaces the global `DEFAULT` profile and restores the previous one on drop.
#[must_use = "DEFAULT is restored as soon as the guard is dropped"]
pub struct DefaultProfileGuard {
    previous: IoProfile,
}

impl DefaultProfileGuard {
    pub fn set(source: impl Into<ProfileSource>) -> Result<Self, ProfileError> {
        let previous = global_get(DEFAULT_PROFILE)?;
        global_set(DEFAULT_PROFILE, source)?;
        Ok(Self { previous })
    }
}

impl Drop for DefaultProfileGuard {
    fn drop(&mut self) {
        if let Ok(mut registry) = GLOBAL_REGISTRY.write() {
            registry
                .profiles
                .insert(DEFAULT_PROFILE.to_string(), self.previous);
        }
    }
}

/// How a caller selects fault tolerance for a single operation.
///
/// Resolution order: an explicit flag wins, then a named profile, then `DEFAULT`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Tolerance {
    #[default]
    Default,
    Profile(String),
    Explicit(bool),
}

impl Tolerance {
    pub fn profile(name: impl Into<String>) -> Self {
        Tolerance::Profile(name.into())
    }

    pub fn resolve(&self) -> Result<bool, ProfileError> {
        match self {
            Tolerance::Explicit(flag) => Ok(*flag),
            Tolerance::Profile(name) => Ok(global_get(name)?.fault_tolerant),
            Tolerance::Default => Ok(global_get(DEFAULT_PROFILE)?.fault_tolerant),
        }
    }
}

impl From<bool> for Tolerance {
    fn from(flag: bool) -> Self {
        Tolerance::Explicit(flag)
    }
}
