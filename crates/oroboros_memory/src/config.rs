//! # Memory Configuration
//!
//! Startup description of every context the engine needs, loaded once from
//! TOML:
//!
//! ```toml
//! [identity]
//! mode = "seeded"
//! seed = 42
//!
//! [[contexts]]
//! name = "physics"
//! capacity = 262144
//!
//! [[contexts]]
//! name = "graphics"
//! capacity = 2097152
//! debug = true
//! label_bytes = 1024
//! safe_ptr_bytes = 2048
//! event_capacity = 256
//! ```
//!
//! A missing `[identity]` table means monotonic ids.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    CONFIG_CONTEXT_BYTES, DEFAULT_EVENT_CAPACITY, DEFAULT_LABEL_BYTES, DEFAULT_SAFE_PTR_BYTES,
    GAME_CONTEXT_BYTES, GRAPHICS_CONTEXT_BYTES, MAX_CONTEXTS, PHYSICS_CONTEXT_BYTES,
};
use crate::debug::DebugLayout;

/// Errors that can occur while loading a memory config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`MemoryConfig`].
    #[error("failed to parse memory config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config parsed but describes an impossible setup.
    #[error("invalid memory config: {0}")]
    Invalid(String),
}

/// How context IDs are assigned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdMode {
    /// Counting up from zero.
    #[default]
    Monotonic,
    /// Drawn from a seeded ChaCha generator.
    Seeded,
}

/// `[identity]` table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// ID assignment mode.
    #[serde(default)]
    pub mode: IdMode,
    /// Seed for [`IdMode::Seeded`].
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_label_bytes() -> usize {
    DEFAULT_LABEL_BYTES
}

fn default_safe_ptr_bytes() -> usize {
    DEFAULT_SAFE_PTR_BYTES
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

/// One `[[contexts]]` entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Subsystem name, unique within the config.
    pub name: String,
    /// Heap size in bytes.
    pub capacity: usize,
    /// Whether to build a debug context.
    #[serde(default)]
    pub debug: bool,
    /// Label region size (debug only).
    #[serde(default = "default_label_bytes")]
    pub label_bytes: usize,
    /// Safe-pointer region size (debug only).
    #[serde(default = "default_safe_ptr_bytes")]
    pub safe_ptr_bytes: usize,
    /// Event ring capacity (debug only).
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl ContextConfig {
    /// A plain context entry.
    #[must_use]
    pub fn plain(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_owned(),
            capacity,
            debug: false,
            label_bytes: DEFAULT_LABEL_BYTES,
            safe_ptr_bytes: DEFAULT_SAFE_PTR_BYTES,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Region split for a debug entry.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the regions leave no user region.
    pub fn layout(&self) -> Result<DebugLayout, ConfigError> {
        DebugLayout::split(self.capacity, self.label_bytes, self.safe_ptr_bytes).map_err(|err| {
            ConfigError::Invalid(format!("context '{}': {err}", self.name))
        })
    }
}

/// The complete memory config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Context ID assignment.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Contexts to create, in order.
    #[serde(default)]
    pub contexts: Vec<ContextConfig>,
}

impl Default for MemoryConfig {
    /// The engine's four subsystem arenas.
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            contexts: vec![
                ContextConfig::plain("config", CONFIG_CONTEXT_BYTES),
                ContextConfig::plain("game", GAME_CONTEXT_BYTES),
                ContextConfig::plain("physics", PHYSICS_CONTEXT_BYTES),
                ContextConfig::plain("graphics", GRAPHICS_CONTEXT_BYTES),
            ],
        }
    }
}

impl MemoryConfig {
    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`], [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loading memory config from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Checks the config for impossible setups.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for a seeded mode without seed, zero
    /// capacities, duplicate names, too many contexts, or debug regions that
    /// leave no user region.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.mode == IdMode::Seeded && self.identity.seed.is_none() {
            return Err(ConfigError::Invalid(String::from(
                "identity mode 'seeded' requires a seed",
            )));
        }
        if self.contexts.len() > MAX_CONTEXTS {
            return Err(ConfigError::Invalid(format!(
                "{} contexts configured, at most {MAX_CONTEXTS} allowed",
                self.contexts.len()
            )));
        }

        for (position, context) in self.contexts.iter().enumerate() {
            if context.name.is_empty() {
                return Err(ConfigError::Invalid(format!("context #{position} has no name")));
            }
            if context.capacity == 0 {
                return Err(ConfigError::Invalid(format!(
                    "context '{}' has zero capacity",
                    context.name
                )));
            }
            if self.contexts[..position].iter().any(|other| other.name == context.name) {
                return Err(ConfigError::Invalid(format!(
                    "context '{}' is defined twice",
                    context.name
                )));
            }
            if context.debug {
                context.layout()?;
            }
        }
        Ok(())
    }

    /// Serializes the config back to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
