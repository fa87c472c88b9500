//! Registry configuration
//!
//! Registries read the process-wide default when they are created with
//! [`WeakMulticast::new`](crate::WeakMulticast::new); a registry created with
//! [`WeakMulticast::with_config`](crate::WeakMulticast::with_config) keeps its
//! own copy.


use std::sync::OnceLock;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{WeakError, WeakResult};

/// What an invocation does when a subscriber panics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Stop the scan and let the panic unwind into the caller
    #[default]
    Propagate,
    /// Log the panic, keep calling the remaining subscribers, then resume the
    /// first panic once the scan is complete
    ContinueOnPanic,
}

/// Per-registry settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Panic handling during invocation
    pub dispatch: DispatchPolicy,
}

impl RegistryConfig {
    /// Parse a JSON configuration document
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// ```rust
    /// use weakcast_core::config::{DispatchPolicy, RegistryConfig};
    ///
    /// let config = RegistryConfig::from_json(r#"{ "dispatch": "continue_on_panic" }"#).unwrap();
    /// assert_eq!(config.dispatch, DispatchPolicy::ContinueOnPanic);
    /// ```
    pub fn from_json(source: &str) -> WeakResult<Self> {
        serde_json::from_str(source).map_err(|err| WeakError::Config(err.to_string()))
    }

    pub fn with_dispatch(mut self, dispatch: DispatchPolicy) -> Self {
        self.dispatch = dispatch;
        self
    }
}

static DEFAULT_CONFIG: OnceLock<RwLock<RegistryConfig>> = OnceLock::new();

/// Set the configuration used by registries created afterwards
pub fn set_default_config(config: RegistryConfig) {
    let config_lock = DEFAULT_CONFIG.get_or_init(|| RwLock::new(RegistryConfig::default()));
    *config_lock.write() = config;
}

/// Current process-wide default configuration
pub fn default_config() -> RegistryConfig {
    let config_lock = DEFAULT_CONFIG.get_or_init(|| RwLock::new(RegistryConfig::default()));
    *config_lock.read()
}
