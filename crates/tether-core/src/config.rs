#![forbid(unsafe_code)]

//! Engine tuning knobs.
//!
//! # Feature Gate
//!
//! With the `policy-config` feature, [`EngineConfig`] derives serde and can
//! be loaded from TOML or JSON. Missing fields take their defaults.
//!
//! ```
//! use tether_core::EngineConfig;
//!
//! let config = EngineConfig::default()
//!     .with_coalescing(true)
//!     .with_max_flush_rounds(8);
//! assert!(config.coalesce_same_path);
//! assert!(config.notify_descendants);
//! ```

/// Default bound on flush rounds per [`Engine::flush`](crate::Engine::flush).
pub const DEFAULT_MAX_FLUSH_ROUNDS: usize = 64;

/// Behavior switches for one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct EngineConfig {
    /// Merge repeated plain writes to one path while they wait in the queue.
    pub coalesce_same_path: bool,
    /// Also notify routines registered below the written path.
    pub notify_descendants: bool,
    /// Rounds a single flush may run before leaving work queued.
    pub max_flush_rounds: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            coalesce_same_path: false,
            notify_descendants: true,
            max_flush_rounds: DEFAULT_MAX_FLUSH_ROUNDS,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.coalesce_same_path = enabled;
        self
    }

    #[must_use]
    pub fn with_descendant_notifications(mut self, enabled: bool) -> Self {
        self.notify_descendants = enabled;
        self
    }

    /// Bound flush rounds. Zero is raised to one.
    #[must_use]
    pub fn with_max_flush_rounds(mut self, rounds: usize) -> Self {
        self.max_flush_rounds = rounds.max(1);
        self
    }
}

#[cfg(feature = "policy-config")]
mod load {
    use std::fmt;

    use super::EngineConfig;

    /// Errors from loading an [`EngineConfig`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ConfigError {
        /// The TOML document did not parse or did not match the schema.
        Toml(String),
        /// The JSON document did not parse or did not match the schema.
        Json(String),
    }

    impl fmt::Display for ConfigError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Toml(msg) => write!(f, "invalid TOML engine config: {msg}"),
                Self::Json(msg) => write!(f, "invalid JSON engine config: {msg}"),
            }
        }
    }

    impl std::error::Error for ConfigError {}

    impl EngineConfig {
        /// Parse a TOML document.
        pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
            let config: Self =
                toml::from_str(source).map_err(|e| ConfigError::Toml(e.to_string()))?;
            let rounds = config.max_flush_rounds;
            Ok(config.with_max_flush_rounds(rounds))
        }

        /// Parse a JSON document.
        pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
            let config: Self =
                serde_json::from_str(source).map_err(|e| ConfigError::Json(e.to_string()))?;
            let rounds = config.max_flush_rounds;
            Ok(config.with_max_flush_rounds(rounds))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn toml_fills_missing_fields() {
            let config = EngineConfig::from_toml_str("coalesce_same_path = true\n").unwrap();
            assert!(config.coalesce_same_path);
            assert_eq!(config.max_flush_rounds, super::super::DEFAULT_MAX_FLUSH_ROUNDS);
        }

        #[test]
        fn json_clamps_rounds() {
            let config = EngineConfig::from_json_str(r#"{"max_flush_rounds": 0}"#).unwrap();
            assert_eq!(config.max_flush_rounds, 1);
        }

        #[test]
        fn bad_toml_reports_error() {
            let err = EngineConfig::from_toml_str("max_flush_rounds = \"many\"").unwrap_err();
            assert!(matches!(err, ConfigError::Toml(_)));
            assert!(err.to_string().starts_with("invalid TOML"));
        }
    }
}

#[cfg(feature = "policy-config")]
pub use load::ConfigError;
