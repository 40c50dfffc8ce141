//! Configuration file support
//!
//! Loads settings from ~/.ctxlight.toml (or %USERPROFILE%\.ctxlight.toml on
//! Windows). Every key is optional.
//!
//! Example:
//! ```toml
//! enabled = true
//! grammar_dirs = ["/usr/share/ctxlight/grammars"]
//!
//! [engine]
//! max_stack_depth = 256
//! max_transitions_per_offset = 64
//! step_budget_per_char = 4096
//! ```

use std::fs;
use std::path::PathBuf;

use log::warn;
use serde::Deserialize;

use crate::error::Result;

/// Limits that keep a broken grammar from stalling a line scan
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pushes beyond this depth are dropped
    pub max_stack_depth: usize,
    /// Non-consuming transitions at one offset before one char is forced through
    pub max_transitions_per_offset: usize,
    /// Rule-loop iterations allowed per character of a line
    pub step_budget_per_char: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: 256,
            max_transitions_per_offset: 64,
            step_budget_per_char: 4096,
        }
    }
}

/// Configuration settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether highlighting is enabled at all
    pub enabled: bool,
    /// Extra directories scanned for `*.toml` grammar definitions
    pub grammar_dirs: Vec<PathBuf>,
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            grammar_dirs: Vec::new(),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            std::env::var("USERPROFILE")
                .ok()
                .map(|home| PathBuf::from(home).join(".ctxlight.toml"))
        }

        #[cfg(not(windows))]
        {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".ctxlight.toml"))
        }
    }

    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Config::default();
        };
        let Ok(contents) = fs::read_to_string(&path) else {
            return Config::default();
        };
        match Self::parse(&contents) {
            Ok(config) => config,
            Err(err) => {
                warn!("ignoring {}: {}", path.display(), err);
                Config::default()
            }
        }
    }

    /// Parse config file contents
    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        config.engine.max_stack_depth = config.engine.max_stack_depth.max(1);
        config.engine.step_budget_per_char = config.engine.step_budget_per_char.max(16);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let contents = r#"
# Comment
enabled = false
grammar_dirs = ["/tmp/grammars"]

[engine]
max_stack_depth = 32
        "#;

        let config = Config::parse(contents).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.grammar_dirs, vec![PathBuf::from("/tmp/grammars")]);
        assert_eq!(config.engine.max_stack_depth, 32);
        assert_eq!(config.engine.max_transitions_per_offset, 64);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::parse("").unwrap();
        assert!(config.enabled);
        assert!(config.grammar_dirs.is_empty());
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_limits_are_clamped() {
        let config = Config::parse("[engine]\nmax_stack_depth = 0\nstep_budget_per_char = 1\n").unwrap();
        assert_eq!(config.engine.max_stack_depth, 1);
        assert_eq!(config.engine.step_budget_per_char, 16);
    }

    #[test]
    fn test_malformed_config() {
        assert!(Config::parse("enabled = maybe").is_err());
    }
}
