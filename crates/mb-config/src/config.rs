//! Configuration sections

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Complete macroboard configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroboardConfig {
    pub engine: EngineConfig,
    pub script: ScriptConfig,
    pub logging: LoggingConfig,
}

/// Execution engine and handler timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// WAIT_TIME duration when the action specifies none
    pub default_delay_ms: u64,

    /// Polling interval of the wait handlers
    pub pixel_check_interval_ms: u64,

    /// Timeout of the wait handlers when the action specifies none
    pub default_wait_timeout_ms: u64,

    /// How often a paused run checks for resume/stop
    pub pause_poll_interval_ms: u64,

    /// Maximum RUN_ROW nesting
    pub max_call_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: 1000,
            pixel_check_interval_ms: 100,
            default_wait_timeout_ms: 5000,
            pause_poll_interval_ms: 100,
            max_call_depth: 16,
        }
    }
}

impl EngineConfig {
    pub fn default_delay(&self) -> Duration {
        Duration::from_millis(self.default_delay_ms)
    }

    pub fn pixel_check_interval(&self) -> Duration {
        Duration::from_millis(self.pixel_check_interval_ms)
    }

    pub fn default_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.default_wait_timeout_ms)
    }

    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pause_poll_interval_ms)
    }
}

/// Script runner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Explicit native interpreter, checked after the environment override
    pub interpreter_path: Option<PathBuf>,

    /// Wall-clock limit for native runs
    pub native_timeout_secs: u64,

    /// Scripts outside this directory are refused
    pub allowed_root: Option<PathBuf>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            interpreter_path: None,
            native_timeout_secs: 30,
            allowed_root: None,
        }
    }
}

impl ScriptConfig {
    pub fn native_timeout(&self) -> Duration {
        Duration::from_secs(self.native_timeout_secs)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl MacroboardConfig {
    /// Check value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        let engine = &self.engine;
        if engine.pixel_check_interval_ms == 0 {
            return Err(invalid("engine.pixel_check_interval_ms", "must be positive"));
        }
        if engine.pause_poll_interval_ms == 0 {
            return Err(invalid("engine.pause_poll_interval_ms", "must be positive"));
        }
        if engine.max_call_depth == 0 {
            return Err(invalid("engine.max_call_depth", "must be at least 1"));
        }
        if self.script.native_timeout_secs == 0 {
            return Err(invalid("script.native_timeout_secs", "must be at least 1"));
        }
        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(invalid(
                "logging.level",
                &format!("unknown level '{}'", self.logging.level),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths against the directory holding the config file
    pub(crate) fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |p: &mut Option<PathBuf>| {
            if let Some(path) = p.as_mut() {
                if path.is_relative() {
                    *path = base_dir.join(&*path);
                }
            }
        };
        resolve(&mut self.script.interpreter_path);
        resolve(&mut self.script.allowed_root);
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MacroboardConfig::default();
        assert_eq!(config.engine.default_delay_ms, 1000);
        assert_eq!(config.engine.pixel_check_interval(), Duration::from_millis(100));
        assert_eq!(config.script.native_timeout(), Duration::from_secs(30));
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = MacroboardConfig::default();
        config.engine.pixel_check_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pixel_check_interval_ms"));
    }

    #[test]
    fn test_validate_rejects_unknown_level() {
        let mut config = MacroboardConfig::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "logging.level"
        ));
    }

    #[test]
    fn test_resolve_relative_paths() {
        let mut config = MacroboardConfig::default();
        config.script.allowed_root = Some(PathBuf::from("scripts"));
        config.script.interpreter_path = Some(PathBuf::from("/opt/ahk/AutoHotkey.exe"));
        config.resolve_paths(Path::new("/etc/macroboard"));

        assert_eq!(
            config.script.allowed_root,
            Some(PathBuf::from("/etc/macroboard/scripts"))
        );
        assert_eq!(
            config.script.interpreter_path,
            Some(PathBuf::from("/opt/ahk/AutoHotkey.exe"))
        );
    }
}
