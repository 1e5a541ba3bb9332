//! YAML configuration loader
//!
//! Supports the `!env_var NAME` tag for scalar substitution. The variable's
//! text is re-read as a YAML scalar so numbers and booleans keep their type.

use serde_yaml::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

use crate::config::MacroboardConfig;
use crate::error::{ConfigError, ConfigResult};

/// Load and validate a configuration file
///
/// Relative paths inside the file are resolved against the file's directory.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<MacroboardConfig> {
    let path = path.as_ref();
    debug!("Loading configuration file: {:?}", path);

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config = parse(&content, path)?;
    if let Some(dir) = path.parent() {
        config.resolve_paths(dir);
    }
    config.validate()?;
    Ok(config)
}

/// Load and validate configuration from a YAML string
pub fn load_config_str(content: &str) -> ConfigResult<MacroboardConfig> {
    let config = parse(content, Path::new("<string>"))?;
    config.validate()?;
    Ok(config)
}

fn parse(content: &str, source_path: &Path) -> ConfigResult<MacroboardConfig> {
    if content.trim().is_empty() {
        return Ok(MacroboardConfig::default());
    }

    let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
        path: source_path.to_path_buf(),
        source: e,
    })?;
    let value = process_value(value)?;

    serde_yaml::from_value(value).map_err(|e| ConfigError::ParseYaml {
        path: source_path.to_path_buf(),
        source: e,
    })
}

/// Process a YAML value, handling custom tags
fn process_value(value: Value) -> ConfigResult<Value> {
    match value {
        Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            trace!("Processing tag '{}' with value {:?}", tag, tagged.value);
            match tag.as_str() {
                "!env_var" => process_env_var(tagged.value),
                _ => Err(ConfigError::InvalidValue {
                    key: tag,
                    reason: "unsupported tag".to_string(),
                }),
            }
        }
        Value::Mapping(map) => {
            let mut result = serde_yaml::Mapping::new();
            for (k, v) in map {
                result.insert(k, process_value(v)?);
            }
            Ok(Value::Mapping(result))
        }
        Value::Sequence(seq) => {
            let result: ConfigResult<Vec<Value>> = seq.into_iter().map(process_value).collect();
            Ok(Value::Sequence(result?))
        }
        _ => Ok(value),
    }
}

/// Process !env_var tag: `!env_var NAME` or `!env_var NAME default`
fn process_env_var(value: Value) -> ConfigResult<Value> {
    let tag_arg = match value {
        Value::String(s) => s,
        _ => {
            return Err(ConfigError::InvalidValue {
                key: "!env_var".to_string(),
                reason: "environment variable name must be a string".to_string(),
            })
        }
    };

    let (var_name, default) = match tag_arg.split_once(char::is_whitespace) {
        Some((name, default)) => (name.to_string(), Some(default.trim().to_string())),
        None => (tag_arg.clone(), None),
    };

    let env_value = match std::env::var(&var_name) {
        Ok(v) => v,
        Err(_) => default.ok_or_else(|| ConfigError::EnvVarNotFound {
            var: var_name.clone(),
        })?,
    };

    debug!("Substituted env var: {}", var_name);
    Ok(serde_yaml::from_str::<Value>(&env_value).unwrap_or(Value::String(env_value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = load_config_str("").unwrap();
        assert_eq!(config, MacroboardConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = load_config_str(
            r#"
engine:
  pixel_check_interval_ms: 25
script:
  native_timeout_secs: 5
"#,
        )
        .unwrap();

        assert_eq!(config.engine.pixel_check_interval_ms, 25);
        assert_eq!(config.engine.default_delay_ms, 1000);
        assert_eq!(config.script.native_timeout_secs, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_yaml() {
        let err = load_config_str("engine: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::ParseYaml { .. }));
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let err = load_config_str("engine:\n  max_call_depth: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_env_var_default_keeps_scalar_type() {
        let config = load_config_str(
            "engine:\n  default_delay_ms: !env_var MB_TEST_SURELY_UNSET_DELAY 250\n",
        )
        .unwrap();
        assert_eq!(config.engine.default_delay_ms, 250);
    }

    #[test]
    fn test_env_var_missing_without_default() {
        let err = load_config_str("logging:\n  level: !env_var MB_TEST_SURELY_UNSET_LEVEL\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound { var } if var == "MB_TEST_SURELY_UNSET_LEVEL"));
    }

    #[test]
    fn test_load_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macroboard.yaml");
        fs::write(&path, "script:\n  allowed_root: scripts\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            config.script.allowed_root,
            Some(dir.path().join(PathBuf::from("scripts")))
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
