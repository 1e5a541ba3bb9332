//! YAML configuration loading for macroboard
//!
//! Every section and field has a default, so an empty document (or no file
//! at all) yields a usable configuration. Scalars may be taken from the
//! environment with the `!env_var NAME` tag.
//!
//! # Example
//!
//! ```ignore
//! use mb_config::load_config;
//!
//! let config = load_config("macroboard.yaml")?;
//! let interval = config.engine.pixel_check_interval();
//! ```

mod config;
mod error;
mod loader;

pub use config::{EngineConfig, LoggingConfig, MacroboardConfig, ScriptConfig};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str};
