//! Script tooling for macroboard
//!
//! Parses AutoHotkey v2 style scripts into a [`Script`] model, checks them
//! with the [`Validator`], translates them into boards and runs them either
//! through a native interpreter or on the execution engine.
//!
//! # Key Types
//!
//! - [`Script`] - Parsed script: directives, globals, hotkeys, functions
//! - [`Validator`] - Leveled diagnostics; errors block execution
//! - [`ScriptRunner`] - Containment, validation and native/emulated runs
//! - [`LegacyImporter`] - Comma-form macros and saved boards

mod error;
pub mod keys;
pub mod legacy;
pub mod model;
pub mod parser;
pub mod runner;
pub mod translator;
pub mod validator;

pub use error::{ScriptError, ScriptResult};
pub use legacy::LegacyImporter;
pub use model::{Command, Diagnostic, Function, Level, Script, ValidationResult};
pub use parser::{parse_file, parse_text};
pub use runner::{ExecutedMode, RunMode, ScriptExecution, ScriptRunner};
pub use translator::to_board;
pub use validator::Validator;
