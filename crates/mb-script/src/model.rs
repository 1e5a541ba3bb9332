//! Parsed script model and diagnostics

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One command line: `Name(args)` or legacy `Name arg1, arg2`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
    /// The source text after comment stripping
    pub raw: String,
    /// 1-based source line, 0 for synthetic commands
    pub line_no: usize,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>, raw: impl Into<String>, line_no: usize) -> Self {
        Self {
            name: name.into(),
            args,
            raw: raw.into(),
            line_no,
        }
    }
}

/// A function definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Command>,
}

/// A parsed script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Version from `#Requires AutoHotkey vX`
    pub requires: Option<String>,
    /// Other `#` directives, verbatim
    pub directives: Vec<String>,
    /// Global names with their initializer text (empty when none)
    pub globals: IndexMap<String, String>,
    pub top_level: Vec<Command>,
    /// Hotkey label to body, in declaration order
    pub hotkeys: IndexMap<String, Vec<Command>>,
    pub functions: IndexMap<String, Function>,
}

impl Script {
    /// Every command of the script: top level, then hotkeys, then functions
    pub fn all_commands(&self) -> impl Iterator<Item = &Command> {
        self.top_level
            .iter()
            .chain(self.hotkeys.values().flatten())
            .chain(self.functions.values().flat_map(|f| f.body.iter()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        f.write_str(s)
    }
}

/// A leveled message about a script, optionally tied to a line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    #[serde(default)]
    pub line_no: usize,
}

impl Diagnostic {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            line_no: 0,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Level::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    pub fn at_line(mut self, line_no: usize) -> Self {
        self.line_no = line_no;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line_no > 0 {
            write!(f, "{} (line {}): {}", self.level, self.line_no, self.message)
        } else {
            write!(f, "{}: {}", self.level, self.message)
        }
    }
}

/// Outcome of validating a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// False iff any diagnostic is an error
    pub is_valid: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let is_valid = !diagnostics.iter().any(|d| d.level == Level::Error);
        Self {
            is_valid,
            diagnostics,
        }
    }
}
