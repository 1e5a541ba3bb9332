//! Static checks over a parsed script

use crate::model::{Diagnostic, Script, ValidationResult};

/// The major interpreter version scripts must target
pub const SUPPORTED_MAJOR: &str = "2";

/// Commands that start processes or write the registry
pub const DANGEROUS_COMMANDS: &[&str] = &["Run", "RunWait", "DllCall", "RegWrite", "RegDelete"];

/// Commands that only do something on the native platform
pub const PLATFORM_COMMANDS: &[&str] =
    &["ComObject", "WinExist", "WinActivate", "ControlSend", "ControlClick"];

/// Script validator
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    native_platform: bool,
}

impl Validator {
    /// Validator for the host platform
    pub fn new() -> Self {
        Self::for_platform(cfg!(windows))
    }

    /// Validator that assumes the given platform
    pub fn for_platform(native_platform: bool) -> Self {
        Self { native_platform }
    }

    pub fn validate(&self, script: &Script) -> ValidationResult {
        let mut diagnostics = Vec::new();

        match script.requires.as_deref() {
            None => diagnostics.push(Diagnostic::warning(
                "Missing #Requires AutoHotkey v2.0 directive",
            )),
            Some(version) if !version.starts_with(SUPPORTED_MAJOR) => diagnostics.push(
                Diagnostic::error(format!("Unsupported AHK version: {}", version)),
            ),
            Some(_) => {}
        }

        for cmd in script.all_commands() {
            let name = cmd.name.as_str();
            if DANGEROUS_COMMANDS.contains(&name) {
                diagnostics.push(
                    Diagnostic::warning(format!("Potentially dangerous command: {}", name))
                        .at_line(cmd.line_no),
                );
            }
            if !self.native_platform && PLATFORM_COMMANDS.contains(&name) {
                diagnostics.push(
                    Diagnostic::info(format!("Windows-specific command: {}", name))
                        .at_line(cmd.line_no),
                );
            }
        }

        ValidationResult::from_diagnostics(diagnostics)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Level;
    use crate::parser::parse_text;

    #[test]
    fn test_missing_requires_is_only_a_warning() {
        let result = Validator::for_platform(true).validate(&parse_text("Click(1, 2)\n"));
        assert!(result.is_valid);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].level, Level::Warning);
    }

    #[test]
    fn test_unsupported_version_is_an_error() {
        let result = Validator::for_platform(true).validate(&parse_text("#Requires AutoHotkey v1.1\n"));
        assert!(!result.is_valid);
        assert_eq!(result.diagnostics[0].message, "Unsupported AHK version: 1.1");
    }

    #[test]
    fn test_dangerous_and_platform_commands() {
        let script = parse_text(
            "#Requires AutoHotkey v2.0\nRun(\"notepad.exe\")\nWinActivate(\"Untitled\")\n",
        );

        let foreign = Validator::for_platform(false).validate(&script);
        assert!(foreign.is_valid);
        let levels: Vec<(Level, usize)> =
            foreign.diagnostics.iter().map(|d| (d.level, d.line_no)).collect();
        assert_eq!(levels, vec![(Level::Warning, 2), (Level::Info, 3)]);

        let native = Validator::for_platform(true).validate(&script);
        assert_eq!(native.diagnostics.len(), 1);
    }
}
