//! Line-oriented script parser
//!
//! A single forward pass over the source. Each non-blank line is matched,
//! in order, against: the `#Requires` directive, other `#` directives,
//! `global` declarations, function headers (`Name(params) {`), hotkey
//! labels (`Key:: body`), top-level assignments, and finally plain
//! commands. Braced bodies are collected by counting `{` and `}` only; no
//! other nesting is understood.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, trace};

use crate::error::{ScriptError, ScriptResult};
use crate::model::{Command, Function, Script};

/// A non-blank, comment-free line with its 1-based source line number
type Line = (usize, String);

pub(crate) fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("hard-coded pattern is valid"))
}

fn requires_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?i)^#Requires\s+AutoHotkey\s+v(?P<ver>[\d.]+)")
}

fn assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^(?P<name>[A-Za-z_]\w*)\s*:?=\s*(?P<value>.+)$")
}

fn global_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"(?i)^global\s+(?P<body>.+)$")
}

fn func_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^(?P<name>[A-Za-z_]\w*)\((?P<params>.*)\)\s*\{$")
}

fn hotkey_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^(?P<key>.+?)::\s*(?P<body>.*)$")
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^(?P<name>[A-Za-z_]\w*)\((?P<args>.*)\)$")
}

/// Parse script text into a [`Script`]
pub fn parse_text(text: &str) -> Script {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<Line> = text
        .lines()
        .enumerate()
        .map(|(i, raw)| (i + 1, strip_comment(raw).trim().to_string()))
        .filter(|(_, line)| !line.is_empty())
        .collect();

    let mut script = Script::default();
    let mut i = 0;

    while i < lines.len() {
        let (line_no, line) = &lines[i];
        let line_no = *line_no;
        i += 1;

        if let Some(caps) = requires_re().captures(line) {
            script.requires = Some(caps["ver"].to_string());
            continue;
        }

        if line.starts_with('#') && !line.contains("::") {
            script.directives.push(line.clone());
            continue;
        }

        if let Some(caps) = global_re().captures(line) {
            parse_global_declaration(&caps["body"], &mut script);
            continue;
        }

        if let Some(caps) = func_re().captures(line) {
            let name = caps["name"].to_string();
            let params = caps["params"]
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            let (body, next) = collect_block(&lines, i);
            i = next;
            trace!(function = %name, line = line_no, "Parsed function");
            script.functions.insert(
                name.clone(),
                Function {
                    name,
                    params,
                    body: parse_commands(&body),
                },
            );
            continue;
        }

        if let Some(caps) = hotkey_re().captures(line) {
            let key = caps["key"].trim().to_string();
            let inline = caps["body"].trim();
            let body = if !inline.is_empty() && inline != "{" {
                vec![parse_command(inline, line_no)]
            } else {
                // `Key::` with the opening brace on the following line
                if inline.is_empty() && lines.get(i).is_some_and(|(_, next)| next == "{") {
                    i += 1;
                }
                let (block, next) = collect_block(&lines, i);
                i = next;
                parse_commands(&block)
            };
            script.hotkeys.insert(key, body);
            continue;
        }

        if let Some(caps) = assign_re().captures(line) {
            script
                .globals
                .insert(caps["name"].to_string(), caps["value"].trim().to_string());
            continue;
        }

        script.top_level.push(parse_command(line, line_no));
    }

    debug!(
        top_level = script.top_level.len(),
        hotkeys = script.hotkeys.len(),
        functions = script.functions.len(),
        "Parsed script"
    );
    script
}

/// Read and parse a UTF-8 script file (a leading BOM is ignored)
pub fn parse_file(path: impl AsRef<Path>) -> ScriptResult<Script> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| ScriptError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(parse_text(&text))
}

/// Collect the lines of a braced block starting at `start`
///
/// The block's opening brace has already been consumed. Returns the body
/// lines (without the closing line) and the index after the block.
fn collect_block(lines: &[Line], start: usize) -> (Vec<Line>, usize) {
    let mut body = Vec::new();
    let mut depth: i64 = 1;
    let mut i = start;

    while i < lines.len() {
        let (line_no, line) = &lines[i];
        i += 1;
        depth += line.matches('{').count() as i64;
        depth -= line.matches('}').count() as i64;
        if depth <= 0 {
            break;
        }
        body.push((*line_no, line.clone()));
    }
    (body, i)
}

fn parse_commands(lines: &[Line]) -> Vec<Command> {
    lines
        .iter()
        .filter(|(_, line)| line != "}")
        .map(|(line_no, line)| parse_command(line, *line_no))
        .collect()
}

/// Parse one command in call syntax or legacy `Name arg1, arg2` syntax
pub fn parse_command(line: &str, line_no: usize) -> Command {
    if let Some(caps) = call_re().captures(line) {
        return Command::new(&caps["name"], split_args(&caps["args"]), line, line_no);
    }

    let end = line
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(line.len());
    let (name, rest) = line.split_at(end);
    let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    Command::new(name, split_args(rest), line, line_no)
}

/// Track the open string quote; `"` and `'` each close only themselves
fn track_quote(quote: &mut Option<char>, ch: char) {
    match *quote {
        Some(open) if open == ch => *quote = None,
        None if ch == '"' || ch == '\'' => *quote = Some(ch),
        _ => {}
    }
}

/// Remove a trailing `;` comment, ignoring semicolons inside quoted strings
pub fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (idx, ch) in line.char_indices() {
        if ch == ';' && quote.is_none() {
            return &line[..idx];
        }
        track_quote(&mut quote, ch);
    }
    line
}

/// Split an argument list on top-level commas
///
/// Commas inside parentheses or quoted strings do not split. Empty
/// arguments are dropped.
pub fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut depth = 0usize;
    let mut quote = None;

    for ch in args.chars() {
        track_quote(&mut quote, ch);
        match ch {
            '(' if quote.is_none() => depth += 1,
            ')' if quote.is_none() && depth > 0 => depth -= 1,
            _ => {}
        }
        if ch == ',' && quote.is_none() && depth == 0 {
            out.push(buf.trim().to_string());
            buf.clear();
        } else {
            buf.push(ch);
        }
    }
    out.push(buf.trim().to_string());
    out.retain(|a| !a.is_empty());
    out
}

fn parse_global_declaration(body: &str, script: &mut Script) {
    for chunk in split_args(body) {
        match assign_re().captures(&chunk) {
            Some(caps) => {
                script
                    .globals
                    .insert(caps["name"].to_string(), caps["value"].trim().to_string());
            }
            None => {
                script.globals.insert(chunk.trim().to_string(), String::new());
            }
        }
    }
}
