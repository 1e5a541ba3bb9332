//! Script key names to engine key descriptors

/// Named keys and their engine names
const KEY_NAMES: &[(&str, &str)] = &[
    ("LButton", "left"),
    ("RButton", "right"),
    ("MButton", "middle"),
    ("Enter", "enter"),
    ("Tab", "tab"),
    ("Space", "space"),
    ("BackSpace", "backspace"),
    ("Delete", "delete"),
    ("Home", "home"),
    ("End", "end"),
    ("PgUp", "pageup"),
    ("PgDn", "pagedown"),
    ("Up", "up"),
    ("Down", "down"),
    ("Left", "left"),
    ("Right", "right"),
    ("F1", "f1"),
    ("F2", "f2"),
    ("F3", "f3"),
    ("F4", "f4"),
    ("F5", "f5"),
    ("F6", "f6"),
    ("F7", "f7"),
    ("F8", "f8"),
    ("F9", "f9"),
    ("F10", "f10"),
    ("F11", "f11"),
    ("F12", "f12"),
];

fn modifier(ch: char) -> Option<&'static str> {
    match ch {
        '^' => Some("ctrl"),
        '+' => Some("shift"),
        '!' => Some("alt"),
        '#' => Some("win"),
        _ => None,
    }
}

/// Map a key name such as `Enter`, `PgDn` or `^+s` to `enter`, `pagedown`,
/// `ctrl+shift+s`
///
/// Leading modifier symbols become `+`-joined prefixes. The rest may be a
/// braced key name (`^{Enter}`); unknown names are lower-cased.
pub fn map_key(key: &str) -> String {
    let key = key
        .strip_prefix('{')
        .and_then(|k| k.strip_suffix('}'))
        .unwrap_or(key);
    let rest = key.trim_start_matches(|c: char| modifier(c).is_some());
    let mut parts: Vec<String> = key[..key.len() - rest.len()]
        .chars()
        .filter_map(modifier)
        .map(str::to_string)
        .collect();

    let rest = rest.trim_matches(|c: char| c == '{' || c == '}');
    if !rest.is_empty() {
        let name = match KEY_NAMES.iter().find(|(k, _)| *k == rest) {
            Some((_, name)) => name.to_string(),
            None => rest.to_lowercase(),
        };
        parts.push(name);
    }
    parts.join("+")
}

/// Map the argument of a `Send` command: quotes are removed before the key
/// name is mapped
pub fn map_send_argument(arg: &str) -> String {
    map_key(arg.trim().trim_matches('"'))
}
