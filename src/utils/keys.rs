use enigo::Key;

/// Parse a human key name into an Enigo key.
///
/// Accepted names (case-insensitive, surrounding whitespace ignored):
/// - named keys: `enter`/`return`, `tab`, `esc`/`escape`, `space`, `backspace`,
///   `delete`/`del`, `home`, `end`, `pageup`, `pagedown`, `capslock`,
///   `up`, `down`, `left`, `right`
/// - modifiers: `ctrl`/`control`, `shift`, `alt`, `win`/`windows`/`meta`/`cmd`/`super`
/// - function keys `f1` ..= `f12`
/// - any single character (letters, digits, punctuation)
///
/// Returns `None` for anything else.
pub fn parse_key(name: &str) -> Option<Key> {
    let normalized = name.trim().to_lowercase();
    let key = match normalized.as_str() {
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "esc" | "escape" => Key::Escape,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "capslock" => Key::CapsLock,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "ctrl" | "control" => Key::Control,
        "shift" => Key::Shift,
        "alt" => Key::Alt,
        "win" | "windows" | "meta" | "cmd" | "super" => Key::Meta,
        other => return function_key(other).or_else(|| single_char(name.trim())),
    };
    Some(key)
}

fn function_key(name: &str) -> Option<Key> {
    let n: u8 = name.strip_prefix('f')?.parse().ok()?;
    let key = match n {
        1 => Key::F1,
        2 => Key::F2,
        3 => Key::F3,
        4 => Key::F4,
        5 => Key::F5,
        6 => Key::F6,
        7 => Key::F7,
        8 => Key::F8,
        9 => Key::F9,
        10 => Key::F10,
        11 => Key::F11,
        12 => Key::F12,
        _ => return None,
    };
    Some(key)
}

fn single_char(name: &str) -> Option<Key> {
    let mut chars = name.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(Key::Unicode(c.to_ascii_lowercase()))
}
