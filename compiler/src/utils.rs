use crate::error::CapnpGenError;

/// JSON-style quoting for error messages, e.g. `"foo"`.
pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

pub fn error(msg: &str, line: usize, column: usize) -> CapnpGenError {
    CapnpGenError::ParseError {
        msg: msg.to_string(),
        line,
        column,
    }
}

/// Split `text` on `delimiter`, but only where `<>`, `()` and `{}` are all
/// balanced. Pieces are trimmed and empty pieces dropped.
pub fn split_respecting_nesting(text: &str, delimiter: char) -> Vec<String> {
    let mut pieces  = Vec::new();
    let mut current = String::new();
    let mut angle   = 0i32;
    let mut paren   = 0i32;
    let mut brace   = 0i32;

    for c in text.chars() {
        match c {
            '<' => angle += 1,
            '>' => angle -= 1,
            '(' => paren += 1,
            ')' => paren -= 1,
            '{' => brace += 1,
            '}' => brace -= 1,
            _ => {}
        }

        if c == delimiter && angle == 0 && paren == 0 && brace == 0 {
            push_trimmed(&mut pieces, &current);
            current.clear();
        } else {
            current.push(c);
        }
    }
    push_trimmed(&mut pieces, &current);

    pieces
}

fn push_trimmed(pieces: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        pieces.push(trimmed.to_string());
    }
}

/// True if `line` (after leading whitespace) starts with `keyword` followed
/// by whitespace, `<`, or the end of the line.
pub fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    match line.trim_start().strip_prefix(keyword) {
        Some(rest) => rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '<'),
        None => false,
    }
}

/// `a.b.c` -> `a::b::c`
pub fn to_cpp_namespace(namespace: &str) -> String {
    namespace.replace('.', "::")
}

/// `PlayerJoined` -> `playerJoined`. Only an ASCII first letter is changed.
pub fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// `playerId` -> `PlayerId`, the Cap'n Proto accessor suffix.
pub fn upper_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
