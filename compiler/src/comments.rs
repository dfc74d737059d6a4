#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    AfterSlash,
    LineComment,
    BlockComment,
    AfterStarInBlock,
}

/// Replace `// ...` and `/* ... */` comments with whitespace.
///
/// Each comment collapses to a single space; newlines inside comments are
/// kept so line numbers in later diagnostics still match the source. A `/`
/// that does not open a comment is emitted unchanged, so text without
/// comments comes back byte-identical.
pub fn strip_comments(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut state  = State::Normal;

    for c in input.chars() {
        state = match state {
            State::Normal => {
                if c == '/' {
                    State::AfterSlash
                } else {
                    output.push(c);
                    State::Normal
                }
            }
            State::AfterSlash => match c {
                '/' => {
                    output.push(' ');
                    State::LineComment
                }
                '*' => {
                    output.push(' ');
                    State::BlockComment
                }
                _ => {
                    output.push('/');
                    output.push(c);
                    State::Normal
                }
            },
            State::LineComment => {
                if c == '\n' {
                    output.push('\n');
                    State::Normal
                } else {
                    State::LineComment
                }
            }
            State::BlockComment => match c {
                '*' => State::AfterStarInBlock,
                '\n' => {
                    output.push('\n');
                    State::BlockComment
                }
                _ => State::BlockComment,
            },
            State::AfterStarInBlock => match c {
                '/' => State::Normal,
                '*' => State::AfterStarInBlock,
                '\n' => {
                    output.push('\n');
                    State::BlockComment
                }
                _ => State::BlockComment,
            },
        };
    }

    // A trailing lone slash was held back waiting for its successor.
    if state == State::AfterSlash {
        output.push('/');
    }

    output
}
