use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER_PREFIX: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_:]*").unwrap();
    static ref NUMBER_PREFIX:     Regex = Regex::new(r"^[+-]?(?:0[xX][0-9A-Fa-f]+|[0-9]+)").unwrap();
    pub static ref IDENTIFIER:    Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_:]*$").unwrap();
    pub static ref NUMBER:        Regex = Regex::new(r"^[+-]?(?:0[xX][0-9A-Fa-f]+|[0-9]+)$").unwrap();
}

/// Characters that always lex as a one-character token.
pub const SYMBOLS: [char; 13] = ['{', '}', '(', ')', '/', '*', ';', ',', '<', '>', '.', '|', '@'];

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text:   String,
    pub line:   usize,
    pub column: usize,
    pub is_eof: bool,
}

impl Token {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        !self.is_eof && self.text == keyword
    }

    /// Re-checks the identifier rule against the text; nothing is cached
    /// from lexing.
    pub fn is_identifier(&self) -> bool {
        !self.is_eof && IDENTIFIER.is_match(&self.text)
    }

    pub fn is_number(&self) -> bool {
        !self.is_eof && NUMBER.is_match(&self.text)
    }
}

/// Pull lexer over comment-free DSL text. It never fails: anything it does
/// not recognize becomes a one-character token for the parser to reject.
#[derive(Debug)]
pub struct Lexer {
    source: String,
    pos:    usize,
    line:   usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: impl Into<String>) -> Self {
        Lexer {
            source: source.into(),
            pos:    0,
            line:   1,
            column: 1,
        }
    }

    /// Return the next token and advance past it. At end of input this keeps
    /// returning an EOF token.
    pub fn next_token(&mut self) -> Token {
        let (token, pos, line, column) = self.scan();
        self.pos    = pos;
        self.line   = line;
        self.column = column;
        token
    }

    /// Look at the next token without consuming it; `None` at end of input.
    pub fn peek_token(&self) -> Option<Token> {
        let (token, ..) = self.scan();
        if token.is_eof {
            None
        } else {
            Some(token)
        }
    }

    /// Line and column of the next unread character.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    fn scan(&self) -> (Token, usize, usize, usize) {
        let mut pos    = self.pos;
        let mut line   = self.line;
        let mut column = self.column;

        let rest = &self.source[pos..];
        for c in rest.chars() {
            if !is_space(c) {
                break;
            }
            advance(c, &mut pos, &mut line, &mut column);
        }

        let rest = &self.source[pos..];
        let Some(current) = rest.chars().next() else {
            let eof = Token { text: String::new(), line, column, is_eof: true };
            return (eof, pos, line, column);
        };

        let len = if SYMBOLS.contains(&current) {
            current.len_utf8()
        } else if current.is_ascii_alphabetic() || current == '_' {
            IDENTIFIER_PREFIX.find(rest).map_or(current.len_utf8(), |m| m.end())
        } else if current.is_ascii_digit() || current == '+' || current == '-' {
            NUMBER_PREFIX.find(rest).map_or(current.len_utf8(), |m| m.end())
        } else {
            current.len_utf8()
        };

        let text  = rest[..len].to_string();
        let token = Token { text, line, column, is_eof: false };
        for c in rest[..len].chars() {
            advance(c, &mut pos, &mut line, &mut column);
        }

        (token, pos, line, column)
    }
}

fn is_space(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0b'
}

fn advance(c: char, pos: &mut usize, line: &mut usize, column: &mut usize) {
    *pos += c.len_utf8();
    if c == '\n' {
        *line  += 1;
        *column = 1;
    } else {
        *column += 1;
    }
}

/// Lex `text` to completion, ending with the EOF token.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut lexer  = Lexer::new(text);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done  = token.is_eof;
        tokens.push(token);
        if done {
            return tokens;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tok(text: &str, line: usize, column: usize) -> Token {
        Token { text: text.into(), line, column, is_eof: false }
    }

    fn texts(input: &str) -> Vec<String> {
        tokenize(input)
            .into_iter()
            .filter(|t| !t.is_eof)
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_tokenize_simple() {
        let input = "message Ping(7) {\n  int32 x;\n}";
        let expected = vec![
            tok("message", 1, 1),
            tok("Ping",    1, 9),
            tok("(",       1, 13),
            tok("7",       1, 14),
            tok(")",       1, 15),
            tok("{",       1, 17),
            tok("int32",   2, 3),
            tok("x",       2, 9),
            tok(";",       2, 10),
            tok("}",       3, 1),
            Token { text: "".into(), line: 3, column: 2, is_eof: true },
        ];
        assert_eq!(tokenize(input), expected);
    }

    #[test]
    fn test_symbols_split_everything() {
        assert_eq!(
            texts("map<string,list<int32>>"),
            vec!["map", "<", "string", ",", "list", "<", "int32", ">", ">"]
        );
        assert_eq!(texts("a.b|c@d*e/f"), vec!["a", ".", "b", "|", "c", "@", "d", "*", "e", "/", "f"]);
    }

    #[test]
    fn test_identifier_keeps_colons() {
        assert_eq!(texts("std::vector<foo::Bar>"), vec!["std::vector", "<", "foo::Bar", ">"]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(texts("0x1F -12 +3 42abc"), vec!["0x1F", "-12", "+3", "42", "abc"]);
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        // A bare sign is a single-character token.
        assert_eq!(texts("- x"), vec!["-", "x"]);
        assert_eq!(texts("+"), vec!["+"]);
        // `0x` without a hex digit only lexes the `0`.
        assert_eq!(texts("0xg"), vec!["0", "xg"]);
    }

    #[test]
    fn test_unknown_characters_become_tokens() {
        assert_eq!(texts("a = $ é"), vec!["a", "=", "$", "é"]);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut lexer = Lexer::new("  enum  E");
        assert_eq!(lexer.peek_token().map(|t| t.text), Some("enum".to_string()));
        assert_eq!(lexer.peek_token().map(|t| t.text), Some("enum".to_string()));
        assert_eq!(lexer.next_token().text, "enum");
        assert_eq!(lexer.next_token().text, "E");
        assert!(lexer.peek_token().is_none());
        assert!(lexer.next_token().is_eof);
        assert!(lexer.next_token().is_eof);
    }

    #[rstest]
    #[case("foo", true, false)]
    #[case("_x9", true, false)]
    #[case("a::b", true, false)]
    #[case("9a", false, false)]
    #[case("42", false, true)]
    #[case("-42", false, true)]
    #[case("0xDEAD", false, true)]
    #[case("0x", false, false)]
    #[case("-", false, false)]
    #[case("x-1", false, false)]
    fn test_classification(#[case] text: &str, #[case] identifier: bool, #[case] number: bool) {
        let token = tok(text, 1, 1);
        assert_eq!(token.is_identifier(), identifier);
        assert_eq!(token.is_number(), number);
    }

    #[test]
    fn test_eof_token_is_nothing() {
        let eof = Token { text: "".into(), line: 1, column: 1, is_eof: true };
        assert!(!eof.is_identifier());
        assert!(!eof.is_number());
        assert!(!eof.is_keyword(""));
    }
}
