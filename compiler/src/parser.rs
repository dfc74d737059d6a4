use std::collections::HashSet;

use brine_capnp_schema::{EnumDecl, EnumValue, Message, Schema, MESSAGE_TYPE_ENUM};

use crate::{
    error::Result,
    tokenizer::{Lexer, Token},
    type_parser::parse_field,
    utils::{error, lower_first, quote, split_respecting_nesting, starts_with_keyword},
};

/// Parse comment-free DSL text into a [`Schema`].
///
/// Stops at the first malformed declaration. On success the `MessageType`
/// enum has been synthesized from the parsed messages.
pub fn parse_schema(text: &str) -> Result<Schema> {
    let mut parser = SchemaParser {
        lexer:  Lexer::new(text),
        schema: Schema::default(),
    };

    while let Some(token) = parser.lexer.peek_token() {
        if token.is_keyword("namespace") {
            parser.parse_namespace()?;
        } else if token.is_keyword("enum") {
            parser.parse_enum()?;
        } else if token.is_keyword("message") {
            parser.parse_message()?;
        } else {
            return Err(unexpected(&token, "'namespace', 'enum', or 'message'"));
        }
    }

    let mut schema = parser.schema;
    synthesize_message_type_enum(&mut schema);
    Ok(schema)
}

struct SchemaParser {
    lexer:  Lexer,
    schema: Schema,
}

impl SchemaParser {
    /// `namespace a.b.c;`
    fn parse_namespace(&mut self) -> Result<()> {
        self.lexer.next_token();

        let mut namespace = self.expect_identifier("identifier after 'namespace'")?.text;
        while self.lexer.peek_token().is_some_and(|t| t.is_keyword(".")) {
            self.lexer.next_token();
            let part = self.expect_identifier("identifier after '.'")?;
            namespace.push('.');
            namespace.push_str(&part.text);
        }
        self.expect_symbol(";", "';' after namespace")?;

        self.schema.namespace_name = namespace;
        Ok(())
    }

    /// `enum Name @0x1234 { A, B | 5, C };`
    fn parse_enum(&mut self) -> Result<()> {
        self.lexer.next_token();

        let name_tok = self.expect_identifier("enum name")?;
        let mut decl = EnumDecl {
            name: name_tok.text.clone(),
            ..EnumDecl::default()
        };

        if self.lexer.peek_token().is_some_and(|t| t.is_keyword("@")) {
            self.lexer.next_token();
            let id_tok = self.expect_number("numeric enum id after '@' (e.g. 0x1234)")?;
            decl.capnp_id = parse_enum_id(&id_tok.text)
                .ok_or_else(|| error_at(&id_tok, &format!("Invalid enum id {}", quote(&id_tok.text))))?;
        }

        let body = self.read_braced_block()?;
        let mut next_value: i64 = 0;
        for item in split_respecting_nesting(&body, ',') {
            let value = match item.split_once('|') {
                None => EnumValue::new(item.trim(), next_value),
                Some((name, value)) => {
                    let (name, value) = (name.trim(), value.trim());
                    if name.is_empty() || value.is_empty() {
                        return Err(error_at(
                            &name_tok,
                            &format!("Malformed enum item {} near '|'", quote(&item)),
                        ));
                    }
                    let value = value.parse::<i64>().map_err(|_| {
                        error_at(&name_tok, &format!("Enum value must be an integer: {}", quote(value)))
                    })?;
                    EnumValue::new(name, value)
                }
            };
            next_value = value.value.wrapping_add(1);
            decl.values.push(value);
        }

        if self.lexer.peek_token().is_some_and(|t| t.is_keyword(";")) {
            self.lexer.next_token();
        }

        self.schema.add_enum(decl);
        Ok(())
    }

    /// `message Name(12) extends Parent { type name; ... }`
    fn parse_message(&mut self) -> Result<()> {
        self.lexer.next_token();

        let name_tok = self.expect_identifier("message name")?;
        self.expect_symbol("(", "'(' after message name")?;
        let id_tok = self.expect_number("numeric message id")?;
        let id = parse_message_id(&id_tok.text)
            .ok_or_else(|| error_at(&id_tok, &format!("Invalid message id {}", quote(&id_tok.text))))?;
        self.expect_symbol(")", "')'")?;

        let mut parent_name = String::new();
        if self.lexer.peek_token().is_some_and(|t| t.is_keyword("extends")) {
            self.lexer.next_token();
            parent_name = self.expect_identifier("base message name after 'extends'")?.text;
        }

        let body = self.read_braced_block()?;
        let mut fields = Vec::new();
        for piece in split_respecting_nesting(&body, ';') {
            let line = normalize_field_line(&format!("{};", piece));
            if line.is_empty()
                || starts_with_keyword(&line, "message")
                || starts_with_keyword(&line, "enum")
                || starts_with_keyword(&line, "extends")
            {
                continue;
            }
            let field = parse_field(&line).map_err(|msg| {
                error_at(&name_tok, &format!("in message {}: {}", quote(&name_tok.text), msg))
            })?;
            fields.push(field);
        }

        self.schema.add_message(Message {
            id,
            name: name_tok.text,
            parent_name,
            fields,
        });
        Ok(())
    }

    /// Consume `{ ... }` and return the raw token text between the outer
    /// braces, one space after each token. Nested braces are kept.
    fn read_braced_block(&mut self) -> Result<String> {
        self.expect_symbol("{", "'{'")?;

        let mut content = String::new();
        let mut depth = 1usize;
        loop {
            let token = self.lexer.next_token();
            if token.is_eof {
                return Err(error_at(&token, "Unexpected EOF inside '{...}'"));
            }
            if token.is_keyword("{") {
                depth += 1;
            } else if token.is_keyword("}") {
                depth -= 1;
                if depth == 0 {
                    return Ok(content);
                }
            }
            content.push_str(&token.text);
            content.push(' ');
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<Token> {
        let token = self.lexer.next_token();
        if token.is_identifier() {
            Ok(token)
        } else {
            Err(unexpected(&token, expected))
        }
    }

    fn expect_number(&mut self, expected: &str) -> Result<Token> {
        let token = self.lexer.next_token();
        if token.is_number() {
            Ok(token)
        } else {
            Err(unexpected(&token, expected))
        }
    }

    fn expect_symbol(&mut self, symbol: &str, expected: &str) -> Result<Token> {
        let token = self.lexer.next_token();
        if token.is_keyword(symbol) {
            Ok(token)
        } else {
            Err(unexpected(&token, expected))
        }
    }
}

fn error_at(token: &Token, msg: &str) -> crate::error::CapnpGenError {
    error(msg, token.line, token.column)
}

fn unexpected(token: &Token, expected: &str) -> crate::error::CapnpGenError {
    let found = if token.is_eof {
        "end of file".to_string()
    } else {
        quote(&token.text)
    };
    error_at(token, &format!("Expected {} but found {}", expected, found))
}

/// Drop a leading `enum` so `enum Status code;` reads as `Status code;`.
fn normalize_field_line(line: &str) -> String {
    let line = line.trim();
    if starts_with_keyword(line, "enum") {
        line["enum".len()..].trim_start().to_string()
    } else {
        line.to_string()
    }
}

/// Enum ids take hex (`0x`/`0X`) or decimal, with an optional `+`.
fn parse_enum_id(text: &str) -> Option<u64> {
    let digits = text.strip_prefix('+').unwrap_or(text);
    match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => digits.parse::<u64>().ok(),
    }
}

/// Message ids are read as decimal only: the leading run of digits is the
/// id, so `0x10` reads as `0`.
fn parse_message_id(text: &str) -> Option<u64> {
    let digits = text.strip_prefix('+').unwrap_or(text);
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse::<u64>().ok()
}

/// Make sure `MessageType` exists and lists every parsed message, in parse
/// order, as `lowerCamelName = id`.
///
/// Entries already present (for example from a hand-written `MessageType`
/// enum) are kept and never duplicated. If the enum would otherwise be empty
/// it gets a single `undefined = 0` entry.
fn synthesize_message_type_enum(schema: &mut Schema) {
    let candidates: Vec<(String, String, i64)> = schema
        .message_order
        .iter()
        .filter_map(|name| schema.messages.get(name))
        .map(|m| (m.name.clone(), lower_first(&m.name), m.id as i64))
        .collect();

    let decl = schema
        .enums
        .entry(MESSAGE_TYPE_ENUM.to_string())
        .or_default();
    decl.name = MESSAGE_TYPE_ENUM.to_string();
    decl.capnp_id = 0;

    let mut existing: HashSet<String> = decl.values.iter().map(|v| v.name.clone()).collect();
    for (message_name, value_name, id) in candidates {
        if existing.contains(&message_name) || existing.contains(&value_name) {
            continue;
        }
        existing.insert(value_name.clone());
        decl.values.push(EnumValue::new(value_name, id));
    }

    if decl.values.is_empty() {
        decl.values.push(EnumValue::new("undefined", 0));
    }
}
