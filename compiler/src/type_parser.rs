use brine_capnp_schema::{Field, Primitive, TypeRef};

use crate::tokenizer::IDENTIFIER;

pub const LIST_KEYWORDS: [&str; 3] = ["list", "vector", "std::vector"];
pub const MAP_KEYWORDS:  [&str; 4] = ["map", "unordered_map", "std::map", "std::unordered_map"];

/// Parse one field declaration such as `map<string, list<int32>> scores;`
/// into its type tree and field name. The trailing `;` is optional.
///
/// Structural keywords (`list`, `map`, ...) match case-insensitively and
/// primitives match exactly or lower-cased. Any other identifier is kept
/// verbatim as a custom type reference.
pub fn parse_field(line: &str) -> Result<Field, String> {
    let mut parser = TypeParser { source: line, pos: 0 };
    let ty = parser.parse_type()?;
    let name = parser.read_identifier("field name")?;
    parser.try_consume(';');
    Ok(Field::new(name, ty))
}

/// Look a spelling up in the primitive table, tolerating either case.
pub fn resolve_primitive(identifier: &str) -> Option<Primitive> {
    Primitive::from_spelling(identifier)
        .or_else(|| Primitive::from_spelling(&identifier.to_ascii_lowercase()))
}

struct TypeParser<'a> {
    source: &'a str,
    pos:    usize,
}

impl<'a> TypeParser<'a> {
    fn parse_type(&mut self) -> Result<TypeRef, String> {
        let identifier = self.read_identifier("type name")?;
        let lower = identifier.to_ascii_lowercase();

        if LIST_KEYWORDS.contains(&lower.as_str()) {
            self.expect('<', &format!("after '{}'", identifier))?;
            let element = self.parse_type()?;
            self.expect('>', &format!("to close '{}<'", identifier))?;
            return Ok(TypeRef::list(element));
        }

        if MAP_KEYWORDS.contains(&lower.as_str()) {
            self.expect('<', &format!("after '{}'", identifier))?;
            let key = self.parse_type()?;
            self.expect(',', "between map key and value types")?;
            let value = self.parse_type()?;
            self.expect('>', &format!("to close '{}<'", identifier))?;
            return Ok(TypeRef::map(key, value));
        }

        Ok(match resolve_primitive(&identifier) {
            Some(primitive) => TypeRef::Primitive(primitive),
            None => TypeRef::Custom(identifier),
        })
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.source[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn try_consume(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char, context: &str) -> Result<(), String> {
        if self.try_consume(expected) {
            Ok(())
        } else {
            Err(format!("Expected '{}' {} but found {}", expected, context, self.describe_next()))
        }
    }

    fn read_identifier(&mut self, what: &str) -> Result<String, String> {
        self.skip_whitespace();
        let rest = &self.source[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == ':'))
            .unwrap_or(rest.len());
        let identifier = &rest[..len];

        if !IDENTIFIER.is_match(identifier) {
            return Err(format!("Expected {} identifier but found {}", what, self.describe_next()));
        }

        self.pos += len;
        Ok(identifier.to_string())
    }

    fn describe_next(&self) -> String {
        let rest = self.source[self.pos..].trim_start();
        match rest.split_whitespace().next() {
            Some(word) => format!("'{}'", word),
            None => "end of declaration".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brine_capnp_schema::TypeKind;
    use rstest::rstest;

    fn prim(p: Primitive) -> TypeRef {
        TypeRef::Primitive(p)
    }

    #[test]
    fn test_nested_map_of_list() {
        let field = parse_field("map<string, list<int32>> scores;").unwrap();
        assert_eq!(field.name, "scores");
        assert_eq!(field.kind(), TypeKind::Map);
        assert_eq!(field.ty.key(), Some(&prim(Primitive::String)));
        let value = field.ty.value().unwrap();
        assert_eq!(value.kind(), TypeKind::List);
        assert_eq!(value.element(), Some(&prim(Primitive::Int32)));
        assert_eq!(field.ty.capnp_type(), "Map(Text, List(Int32))");
        assert_eq!(field.ty.cpp_type(), "std::unordered_map<std::string, std::vector<int32_t>>");
    }

    #[test]
    fn test_spaced_tokens_from_brace_block() {
        // Message bodies reach the resolver re-joined with single spaces.
        let field = parse_field("list < map < uint64 , Player > > roster ;").unwrap();
        assert_eq!(field.name, "roster");
        assert_eq!(
            field.ty,
            TypeRef::list(TypeRef::map(prim(Primitive::UInt64), TypeRef::custom("Player")))
        );
    }

    #[test]
    fn test_deep_nesting() {
        let field = parse_field("list<list<list<list<bytes>>>> cube").unwrap();
        let mut ty = &field.ty;
        for _ in 0..4 {
            ty = ty.element().unwrap();
        }
        assert_eq!(ty, &prim(Primitive::Bytes));
    }

    #[rstest]
    #[case("int", Primitive::Int32)]
    #[case("Int32", Primitive::Int32)]
    #[case("INT64", Primitive::Int64)]
    #[case("uint8", Primitive::UInt8)]
    #[case("Float64", Primitive::Float64)]
    #[case("bool", Primitive::Bool)]
    #[case("String", Primitive::String)]
    #[case("data", Primitive::Bytes)]
    #[case("Bytes", Primitive::Bytes)]
    fn test_primitive_spellings(#[case] spelling: &str, #[case] expected: Primitive) {
        let field = parse_field(&format!("{} value;", spelling)).unwrap();
        assert_eq!(field.ty, prim(expected));
    }

    #[rstest]
    #[case("LIST<int32> xs;")]
    #[case("Vector<int32> xs;")]
    #[case("std::vector<int32> xs;")]
    fn test_list_keywords_ignore_case(#[case] line: &str) {
        assert_eq!(parse_field(line).unwrap().ty, TypeRef::list(prim(Primitive::Int32)));
    }

    #[test]
    fn test_map_keyword_spellings() {
        for kw in ["map", "unordered_map", "std::map", "std::unordered_map", "Map"] {
            let field = parse_field(&format!("{}<string, bool> flags;", kw)).unwrap();
            assert_eq!(field.kind(), TypeKind::Map, "{}", kw);
        }
    }

    #[test]
    fn test_custom_name_keeps_case() {
        let field = parse_field("game::PlayerState state").unwrap();
        assert_eq!(field.ty.custom_name(), Some("game::PlayerState"));
        assert_eq!(field.name, "state");
    }

    #[test]
    fn test_missing_open_angle() {
        let err = parse_field("list int32 xs;").unwrap_err();
        assert!(err.contains("Expected '<'"), "{}", err);
    }

    #[test]
    fn test_missing_comma_in_map() {
        let err = parse_field("map<string int32> m;").unwrap_err();
        assert!(err.contains("Expected ','"), "{}", err);
    }

    #[test]
    fn test_missing_close_angle() {
        let err = parse_field("list<int32 xs;").unwrap_err();
        assert!(err.contains("Expected '>'"), "{}", err);
    }

    #[test]
    fn test_missing_field_name() {
        let err = parse_field("int32 ;").unwrap_err();
        assert!(err.contains("field name"), "{}", err);
        let err = parse_field("list<int32>").unwrap_err();
        assert!(err.contains("end of declaration"), "{}", err);
    }
}
