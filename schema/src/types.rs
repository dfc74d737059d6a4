use serde::Serialize;

/// The closed set of built-in scalar and blob types a field can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bool,
    String,
    Bytes,
}

/// DSL spellings recognized as primitives. Lookups are exact first, then
/// lower-cased, so `Int32` and `int32` resolve alike.
pub const PRIMITIVE_SPELLINGS: [(&str, Primitive); 15] = [
    ("int",     Primitive::Int32),
    ("int8",    Primitive::Int8),
    ("int16",   Primitive::Int16),
    ("int32",   Primitive::Int32),
    ("int64",   Primitive::Int64),
    ("uint8",   Primitive::UInt8),
    ("uint16",  Primitive::UInt16),
    ("uint32",  Primitive::UInt32),
    ("uint64",  Primitive::UInt64),
    ("float32", Primitive::Float32),
    ("float64", Primitive::Float64),
    ("bool",    Primitive::Bool),
    ("string",  Primitive::String),
    ("bytes",   Primitive::Bytes),
    ("data",    Primitive::Bytes),
];

impl Primitive {
    /// Exact-spelling lookup in [`PRIMITIVE_SPELLINGS`].
    pub fn from_spelling(spelling: &str) -> Option<Primitive> {
        PRIMITIVE_SPELLINGS
            .iter()
            .find(|(name, _)| *name == spelling)
            .map(|(_, primitive)| *primitive)
    }

    pub fn capnp_name(self) -> &'static str {
        match self {
            Primitive::Int8    => "Int8",
            Primitive::Int16   => "Int16",
            Primitive::Int32   => "Int32",
            Primitive::Int64   => "Int64",
            Primitive::UInt8   => "UInt8",
            Primitive::UInt16  => "UInt16",
            Primitive::UInt32  => "UInt32",
            Primitive::UInt64  => "UInt64",
            Primitive::Float32 => "Float32",
            Primitive::Float64 => "Float64",
            Primitive::Bool    => "Bool",
            Primitive::String  => "Text",
            Primitive::Bytes   => "Data",
        }
    }

    pub fn cpp_name(self) -> &'static str {
        match self {
            Primitive::Int8    => "int8_t",
            Primitive::Int16   => "int16_t",
            Primitive::Int32   => "int32_t",
            Primitive::Int64   => "int64_t",
            Primitive::UInt8   => "uint8_t",
            Primitive::UInt16  => "uint16_t",
            Primitive::UInt32  => "uint32_t",
            Primitive::UInt64  => "uint64_t",
            Primitive::Float32 => "float",
            Primitive::Float64 => "double",
            Primitive::Bool    => "bool",
            Primitive::String  => "std::string",
            Primitive::Bytes   => "std::vector<uint8_t>",
        }
    }

    /// `Text` and `Data` are pointer fields on the wire; everything else is inline.
    pub fn is_blob(self) -> bool {
        matches!(self, Primitive::String | Primitive::Bytes)
    }
}

/// Category of a type node. `Enum` is never produced by the parser: it is
/// assigned by cross-referencing a `Custom` name against the schema's enum
/// table (see `Schema::kind_of`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeKind {
    Primitive,
    Custom,
    Enum,
    List,
    Map,
}

/// A parsed type expression. Lists and maps own their children and may nest
/// to any depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "lowercase")]
pub enum TypeRef {
    Primitive(Primitive),
    /// Reference to a message or enum by its case-sensitive name. Never
    /// checked against the schema at parse time.
    Custom(String),
    List(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
}

impl TypeRef {
    pub fn custom(name: impl Into<String>) -> TypeRef {
        TypeRef::Custom(name.into())
    }

    pub fn list(element: TypeRef) -> TypeRef {
        TypeRef::List(Box::new(element))
    }

    pub fn map(key: TypeRef, value: TypeRef) -> TypeRef {
        TypeRef::Map(Box::new(key), Box::new(value))
    }

    /// Structural kind; `Custom` stays `Custom` even when it names an enum.
    pub fn kind(&self) -> TypeKind {
        match self {
            TypeRef::Primitive(_) => TypeKind::Primitive,
            TypeRef::Custom(_)    => TypeKind::Custom,
            TypeRef::List(_)      => TypeKind::List,
            TypeRef::Map(..)      => TypeKind::Map,
        }
    }

    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            TypeRef::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn custom_name(&self) -> Option<&str> {
        match self {
            TypeRef::Custom(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::List(element) => Some(&**element),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Map(key, _) => Some(&**key),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Map(_, value) => Some(&**value),
            _ => None,
        }
    }

    /// Cap'n Proto spelling, e.g. `Map(Text, List(Int32))`.
    pub fn capnp_type(&self) -> String {
        match self {
            TypeRef::Primitive(p)     => p.capnp_name().to_string(),
            TypeRef::Custom(name)     => name.clone(),
            TypeRef::List(element)    => format!("List({})", element.capnp_type()),
            TypeRef::Map(key, value)  => format!("Map({}, {})", key.capnp_type(), value.capnp_type()),
        }
    }

    /// C++ spelling used by the wrapper classes, e.g.
    /// `std::unordered_map<std::string, std::vector<int32_t>>`.
    pub fn cpp_type(&self) -> String {
        match self {
            TypeRef::Primitive(p)     => p.cpp_name().to_string(),
            TypeRef::Custom(name)     => name.clone(),
            TypeRef::List(element)    => format!("std::vector<{}>", element.cpp_type()),
            TypeRef::Map(key, value)  => {
                format!("std::unordered_map<{}, {}>", key.cpp_type(), value.cpp_type())
            }
        }
    }
}

/// One declared field of a message: its type tree plus the field identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty:   TypeRef,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Field {
        Field { name: name.into(), ty }
    }

    pub fn kind(&self) -> TypeKind {
        self.ty.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_type_strings() {
        let ty = TypeRef::map(
            TypeRef::Primitive(Primitive::String),
            TypeRef::list(TypeRef::Primitive(Primitive::Int32)),
        );
        assert_eq!(ty.capnp_type(), "Map(Text, List(Int32))");
        assert_eq!(ty.cpp_type(), "std::unordered_map<std::string, std::vector<int32_t>>");
        // Rendering is pure; asking twice gives the same answer.
        assert_eq!(ty.capnp_type(), ty.capnp_type());
    }

    #[test]
    fn test_custom_renders_verbatim() {
        let ty = TypeRef::list(TypeRef::custom("game::Player"));
        assert_eq!(ty.capnp_type(), "List(game::Player)");
        assert_eq!(ty.cpp_type(), "std::vector<game::Player>");
        assert_eq!(ty.element().and_then(TypeRef::custom_name), Some("game::Player"));
    }

    #[test]
    fn test_accessors_follow_kind() {
        let ty = TypeRef::map(TypeRef::Primitive(Primitive::UInt8), TypeRef::custom("Item"));
        assert_eq!(ty.kind(), TypeKind::Map);
        assert!(ty.element().is_none());
        assert!(ty.primitive().is_none());
        assert_eq!(ty.key().and_then(TypeRef::primitive), Some(Primitive::UInt8));
        assert_eq!(ty.value().map(TypeRef::kind), Some(TypeKind::Custom));
    }

    #[test]
    fn test_bytes_and_data_share_a_primitive() {
        assert_eq!(Primitive::from_spelling("bytes"), Some(Primitive::Bytes));
        assert_eq!(Primitive::from_spelling("data"), Some(Primitive::Bytes));
        assert_eq!(Primitive::from_spelling("int"), Some(Primitive::Int32));
        assert_eq!(Primitive::from_spelling("Int32"), None);
        assert_eq!(Primitive::Bytes.capnp_name(), "Data");
    }

    #[test]
    fn test_field_serializes_with_type_key() {
        let field = Field::new("tags", TypeRef::list(TypeRef::Primitive(Primitive::String)));
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["name"], "tags");
        assert_eq!(json["type"]["kind"], "list");
        assert_eq!(json["type"]["of"]["kind"], "primitive");
        assert_eq!(json["type"]["of"]["of"], "string");
    }
}
