//! brine-capnp
//!
//! Facade over the brine-capnp workspace.
//!
//! - `parse_schema_file` / `compile_schema` to get the in-memory model
//! - `generate` to write the Cap'n Proto schema and C++ wrappers
//! - `schema_to_json` for inspecting a parsed model

pub use brine_capnp_compiler::error::{CapnpGenError, Result};
pub use brine_capnp_compiler::{compile_schema, generate, parse_schema_file, GenerateOptions, GenerationReport};
pub use brine_capnp_schema::{EnumDecl, EnumValue, Field, Message, Primitive, Schema, TypeKind, TypeRef};

/// Render a parsed schema as pretty-printed JSON, in declaration order.
pub fn schema_to_json(schema: &Schema) -> Result<String> {
    serde_json::to_string_pretty(schema)
        .map_err(|e| CapnpGenError::GenerateError(format!("failed to serialize schema: {}", e)))
}

pub mod error {
    pub use brine_capnp_compiler::error::{CapnpGenError, Result};
}

pub mod schema {
    pub use brine_capnp_schema::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_to_json_keeps_order() {
        let schema = compile_schema("namespace a.b; message Zed(2) { list<int32> xs; } message Amy(1) { Zed z; }").unwrap();
        let json: serde_json::Value = serde_json::from_str(&schema_to_json(&schema).unwrap()).unwrap();

        assert_eq!(json["namespace_name"], "a.b");
        let names: Vec<&str> = json["messages"].as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert_eq!(json["message_order"], serde_json::json!(["Zed", "Amy"]));
        assert_eq!(json["messages"]["Zed"]["fields"][0]["type"]["kind"], "list");
        assert_eq!(json["messages"]["Zed"]["fields"][0]["type"]["of"]["kind"], "primitive");
        assert_eq!(json["messages"]["Amy"]["fields"][0]["type"], serde_json::json!({"kind": "custom", "of": "Zed"}));
        assert_eq!(json["enums"]["MessageType"]["values"][0]["name"], "zed");
    }
}
