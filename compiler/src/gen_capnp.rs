use std::{
    fs,
    path::{Path, PathBuf},
};

use brine_capnp_schema::{
    EnumDecl, Field, Message, Schema, TypeKind, MESSAGE_TYPE_ENUM, MESSAGE_TYPE_FIELD,
};

use crate::{
    error::{CapnpGenError, Result},
    ids::{derive_id, format_id_as_hex, resolve_file_id, ID_HIGH_BIT},
    utils::to_cpp_namespace,
};

/// File name used when the output path names a directory.
pub const DEFAULT_CAPNP_FILE: &str = "network_msg.capnp";

/// C++ namespace for Cap'n Proto types when the DSL declares none.
pub const DEFAULT_CAPNP_NAMESPACE: &str = "capnpgen::message";

const MAP_TEMPLATE: &str = "\
struct Map(Key, Value) {
  entries @0 :List(Entry);
  struct Entry {
    key @0 :Key;
    value @1 :Value;
  }
}
";

/// Write the `.capnp` schema for `schema` and return the path written.
///
/// `out_path` ending in `.capnp` is the file itself; anything else is a
/// directory that will hold `network_msg.capnp`. A file ID already present in
/// the target is kept so every derived ID stays the same.
pub fn write_capnp_file(schema: &Schema, out_path: &Path) -> Result<PathBuf> {
    let path = resolve_output_path(out_path)?;
    let file_id = resolve_file_id(&path);
    let content = render_capnp(schema, file_id);

    fs::write(&path, content).map_err(|e| CapnpGenError::io(&path, e))?;
    tracing::debug!(path = %path.display(), "wrote capnp schema");
    Ok(path)
}

/// Render the full `.capnp` text for `schema` under `file_id`.
pub fn render_capnp(schema: &Schema, file_id: u64) -> String {
    let mut sections = vec![render_header(schema, file_id)];

    let mut enum_names: Vec<&String> = schema.enums.keys().collect();
    enum_names.sort();
    for name in enum_names {
        sections.push(render_enum(&schema.enums[name], file_id));
    }

    sections.push(MAP_TEMPLATE.to_string());

    let mut message_names: Vec<&String> = schema.messages.keys().collect();
    message_names.sort();
    for name in message_names {
        sections.push(render_struct(schema, &schema.messages[name], file_id));
    }

    let mut output = sections.join("\n");
    output.push('\n');
    output
}

fn resolve_output_path(out_path: &Path) -> Result<PathBuf> {
    if out_path.extension().is_some_and(|ext| ext == "capnp") {
        if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CapnpGenError::io(parent, e))?;
        }
        return Ok(out_path.to_path_buf());
    }

    fs::create_dir_all(out_path).map_err(|e| CapnpGenError::io(out_path, e))?;
    Ok(out_path.join(DEFAULT_CAPNP_FILE))
}

fn render_header(schema: &Schema, file_id: u64) -> String {
    let namespace = if schema.namespace_name.is_empty() {
        DEFAULT_CAPNP_NAMESPACE.to_string()
    } else {
        to_cpp_namespace(&schema.namespace_name)
    };

    format!(
        "{};\nusing Cxx = import \"/capnp/c++.capnp\";\n$Cxx.namespace(\"{}\");\n",
        format_id_as_hex(file_id),
        namespace
    )
}

fn render_enum(decl: &EnumDecl, file_id: u64) -> String {
    let enum_id = if decl.capnp_id != 0 {
        decl.capnp_id | ID_HIGH_BIT
    } else {
        derive_id(file_id, &decl.name)
    };

    let mut lines = vec![format!(
        "enum {} {} {{",
        capnp_identifier(&decl.name),
        format_id_as_hex(enum_id)
    )];
    for value in &decl.values {
        lines.push(format!("  {} @{};", capnp_identifier(&value.name), value.value));
    }
    lines.push("}".to_string());

    lines.join("\n") + "\n"
}

fn render_struct(schema: &Schema, message: &Message, file_id: u64) -> String {
    let struct_id = derive_id(file_id, &message.name);
    let fields = schema.flatten_fields(message);

    let mut lines = vec![format!(
        "struct {} {} {{",
        capnp_identifier(&message.name),
        format_id_as_hex(struct_id)
    )];

    let mut ordinal = 0usize;
    if !fields.first().is_some_and(|f| is_message_type_field(schema, f)) {
        lines.push(format!("  {} @{} : {};", MESSAGE_TYPE_FIELD, ordinal, MESSAGE_TYPE_ENUM));
        ordinal += 1;
    }
    for field in fields {
        lines.push(format!(
            "  {} @{} : {};",
            capnp_identifier(&field.name),
            ordinal,
            field.ty.capnp_type()
        ));
        ordinal += 1;
    }
    lines.push("}".to_string());

    lines.join("\n") + "\n"
}

/// `MessageType msgType`, declared by hand.
pub fn is_message_type_field(schema: &Schema, field: &Field) -> bool {
    matches!(schema.kind_of(&field.ty), TypeKind::Custom | TypeKind::Enum)
        && field.ty.custom_name() == Some(MESSAGE_TYPE_ENUM)
        && field.name == MESSAGE_TYPE_FIELD
}

fn capnp_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{comments::strip_comments, parser::parse_schema};

    const FILE_ID: u64 = 0xf00d_0000_0000_0001;

    fn render(source: &str) -> String {
        let schema = parse_schema(&strip_comments(source)).unwrap();
        render_capnp(&schema, FILE_ID)
    }

    #[test]
    fn test_header_and_namespace() {
        let out = render("namespace game.msg;");
        assert!(out.starts_with(
            "@0xf00d000000000001;\nusing Cxx = import \"/capnp/c++.capnp\";\n$Cxx.namespace(\"game::msg\");\n\n"
        ));

        let out = render("");
        assert!(out.contains("$Cxx.namespace(\"capnpgen::message\");"));
    }

    #[test]
    fn test_enums_sorted_with_ids() {
        let out = render("enum Zeta @0x1234 { Z } enum Alpha { A, B|4 }");
        let alpha = out.find("enum Alpha").unwrap();
        let message_type = out.find("enum MessageType").unwrap();
        let zeta = out.find("enum Zeta").unwrap();
        assert!(alpha < message_type && message_type < zeta);

        assert!(out.contains(&format!(
            "enum Alpha {} {{\n  A @0;\n  B @4;\n}}\n",
            format_id_as_hex(derive_id(FILE_ID, "Alpha"))
        )));
        assert!(out.contains("enum Zeta @0x8000000000001234 {\n  Z @0;\n}\n"));
        assert!(out.contains("  undefined @0;"));
    }

    #[test]
    fn test_struct_flattens_and_prepends_msg_type() {
        let out = render(
            "message Base(1) { uint64 seq; }\n\
             message Move(2) extends Base { list<float32> path; map<string, Base> refs; }",
        );
        let expected = format!(
            "struct Move {} {{\n  msgType @0 : MessageType;\n  seq @1 : UInt64;\n  path @2 : List(Float32);\n  refs @3 : Map(Text, Base);\n}}\n",
            format_id_as_hex(derive_id(FILE_ID, "Move"))
        );
        assert!(out.contains(&expected), "{}", out);
        assert!(out.find("struct Base").unwrap() < out.find("struct Move").unwrap());
        assert!(out.find(MAP_TEMPLATE).unwrap() < out.find("struct Base").unwrap());
    }

    #[test]
    fn test_declared_msg_type_is_not_duplicated() {
        let out = render("message Hello(3) { MessageType msgType; string who; }");
        assert!(out.contains("  msgType @0 : MessageType;\n  who @1 : Text;\n}"), "{}", out);
        assert_eq!(out.matches("msgType @").count(), 1);
    }

    #[test]
    fn test_output_path_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let schema = parse_schema("message A(1) { int32 x; }").unwrap();

        let file = dir.path().join("nested/out/schema.capnp");
        assert_eq!(write_capnp_file(&schema, &file).unwrap(), file);
        assert!(file.is_file());

        let as_dir = dir.path().join("gen");
        let written = write_capnp_file(&schema, &as_dir).unwrap();
        assert_eq!(written, as_dir.join(DEFAULT_CAPNP_FILE));
    }

    #[test]
    fn test_rewrite_keeps_file_id_and_derived_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.capnp");
        let schema = parse_schema("enum S { OK } message A(1) { S s; }").unwrap();

        write_capnp_file(&schema, &path).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        write_capnp_file(&schema, &path).unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }
}
