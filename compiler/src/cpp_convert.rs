use brine_capnp_schema::{Primitive, Schema, TypeKind, TypeRef};

use crate::utils::upper_first;

/// Where a value lives on the Cap'n Proto side.
#[derive(Debug, Clone)]
pub enum Slot {
    /// A struct field, accessed through `get<Name>`/`set<Name>`/`init<Name>`.
    Field { owner: String, accessor: String },
    /// Element `index` of a list builder or reader.
    Element { list: String, index: String },
}

impl Slot {
    /// Slot for the DSL field `field_name` of the struct `owner`.
    pub fn field(owner: &str, field_name: &str) -> Slot {
        Slot::Field { owner: owner.to_string(), accessor: upper_first(field_name) }
    }

    fn element(list: &str, index: &str) -> Slot {
        Slot::Element { list: list.to_string(), index: index.to_string() }
    }

    fn set(&self, value: &str) -> String {
        match self {
            Slot::Field { owner, accessor } => format!("{}.set{}({});", owner, accessor, value),
            Slot::Element { list, index } => format!("{}.set({}, {});", list, index, value),
        }
    }

    fn init_list(&self, size: &str) -> String {
        match self {
            Slot::Field { owner, accessor } => format!("{}.init{}({})", owner, accessor, size),
            Slot::Element { list, index } => format!("{}.init({}, {})", list, index, size),
        }
    }

    fn struct_builder(&self) -> String {
        match self {
            Slot::Field { owner, accessor } => format!("{}.init{}()", owner, accessor),
            Slot::Element { list, index } => format!("{}[{}]", list, index),
        }
    }

    fn get(&self) -> String {
        match self {
            Slot::Field { owner, accessor } => format!("{}.get{}()", owner, accessor),
            Slot::Element { list, index } => format!("{}[{}]", list, index),
        }
    }

    fn has(&self) -> Option<String> {
        match self {
            Slot::Field { owner, accessor } => Some(format!("{}.has{}()", owner, accessor)),
            Slot::Element { .. } => None,
        }
    }
}

/// Emits C++ that copies wrapper members into Cap'n Proto builders and back.
///
/// Enum-typed values are cast between the wrapper `enum class` and the
/// Cap'n Proto enum in `capnp_namespace`. Nested message types go through
/// their own `to_capnp_struct`/`from_capnp_struct`.
pub struct Converter<'a> {
    schema:          &'a Schema,
    capnp_namespace: String,
}

impl<'a> Converter<'a> {
    pub fn new(schema: &'a Schema, capnp_namespace: &str) -> Self {
        Converter { schema, capnp_namespace: capnp_namespace.to_string() }
    }

    /// Lines writing `value` (a C++ expression of the wrapper type) into `slot`.
    pub fn write(&self, ty: &TypeRef, slot: &Slot, value: &str, indent: usize) -> Vec<String> {
        let mut lines = Vec::new();
        self.write_into(&mut lines, ty, slot, value, indent, 0);
        lines
    }

    /// Lines reading `slot` into `target` (an lvalue of the wrapper type).
    pub fn read(&self, ty: &TypeRef, slot: &Slot, target: &str, indent: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let pointer = matches!(self.schema.kind_of(ty), TypeKind::Custom | TypeKind::List | TypeKind::Map)
            || ty.primitive().is_some_and(Primitive::is_blob);

        match slot.has().filter(|_| pointer) {
            Some(has) => {
                lines.push(format!("{}if ({})", pad(indent), has));
                lines.push(format!("{}{{", pad(indent)));
                self.read_from(&mut lines, ty, slot, target, indent + 1, 0);
                lines.push(format!("{}}}", pad(indent)));
            }
            None => self.read_from(&mut lines, ty, slot, target, indent, 0),
        }
        lines
    }

    fn capnp_enum(&self, name: &str) -> String {
        format!("::{}::{}", self.capnp_namespace, name)
    }

    fn write_into(&self, out: &mut Vec<String>, ty: &TypeRef, slot: &Slot, value: &str, indent: usize, depth: usize) {
        let ind = pad(indent);
        match (self.schema.kind_of(ty), ty) {
            (_, TypeRef::Primitive(Primitive::String)) => {
                out.push(format!("{}{}", ind, slot.set(&format!("{}.c_str()", value))));
            }
            (_, TypeRef::Primitive(Primitive::Bytes)) => {
                out.push(format!(
                    "{}{}",
                    ind,
                    slot.set(&format!("::capnp::Data::Reader({0}.data(), {0}.size())", value))
                ));
            }
            (_, TypeRef::Primitive(_)) => {
                out.push(format!("{}{}", ind, slot.set(value)));
            }
            (TypeKind::Enum, TypeRef::Custom(name)) => {
                out.push(format!(
                    "{}{}",
                    ind,
                    slot.set(&format!("static_cast<{}>({})", self.capnp_enum(name), value))
                ));
            }
            (_, TypeRef::Custom(_)) => {
                out.push(format!("{}{}.to_capnp_struct({});", ind, value, slot.struct_builder()));
            }
            (_, TypeRef::List(element)) => {
                let list = format!("list_{}", depth);
                let index = format!("i_{}", depth);
                out.push(format!("{}{{", ind));
                out.push(format!(
                    "{}    auto {} = {};",
                    ind,
                    list,
                    slot.init_list(&format!("static_cast<unsigned int>({}.size())", value))
                ));
                out.push(format!(
                    "{}    for (unsigned int {1} = 0; {1} < {2}.size(); ++{1})",
                    ind, index, list
                ));
                out.push(format!("{}    {{", ind));
                self.write_into(
                    out,
                    element,
                    &Slot::element(&list, &index),
                    &format!("{}[{}]", value, index),
                    indent + 2,
                    depth + 1,
                );
                out.push(format!("{}    }}", ind));
                out.push(format!("{}}}", ind));
            }
            (_, TypeRef::Map(key, val)) => {
                let entries = format!("entries_{}", depth);
                let index = format!("idx_{}", depth);
                let entry = format!("entry_{}", depth);
                let (k, v) = (format!("key_{}", depth), format!("value_{}", depth));
                out.push(format!("{}{{", ind));
                out.push(format!(
                    "{}    auto {} = {}.initEntries(static_cast<unsigned int>({}.size()));",
                    ind,
                    entries,
                    slot.struct_builder(),
                    value
                ));
                out.push(format!("{}    unsigned int {} = 0;", ind, index));
                out.push(format!("{}    for (const auto& [{}, {}] : {})", ind, k, v, value));
                out.push(format!("{}    {{", ind));
                out.push(format!("{}        auto {} = {}[{}++];", ind, entry, entries, index));
                self.write_into(out, key, &Slot::field(&entry, "key"), &k, indent + 2, depth + 1);
                self.write_into(out, val, &Slot::field(&entry, "value"), &v, indent + 2, depth + 1);
                out.push(format!("{}    }}", ind));
                out.push(format!("{}}}", ind));
            }
        }
    }

    fn read_from(&self, out: &mut Vec<String>, ty: &TypeRef, slot: &Slot, target: &str, indent: usize, depth: usize) {
        let ind = pad(indent);
        match (self.schema.kind_of(ty), ty) {
            (_, TypeRef::Primitive(Primitive::String)) => {
                out.push(format!("{}{} = {}.cStr();", ind, target, slot.get()));
            }
            (_, TypeRef::Primitive(Primitive::Bytes)) => {
                let data = format!("data_{}", depth);
                out.push(format!("{}{{", ind));
                out.push(format!("{}    auto {} = {};", ind, data, slot.get()));
                out.push(format!("{}    {}.assign({2}.begin(), {2}.end());", ind, target, data));
                out.push(format!("{}}}", ind));
            }
            (_, TypeRef::Primitive(_)) => {
                out.push(format!("{}{} = {};", ind, target, slot.get()));
            }
            (TypeKind::Enum, TypeRef::Custom(name)) => {
                out.push(format!("{}{} = static_cast<{}>({});", ind, target, name, slot.get()));
            }
            (_, TypeRef::Custom(_)) => {
                out.push(format!("{}{}.from_capnp_struct({});", ind, target, slot.get()));
            }
            (_, TypeRef::List(element)) => {
                let list = format!("list_{}", depth);
                let index = format!("i_{}", depth);
                let item = format!("item_{}", depth);
                out.push(format!("{}{{", ind));
                out.push(format!("{}    auto {} = {};", ind, list, slot.get()));
                out.push(format!("{}    {}.clear();", ind, target));
                out.push(format!("{}    {}.reserve({}.size());", ind, target, list));
                out.push(format!(
                    "{}    for (unsigned int {1} = 0; {1} < {2}.size(); ++{1})",
                    ind, index, list
                ));
                out.push(format!("{}    {{", ind));
                out.push(format!("{}        {} {}{{}};", ind, element.cpp_type(), item));
                self.read_from(out, element, &Slot::element(&list, &index), &item, indent + 2, depth + 1);
                out.push(format!("{}        {}.push_back(std::move({}));", ind, target, item));
                out.push(format!("{}    }}", ind));
                out.push(format!("{}}}", ind));
            }
            (_, TypeRef::Map(key, val)) => {
                let entry = format!("entry_{}", depth);
                let (k, v) = (format!("key_{}", depth), format!("value_{}", depth));
                out.push(format!("{}{{", ind));
                out.push(format!("{}    {}.clear();", ind, target));
                out.push(format!("{}    for (auto {} : {}.getEntries())", ind, entry, slot.get()));
                out.push(format!("{}    {{", ind));
                out.push(format!("{}        {} {}{{}};", ind, key.cpp_type(), k));
                out.push(format!("{}        {} {}{{}};", ind, val.cpp_type(), v));
                self.read_from(out, key, &Slot::field(&entry, "key"), &k, indent + 2, depth + 1);
                self.read_from(out, val, &Slot::field(&entry, "value"), &v, indent + 2, depth + 1);
                out.push(format!("{}        {}.emplace(std::move({}), std::move({}));", ind, target, k, v));
                out.push(format!("{}    }}", ind));
                out.push(format!("{}}}", ind));
            }
        }
    }
}

fn pad(indent: usize) -> String {
    "    ".repeat(indent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brine_capnp_schema::{EnumDecl, EnumValue};

    fn schema_with_enum() -> Schema {
        let mut schema = Schema::default();
        schema.add_enum(EnumDecl {
            name:     "Status".to_string(),
            values:   vec![EnumValue::new("OK", 0)],
            capnp_id: 0,
        });
        schema
    }

    fn write(ty: &TypeRef, field: &str) -> String {
        let schema = schema_with_enum();
        let conv = Converter::new(&schema, "game::msg");
        conv.write(ty, &Slot::field("builder", field), field, 1).join("\n")
    }

    fn read(ty: &TypeRef, field: &str) -> String {
        let schema = schema_with_enum();
        let conv = Converter::new(&schema, "game::msg");
        conv.read(ty, &Slot::field("reader", field), field, 1).join("\n")
    }

    #[test]
    fn test_write_scalars() {
        assert_eq!(write(&TypeRef::Primitive(Primitive::Int32), "hp"), "    builder.setHp(hp);");
        assert_eq!(write(&TypeRef::Primitive(Primitive::String), "name"), "    builder.setName(name.c_str());");
        assert_eq!(
            write(&TypeRef::Primitive(Primitive::Bytes), "blob"),
            "    builder.setBlob(::capnp::Data::Reader(blob.data(), blob.size()));"
        );
        assert_eq!(
            write(&TypeRef::custom("Status"), "status"),
            "    builder.setStatus(static_cast<::game::msg::Status>(status));"
        );
        assert_eq!(
            write(&TypeRef::custom("Player"), "owner"),
            "    owner.to_capnp_struct(builder.initOwner());"
        );
    }

    #[test]
    fn test_write_list_of_enums() {
        let code = write(&TypeRef::list(TypeRef::custom("Status")), "history");
        assert_eq!(
            code,
            [
                "    {",
                "        auto list_0 = builder.initHistory(static_cast<unsigned int>(history.size()));",
                "        for (unsigned int i_0 = 0; i_0 < list_0.size(); ++i_0)",
                "        {",
                "            list_0.set(i_0, static_cast<::game::msg::Status>(history[i_0]));",
                "        }",
                "    }",
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_write_nested_list_and_map() {
        let code = write(
            &TypeRef::map(TypeRef::Primitive(Primitive::String), TypeRef::list(TypeRef::custom("Player"))),
            "teams",
        );
        assert!(code.contains("auto entries_0 = builder.initTeams().initEntries(static_cast<unsigned int>(teams.size()));"));
        assert!(code.contains("for (const auto& [key_0, value_0] : teams)"));
        assert!(code.contains("entry_0.setKey(key_0.c_str());"));
        assert!(code.contains("auto list_1 = entry_0.initValue(static_cast<unsigned int>(value_0.size()));"));
        assert!(code.contains("value_0[i_1].to_capnp_struct(list_1[i_1]);"));
    }

    #[test]
    fn test_read_guards_pointer_fields() {
        assert_eq!(read(&TypeRef::Primitive(Primitive::UInt8), "lvl"), "    lvl = reader.getLvl();");
        assert_eq!(
            read(&TypeRef::custom("Status"), "status"),
            "    status = static_cast<Status>(reader.getStatus());"
        );
        assert_eq!(
            read(&TypeRef::Primitive(Primitive::String), "name"),
            "    if (reader.hasName())\n    {\n        name = reader.getName().cStr();\n    }"
        );
    }

    #[test]
    fn test_read_list_of_lists() {
        let code = read(&TypeRef::list(TypeRef::list(TypeRef::Primitive(Primitive::Float32))), "grid");
        assert!(code.starts_with("    if (reader.hasGrid())"));
        assert!(code.contains("auto list_0 = reader.getGrid();"));
        assert!(code.contains("std::vector<float> item_0{};"));
        assert!(code.contains("auto list_1 = list_0[i_0];"));
        assert!(code.contains("float item_1{};"));
        assert!(code.contains("item_1 = list_1[i_1];"));
        assert!(code.contains("grid.push_back(std::move(item_0));"));
    }

    #[test]
    fn test_read_map() {
        let code = read(&TypeRef::map(TypeRef::Primitive(Primitive::UInt32), TypeRef::custom("Player")), "players");
        assert!(code.contains("for (auto entry_0 : reader.getPlayers().getEntries())"));
        assert!(code.contains("uint32_t key_0{};"));
        assert!(code.contains("Player value_0{};"));
        assert!(code.contains("key_0 = entry_0.getKey();"));
        assert!(code.contains("value_0.from_capnp_struct(entry_0.getValue());"));
        assert!(code.contains("players.emplace(std::move(key_0), std::move(value_0));"));
    }
}
