use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use brine_capnp_schema::{EnumDecl, Message, Schema, TypeKind, TypeRef, MESSAGE_TYPE_ENUM};

use crate::{
    cpp_convert::{Converter, Slot},
    error::{CapnpGenError, Result},
    gen_capnp::{is_message_type_field, DEFAULT_CAPNP_NAMESPACE},
    user_sections::UserSections,
    utils::{lower_first, to_cpp_namespace},
};

/// C++ namespace for wrapper classes when the schema names none.
pub const DEFAULT_WRAPPER_NAMESPACE: &str = "capnpgen::net";

/// Header `capnp compile -oc++` produces for `network_msg.capnp`.
pub const DEFAULT_CAPNP_HEADER: &str = "network_msg.capnp.h";

pub const MESSAGE_BASE_FILE: &str = "message_base.hpp";
pub const ENUMS_FILE:        &str = "enums.hpp";
pub const FACTORY_FILE:      &str = "factory_builder.hpp";

const MESSAGE_BASE_TEMPLATE: &str = "\
#pragma once

#include <cstddef>
#include <cstdint>
#include <cstdlib>
#include <string>
#include <vector>

namespace {namespace}
{

/// @brief Owning, word-aligned buffer returned by MessageBase::serialize_fast.
class SerializedData
{
public:
    SerializedData() = default;

    SerializedData(void* buffer, std::size_t size, std::size_t word_count)
        : buffer(buffer), size(size), word_count(word_count)
    {
    }

    ~SerializedData() { std::free(buffer); }

    SerializedData(const SerializedData&) = delete;
    SerializedData& operator=(const SerializedData&) = delete;

    SerializedData(SerializedData&& other) noexcept
        : buffer(other.buffer), size(other.size), word_count(other.word_count)
    {
        other.buffer = nullptr;
        other.size = 0;
        other.word_count = 0;
    }

    SerializedData& operator=(SerializedData&& other) noexcept
    {
        if (this != &other)
        {
            std::free(buffer);
            buffer = other.buffer;
            size = other.size;
            word_count = other.word_count;
            other.buffer = nullptr;
            other.size = 0;
            other.word_count = 0;
        }
        return *this;
    }

    const std::uint8_t* bytes() const { return static_cast<const std::uint8_t*>(buffer); }
    bool empty() const { return buffer == nullptr; }

    void* buffer = nullptr;
    std::size_t size = 0;
    std::size_t word_count = 0;
};

/// @brief Common interface of every generated message class.
class MessageBase
{
public:
    MessageBase() = default;
    virtual ~MessageBase() = default;
    MessageBase(const MessageBase& other) = default;
    MessageBase(MessageBase&& other) noexcept = default;
    MessageBase& operator=(const MessageBase& other) = default;
    MessageBase& operator=(MessageBase&& other) noexcept = default;

    virtual std::uint64_t get_message_id() const = 0;
    virtual std::string get_message_name() const = 0;
    virtual std::vector<std::uint8_t> serialize() const = 0;
    virtual SerializedData serialize_fast() const = 0;
    virtual bool deserialize(const std::vector<std::uint8_t>& data) = 0;
    virtual bool deserialize(const std::uint8_t* data, std::size_t size) = 0;
};

} // namespace {namespace}
";

/// Writes the C++ wrapper layer for a parsed schema: one class per message
/// plus the shared base class, enum definitions and factory.
pub struct CppGenerator<'a> {
    schema:            &'a Schema,
    header_dir:        PathBuf,
    source_dir:        PathBuf,
    wrapper_namespace: String,
    capnp_namespace:   String,
    include_prefix:    String,
    capnp_header_name: String,
}

impl<'a> CppGenerator<'a> {
    pub fn new(schema: &'a Schema, header_dir: &Path, source_dir: &Path, capnp_header_name: &str) -> Self {
        let wrapper_namespace = match schema.wrapper_namespace() {
            "" => DEFAULT_WRAPPER_NAMESPACE.to_string(),
            ns => to_cpp_namespace(ns),
        };
        let capnp_namespace = match schema.namespace_name.as_str() {
            "" => DEFAULT_CAPNP_NAMESPACE.to_string(),
            ns => to_cpp_namespace(ns),
        };

        CppGenerator {
            schema,
            header_dir: header_dir.to_path_buf(),
            source_dir: source_dir.to_path_buf(),
            wrapper_namespace,
            capnp_namespace,
            include_prefix: include_prefix(header_dir),
            capnp_header_name: capnp_header_name.to_string(),
        }
    }

    pub fn include_prefix(&self) -> &str {
        &self.include_prefix
    }

    /// Write every file and return the paths written, headers first.
    pub fn write_all(&self) -> Result<Vec<PathBuf>> {
        for dir in [&self.header_dir, &self.source_dir] {
            fs::create_dir_all(dir).map_err(|e| CapnpGenError::io(dir, e))?;
        }

        let mut written = Vec::new();

        let path = self.header_dir.join(MESSAGE_BASE_FILE);
        written.push(write_file(path, &self.render_message_base())?);

        let path = self.header_dir.join(ENUMS_FILE);
        let content = self.render_enums(&UserSections::load(&path)?);
        written.push(write_file(path, &content)?);

        for message in self.sorted_messages() {
            let path = self.header_dir.join(format!("{}.hpp", message.name));
            let content = self.render_header(message, &UserSections::load(&path)?);
            written.push(write_file(path, &content)?);
        }

        let path = self.header_dir.join(FACTORY_FILE);
        written.push(write_file(path, &self.render_factory())?);

        for message in self.sorted_messages() {
            let path = self.source_dir.join(format!("{}.cpp", message.name));
            let content = self.render_source(message, &UserSections::load(&path)?);
            written.push(write_file(path, &content)?);
        }

        Ok(written)
    }

    fn sorted_messages(&self) -> Vec<&'a Message> {
        let mut messages: Vec<&Message> = self.schema.messages.values().collect();
        messages.sort_by(|a, b| a.name.cmp(&b.name));
        messages
    }

    fn include(&self, file: &str) -> String {
        format!("#include \"{}{}\"", self.include_prefix, file)
    }

    fn capnp_struct(&self, message: &Message) -> String {
        format!("::{}::{}", self.capnp_namespace, message.name)
    }

    /// Parent class, or `MessageBase` when the parent is not a known message.
    fn base_class(&self, message: &Message) -> String {
        match message.parent().filter(|p| self.schema.messages.contains_key(*p)) {
            Some(parent) => parent.to_string(),
            None => "MessageBase".to_string(),
        }
    }

    /// Name of this message's entry in the `MessageType` enum.
    fn message_type_entry(&self, message: &Message) -> Option<String> {
        let decl = self.schema.enums.get(MESSAGE_TYPE_ENUM)?;
        [lower_first(&message.name), message.name.clone()]
            .into_iter()
            .find(|name| decl.value_of(name).is_some())
    }

    pub fn render_message_base(&self) -> String {
        MESSAGE_BASE_TEMPLATE.replace("{namespace}", &self.wrapper_namespace)
    }

    pub fn render_enums(&self, sections: &UserSections) -> String {
        let ns = &self.wrapper_namespace;
        let mut lines = vec![
            "#pragma once".to_string(),
            String::new(),
            "#include <cstdint>".to_string(),
            "#include <ostream>".to_string(),
            String::new(),
        ];
        lines.extend(sections.render("INCLUDES", ""));
        lines.push(String::new());
        lines.push(format!("namespace {}", ns));
        lines.push("{".to_string());
        lines.push(String::new());

        let mut decls: Vec<&EnumDecl> = self.schema.enums.values().collect();
        decls.sort_by(|a, b| a.name.cmp(&b.name));
        for decl in decls {
            lines.extend(render_enum_class(decl));
            lines.push(String::new());
        }

        lines.extend(sections.render("DEFINITIONS", ""));
        lines.push(String::new());
        lines.push(format!("}} // namespace {}", ns));
        lines.join("\n") + "\n"
    }

    pub fn render_header(&self, message: &Message, sections: &UserSections) -> String {
        let name = &message.name;
        let base = self.base_class(message);
        let ns = &self.wrapper_namespace;

        let mut lines = vec![
            "#pragma once".to_string(),
            String::new(),
            "#include <cstddef>".to_string(),
            "#include <cstdint>".to_string(),
            "#include <string>".to_string(),
            "#include <unordered_map>".to_string(),
            "#include <vector>".to_string(),
            String::new(),
            "#include <capnp/message.h>".to_string(),
            format!("#include \"{}\"", self.capnp_header_name),
            String::new(),
            self.include(MESSAGE_BASE_FILE),
            self.include(ENUMS_FILE),
        ];
        for dependency in self.header_dependencies(message) {
            lines.push(self.include(&format!("{}.hpp", dependency)));
        }
        lines.push(String::new());
        lines.extend(sections.render("INCLUDES", ""));
        lines.push(String::new());
        lines.push(format!("namespace {}", ns));
        lines.push("{".to_string());
        lines.push(String::new());
        lines.push(format!("/// @brief Wrapper for message {} (id {}).", name, message.id));
        lines.push(format!("class {} : public {}", name, base));
        lines.push("{".to_string());
        lines.push("public:".to_string());
        lines.push(format!("    {}();", name));
        lines.push(format!("    {0}(const {0}& other);", name));
        lines.push(format!("    {0}({0}&& other) noexcept;", name));
        lines.push(format!("    {0}& operator=(const {0}& other);", name));
        lines.push(format!("    {0}& operator=({0}&& other) noexcept;", name));
        lines.push(format!("    ~{}() override;", name));
        lines.push(String::new());
        lines.push("    std::uint64_t get_message_id() const override;".to_string());
        lines.push("    std::string get_message_name() const override;".to_string());
        lines.push("    std::vector<std::uint8_t> serialize() const override;".to_string());
        lines.push("    SerializedData serialize_fast() const override;".to_string());
        lines.push("    bool deserialize(const std::vector<std::uint8_t>& data) override;".to_string());
        lines.push("    bool deserialize(const std::uint8_t* data, std::size_t size) override;".to_string());
        lines.push(String::new());
        lines.push("    void to_capnp(::capnp::MessageBuilder& message_builder) const;".to_string());
        lines.push("    void from_capnp(::capnp::MessageReader& message_reader);".to_string());
        lines.push(format!("    void to_capnp_struct({}::Builder builder) const;", self.capnp_struct(message)));
        lines.push(format!("    void from_capnp_struct({}::Reader reader);", self.capnp_struct(message)));

        if !message.fields.is_empty() {
            lines.push(String::new());
            for field in &message.fields {
                lines.push(format!("    {} {}{{}};", field.ty.cpp_type(), field.name));
            }
        }

        lines.push(String::new());
        lines.extend(sections.render("METHODS", "    "));
        lines.push(String::new());
        lines.push("protected:".to_string());
        lines.extend(sections.render("PROTECTED", "    "));
        lines.push(String::new());
        lines.push("private:".to_string());
        lines.push(format!("    void _copy_from(const {}& other);", name));
        lines.push(String::new());
        lines.extend(sections.render("PRIVATE", "    "));
        lines.push("};".to_string());
        lines.push(String::new());
        lines.push(format!("}} // namespace {}", ns));
        lines.join("\n") + "\n"
    }

    /// Generated headers a message header must include: its parent and every
    /// message type its own fields mention.
    fn header_dependencies(&self, message: &Message) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        if let Some(parent) = message.parent().filter(|p| self.schema.messages.contains_key(*p)) {
            names.insert(parent.to_string());
        }
        for field in &message.fields {
            self.collect_message_types(&field.ty, &mut names);
        }
        names.remove(&message.name);
        names
    }

    fn collect_message_types(&self, ty: &TypeRef, names: &mut BTreeSet<String>) {
        match ty {
            TypeRef::Custom(name) if self.schema.kind_of(ty) == TypeKind::Custom => {
                names.insert(name.clone());
            }
            TypeRef::List(element) => self.collect_message_types(element, names),
            TypeRef::Map(key, value) => {
                self.collect_message_types(key, names);
                self.collect_message_types(value, names);
            }
            _ => {}
        }
    }

    pub fn render_source(&self, message: &Message, sections: &UserSections) -> String {
        let name = &message.name;
        let base = self.base_class(message);
        let ns = &self.wrapper_namespace;
        let capnp_struct = self.capnp_struct(message);
        let converter = Converter::new(self.schema, &self.capnp_namespace);

        let mut lines = vec![
            self.include(&format!("{}.hpp", name)),
            String::new(),
            "#include <capnp/serialize.h>".to_string(),
            "#include <kj/array.h>".to_string(),
            "#include <cstdlib>".to_string(),
            "#include <cstring>".to_string(),
            String::new(),
        ];
        lines.extend(sections.render("IMPL_INCLUDES", ""));
        lines.push(String::new());
        lines.push(format!("namespace {}", ns));
        lines.push("{".to_string());
        lines.push(String::new());

        lines.push(format!("{0}::{0}()", name));
        lines.push(format!("    : {}()", base));
        lines.push("{".to_string());
        lines.extend(sections.render("CONSTRUCTOR", ""));
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("{0}::{0}(const {0}& other)", name));
        lines.push(format!("    : {}(other)", base));
        lines.push("{".to_string());
        lines.push("    _copy_from(other);".to_string());
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("{0}::{0}({0}&& other) noexcept", name));
        lines.push(format!("    : {}(std::move(other))", base));
        for field in &message.fields {
            lines.push(format!("    , {0}(std::move(other.{0}))", field.name));
        }
        lines.push("{".to_string());
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("{0}& {0}::operator=(const {0}& other)", name));
        lines.push("{".to_string());
        lines.push("    if (this != &other)".to_string());
        lines.push("    {".to_string());
        lines.push(format!("        {}::operator=(other);", base));
        lines.push("        _copy_from(other);".to_string());
        lines.push("    }".to_string());
        lines.push("    return *this;".to_string());
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("{0}& {0}::operator=({0}&& other) noexcept", name));
        lines.push("{".to_string());
        lines.push("    if (this != &other)".to_string());
        lines.push("    {".to_string());
        lines.push(format!("        {}::operator=(std::move(other));", base));
        for field in &message.fields {
            lines.push(format!("        {0} = std::move(other.{0});", field.name));
        }
        lines.push("    }".to_string());
        lines.push("    return *this;".to_string());
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("{0}::~{0}() = default;", name));
        lines.push(String::new());

        lines.push(format!("std::uint64_t {}::get_message_id() const", name));
        lines.push("{".to_string());
        lines.push(format!("    return {}ULL;", message.id));
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("std::string {}::get_message_name() const", name));
        lines.push("{".to_string());
        lines.push(format!("    return \"{}\";", name));
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("std::vector<std::uint8_t> {}::serialize() const", name));
        lines.push("{".to_string());
        lines.push("    auto fast = serialize_fast();".to_string());
        lines.push("    return std::vector<std::uint8_t>(fast.bytes(), fast.bytes() + fast.size);".to_string());
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("SerializedData {}::serialize_fast() const", name));
        lines.push("{".to_string());
        lines.push("    ::capnp::MallocMessageBuilder message_builder;".to_string());
        lines.push("    to_capnp(message_builder);".to_string());
        lines.push(String::new());
        lines.push("    kj::Array<capnp::word> words = capnp::messageToFlatArray(message_builder);".to_string());
        lines.push("    const std::size_t byte_size = words.size() * sizeof(capnp::word);".to_string());
        lines.push("    void* buffer = std::aligned_alloc(alignof(capnp::word), byte_size);".to_string());
        lines.push("    if (!buffer)".to_string());
        lines.push("    {".to_string());
        lines.push("        return {};".to_string());
        lines.push("    }".to_string());
        lines.push("    std::memcpy(buffer, words.begin(), byte_size);".to_string());
        lines.push("    return SerializedData(buffer, byte_size, words.size());".to_string());
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("bool {}::deserialize(const std::vector<std::uint8_t>& data)", name));
        lines.push("{".to_string());
        lines.push("    return deserialize(data.data(), data.size());".to_string());
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("bool {}::deserialize(const std::uint8_t* data, std::size_t size)", name));
        lines.push("{".to_string());
        lines.push("    try".to_string());
        lines.push("    {".to_string());
        lines.push("        kj::ArrayPtr<const capnp::word> words(".to_string());
        lines.push("            reinterpret_cast<const capnp::word*>(data),".to_string());
        lines.push("            size / sizeof(capnp::word));".to_string());
        lines.push("        ::capnp::FlatArrayMessageReader reader(words);".to_string());
        lines.push("        from_capnp(reader);".to_string());
        lines.push("        return true;".to_string());
        lines.push("    }".to_string());
        lines.push("    catch (...)".to_string());
        lines.push("    {".to_string());
        lines.push("        return false;".to_string());
        lines.push("    }".to_string());
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("void {}::to_capnp(::capnp::MessageBuilder& message_builder) const", name));
        lines.push("{".to_string());
        lines.push(format!("    to_capnp_struct(message_builder.initRoot<{}>());", capnp_struct));
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("void {}::from_capnp(::capnp::MessageReader& message_reader)", name));
        lines.push("{".to_string());
        lines.push(format!("    from_capnp_struct(message_reader.getRoot<{}>());", capnp_struct));
        lines.push("}".to_string());
        lines.push(String::new());

        let fields = self.schema.flatten_fields(message);
        let declares_msg_type = fields.first().is_some_and(|f| is_message_type_field(self.schema, f));

        lines.push(format!("void {}::to_capnp_struct({}::Builder builder) const", name, capnp_struct));
        lines.push("{".to_string());
        if !declares_msg_type {
            let value = match self.message_type_entry(message) {
                Some(entry) => format!("{}::{}", MESSAGE_TYPE_ENUM, entry),
                None => format!("{}ULL", message.id),
            };
            lines.push(format!(
                "    builder.setMsgType(static_cast<::{}::{}>({}));",
                self.capnp_namespace, MESSAGE_TYPE_ENUM, value
            ));
        }
        for field in &fields {
            lines.extend(converter.write(&field.ty, &Slot::field("builder", &field.name), &field.name, 1));
        }
        lines.extend(sections.render("TO_CAPNP", ""));
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("void {}::from_capnp_struct({}::Reader reader)", name, capnp_struct));
        lines.push("{".to_string());
        for field in &fields {
            lines.extend(converter.read(&field.ty, &Slot::field("reader", &field.name), &field.name, 1));
        }
        lines.extend(sections.render("FROM_CAPNP", ""));
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push(format!("void {0}::_copy_from(const {0}& other)", name));
        lines.push("{".to_string());
        for field in &message.fields {
            lines.push(format!("    {0} = other.{0};", field.name));
        }
        lines.extend(sections.render("COPY_FROM", ""));
        lines.push("}".to_string());
        lines.push(String::new());

        lines.extend(sections.render("IMPL", ""));
        lines.push(String::new());
        lines.push(format!("}} // namespace {}", ns));
        lines.join("\n") + "\n"
    }

    pub fn render_factory(&self) -> String {
        let ns = &self.wrapper_namespace;
        let messages = self.sorted_messages();

        let mut lines = vec![
            "#pragma once".to_string(),
            String::new(),
            "#include <cstdint>".to_string(),
            "#include <memory>".to_string(),
            "#include <stdexcept>".to_string(),
            "#include <string>".to_string(),
            String::new(),
            self.include(MESSAGE_BASE_FILE),
            self.include(ENUMS_FILE),
        ];
        for message in &messages {
            lines.push(self.include(&format!("{}.hpp", message.name)));
        }
        lines.push(String::new());
        lines.push(format!("namespace {}", ns));
        lines.push("{".to_string());
        lines.push(String::new());
        lines.push("/// @brief Creates an empty message object for a MessageType value.".to_string());
        lines.push("class FactoryBuilder".to_string());
        lines.push("{".to_string());
        lines.push("public:".to_string());
        lines.push(format!(
            "    static std::shared_ptr<MessageBase> create_message({} type)",
            MESSAGE_TYPE_ENUM
        ));
        lines.push("    {".to_string());
        lines.push("        switch (type)".to_string());
        lines.push("        {".to_string());
        for message in &messages {
            match self.message_type_entry(message) {
                Some(entry) => lines.push(format!(
                    "            case {}::{}: return std::make_shared<{}>();",
                    MESSAGE_TYPE_ENUM, entry, message.name
                )),
                None => tracing::warn!(name = %message.name, "no MessageType entry; left out of factory"),
            }
        }
        lines.push("            default:".to_string());
        lines.push(
            "                throw std::runtime_error(\"Unknown message type: \" + std::to_string(static_cast<std::int64_t>(type)));"
                .to_string(),
        );
        lines.push("        }".to_string());
        lines.push("    }".to_string());
        lines.push("};".to_string());
        lines.push(String::new());
        lines.push(format!("}} // namespace {}", ns));
        lines.join("\n") + "\n"
    }
}

fn render_enum_class(decl: &EnumDecl) -> Vec<String> {
    let mut lines = vec![format!("enum class {} : std::int64_t", decl.name), "{".to_string()];
    for value in &decl.values {
        lines.push(format!("    {} = {},", value.name, value.value));
    }
    lines.push("};".to_string());
    lines.push(String::new());
    lines.push(format!("inline std::ostream& operator<<(std::ostream& os, {} value)", decl.name));
    lines.push("{".to_string());
    lines.push("    switch (value)".to_string());
    lines.push("    {".to_string());
    for value in &decl.values {
        lines.push(format!(
            "        case {}::{}: return os << \"{}\";",
            decl.name, value.name, value.name
        ));
    }
    lines.push("        default: return os << \"Unknown(\" << static_cast<std::int64_t>(value) << \")\";".to_string());
    lines.push("    }".to_string());
    lines.push("}".to_string());
    lines
}

/// `include/net/` -> `net/`; empty when the directory has no final component.
pub fn include_prefix(header_dir: &Path) -> String {
    match header_dir.file_name() {
        Some(name) => format!("{}/", name.to_string_lossy()),
        None => String::new(),
    }
}

fn write_file(path: PathBuf, content: &str) -> Result<PathBuf> {
    fs::write(&path, content).map_err(|e| CapnpGenError::io(&path, e))?;
    tracing::debug!(path = %path.display(), "wrote");
    Ok(path)
}
