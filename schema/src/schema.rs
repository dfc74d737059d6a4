use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::{format_capnp_id, types::{Field, TypeKind, TypeRef}};

/// A `message Name(id) extends Parent { ... }` declaration.
///
/// Inheritance is by name only: `fields` holds just the fields declared in
/// this block. Use [`Schema::flatten_fields`] to see inherited ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id:          u64,
    pub name:        String,
    /// Empty when the message has no parent.
    pub parent_name: String,
    pub fields:      Vec<Field>,
}

impl Message {
    pub fn parent(&self) -> Option<&str> {
        if self.parent_name.is_empty() {
            None
        } else {
            Some(self.parent_name.as_str())
        }
    }

    pub fn capnp_id_string(&self) -> String {
        format_capnp_id(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumValue {
    pub name:  String,
    pub value: i64,
}

impl EnumValue {
    pub fn new(name: impl Into<String>, value: i64) -> EnumValue {
        EnumValue { name: name.into(), value }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnumDecl {
    pub name:     String,
    pub values:   Vec<EnumValue>,
    /// Explicit `@id` from the DSL; 0 means derive one from the file ID.
    pub capnp_id: u64,
}

impl EnumDecl {
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.values.iter().find(|v| v.name == name).map(|v| v.value)
    }
}

/// Everything parsed from one DSL file.
///
/// `messages` and `enums` are keyed by name. `message_order` records the
/// order `message` blocks were parsed in, including repeats, and is what any
/// order-sensitive consumer must iterate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub namespace_name:         String,
    pub wrapper_namespace_name: String,
    pub messages:               IndexMap<String, Message>,
    pub enums:                  IndexMap<String, EnumDecl>,
    pub message_order:          Vec<String>,
}

impl Schema {
    /// Store a message, replacing any earlier one with the same name, and
    /// record it in `message_order`.
    pub fn add_message(&mut self, message: Message) {
        self.message_order.push(message.name.clone());
        self.messages.insert(message.name.clone(), message);
    }

    /// Store an enum, replacing any earlier one with the same name.
    pub fn add_enum(&mut self, decl: EnumDecl) {
        self.enums.insert(decl.name.clone(), decl);
    }

    /// Namespace for wrapper code: `wrapper_namespace_name`, falling back to
    /// `namespace_name`.
    pub fn wrapper_namespace(&self) -> &str {
        if self.wrapper_namespace_name.is_empty() {
            &self.namespace_name
        } else {
            &self.wrapper_namespace_name
        }
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    /// Kind of `ty` once enum names are known: a `Custom` naming a declared
    /// enum is reported as `Enum`.
    pub fn kind_of(&self, ty: &TypeRef) -> TypeKind {
        match ty {
            TypeRef::Custom(name) if self.is_enum(name) => TypeKind::Enum,
            other => other.kind(),
        }
    }

    /// Fields of `message` including inherited ones, parents first.
    ///
    /// A parent name that is not a known message ends the walk, as does a
    /// chain that comes back to a message already visited.
    pub fn flatten_fields<'a>(&'a self, message: &'a Message) -> Vec<&'a Field> {
        let mut chain = vec![message];
        let mut seen = HashSet::from([message.name.as_str()]);
        let mut current = message;

        while let Some(parent) = current.parent().and_then(|p| self.messages.get(p)) {
            if !seen.insert(parent.name.as_str()) {
                break;
            }
            chain.push(parent);
            current = parent;
        }

        chain
            .into_iter()
            .rev()
            .flat_map(|m| m.fields.iter())
            .collect()
    }
}
