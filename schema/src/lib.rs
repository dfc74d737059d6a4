//! This is the in-memory model produced by the brine-capnp compiler when it
//! parses a message DSL file. Emitters receive a finished [`Schema`] and only
//! ever read from it.
//!
//! ```
//! use brine_capnp_schema::*;
//!
//! let mut schema = Schema::default();
//! schema.add_message(Message {
//!     id:          7,
//!     name:        "Ping".to_owned(),
//!     parent_name: String::new(),
//!     fields:      vec![Field::new("seq", TypeRef::list(TypeRef::Primitive(Primitive::UInt32)))],
//! });
//!
//! let ping = &schema.messages["Ping"];
//! assert_eq!(ping.fields[0].ty.capnp_type(), "List(UInt32)");
//! assert_eq!(ping.fields[0].ty.cpp_type(), "std::vector<uint32_t>");
//! assert_eq!(ping.capnp_id_string(), "@0x0000000000000007");
//! ```

pub mod schema;
pub mod types;

pub use schema::*;
pub use types::*;

/// Name of the discriminator enum synthesized after every parse.
pub const MESSAGE_TYPE_ENUM: &str = "MessageType";

/// Field name the Cap'n Proto writer reserves for the discriminator.
pub const MESSAGE_TYPE_FIELD: &str = "msgType";

/// Render an ID the way Cap'n Proto annotates it: `@0x` + 16 lowercase hex digits.
pub fn format_capnp_id(id: u64) -> String {
    format!("@0x{:016x}", id)
}
