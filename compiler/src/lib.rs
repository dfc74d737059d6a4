//! brine-capnp-compiler
//!
//! This crate implements:
//!  1) Comment stripping and a pull lexer for the message DSL,
//!  2) The field type resolver (`list<...>`, `map<...>`, primitives, custom names),
//!  3) The schema parser, including `MessageType` synthesis,
//!  4) Deterministic Cap'n Proto ID derivation and file-ID reuse,
//!  5) Emitters for the `.capnp` schema and the C++ wrapper layer,
//!  6) Error types (`CapnpGenError`) and the `generate` entry point.

pub mod error;
pub mod utils;
pub mod comments;
pub mod tokenizer;
pub mod type_parser;
pub mod parser;
pub mod ids;
pub mod gen_capnp;
pub mod user_sections;
pub mod cpp_convert;
pub mod gen_cpp;
pub mod compiler;

pub use compiler::{compile_schema, generate, parse_schema_file, GenerateOptions, GenerationReport};
pub use error::{CapnpGenError, Result};
pub use gen_capnp::{render_capnp, write_capnp_file};
pub use gen_cpp::CppGenerator;
pub use ids::{derive_id, random_id};
pub use parser::parse_schema;
