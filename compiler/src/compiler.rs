use std::{
    fs,
    path::{Path, PathBuf},
};

use brine_capnp_schema::Schema;

use crate::{
    comments::strip_comments,
    error::{CapnpGenError, Result},
    gen_capnp::write_capnp_file,
    gen_cpp::{CppGenerator, DEFAULT_CAPNP_HEADER},
    parser::parse_schema,
};

/// Everything one generation run needs.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub input:             PathBuf,
    /// A `.capnp` file, or a directory to hold `network_msg.capnp`.
    pub out_capnp:         PathBuf,
    /// C++ output is written only when both directories are set.
    pub out_hpp:           Option<PathBuf>,
    pub out_cpp:           Option<PathBuf>,
    pub capnp_header_name: String,
    /// Overrides `Schema::wrapper_namespace_name`, which the DSL cannot set.
    pub wrapper_namespace: Option<String>,
}

impl GenerateOptions {
    pub fn new(input: impl Into<PathBuf>, out_capnp: impl Into<PathBuf>) -> Self {
        GenerateOptions {
            input:             input.into(),
            out_capnp:         out_capnp.into(),
            out_hpp:           None,
            out_cpp:           None,
            capnp_header_name: DEFAULT_CAPNP_HEADER.to_string(),
            wrapper_namespace: None,
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub schema:     Schema,
    pub capnp_file: PathBuf,
    /// Headers first, then sources; empty when C++ output was not requested.
    pub cpp_files:  Vec<PathBuf>,
}

impl GenerationReport {
    pub fn message_count(&self) -> usize {
        self.schema.messages.len()
    }

    pub fn enum_count(&self) -> usize {
        self.schema.enums.len()
    }
}

/// Strip comments from DSL source and parse it.
pub fn compile_schema(text: &str) -> Result<Schema> {
    parse_schema(&strip_comments(text))
}

/// Read and parse a DSL file. A read failure is reported before any lexing.
pub fn parse_schema_file(path: &Path) -> Result<Schema> {
    let text = fs::read_to_string(path).map_err(|e| CapnpGenError::io(path, e))?;
    compile_schema(&text)
}

/// Parse `options.input` and write the Cap'n Proto schema, plus the C++
/// wrappers when both C++ directories are given.
pub fn generate(options: &GenerateOptions) -> Result<GenerationReport> {
    let mut schema = parse_schema_file(&options.input)?;
    if let Some(ns) = &options.wrapper_namespace {
        schema.wrapper_namespace_name = ns.clone();
    }
    tracing::debug!(
        input = %options.input.display(),
        messages = schema.messages.len(),
        enums = schema.enums.len(),
        "parsed schema"
    );

    let capnp_file = write_capnp_file(&schema, &options.out_capnp)?;

    let cpp_files = match (&options.out_hpp, &options.out_cpp) {
        (Some(hpp), Some(cpp)) => {
            CppGenerator::new(&schema, hpp, cpp, &options.capnp_header_name).write_all()?
        }
        (None, None) => Vec::new(),
        _ => {
            return Err(CapnpGenError::GenerateError(
                "--out-hpp and --out-cpp must be given together".to_string(),
            ))
        }
    };

    tracing::info!(
        capnp = %capnp_file.display(),
        cpp_files = cpp_files.len(),
        "generation finished"
    );

    Ok(GenerationReport { schema, capnp_file, cpp_files })
}
