use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapnpGenError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema parse error at line {line}, column {column}: {msg}")]
    ParseError {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("Generation error: {0}")]
    GenerateError(String),
}

impl CapnpGenError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CapnpGenError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, CapnpGenError>;
