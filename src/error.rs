//! Configuration error taxonomy.
//!
//! Grid, mapping, and selection operations never fail: out-of-range
//! references are ignored. The only typed errors are configuration problems,
//! either in a loaded session file or in a column's constraints (date
//! formats, regex patterns). The validation pass downgrades the latter to
//! warnings and skips the offending constraint.

use std::path::PathBuf;

use thiserror::Error;

/// A date format string that cannot be translated into a parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateFormatError {
    #[error("date format is empty")]
    Empty,
    #[error("unsupported date token '{token}' in format '{format}'")]
    UnsupportedToken { token: String, format: String },
    #[error("unterminated quoted literal in format '{format}'")]
    UnterminatedLiteral { format: String },
    #[error("date format '{format}' does not contain a {part} token")]
    MissingPart { part: &'static str, format: String },
}

/// Problems with a session configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read session file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write session file {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse session YAML")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to serialize session YAML")]
    Serialize(#[source] serde_yaml::Error),
    #[error("{schema} schema defines no columns")]
    NoColumns { schema: &'static str },
    #[error("{schema} schema defines column key '{key}' more than once")]
    DuplicateKey { schema: &'static str, key: String },
    #[error("{schema} column '{label}' has an empty key")]
    EmptyKey { schema: &'static str, label: String },
    #[error("destination column '{key}' must declare a type")]
    MissingType { key: String },
    #[error("mapping references unknown destination column '{key}'")]
    UnknownDestination { key: String },
    #[error("mapping for '{destination}' references unknown source column '{source_key}'")]
    UnknownSource {
        destination: String,
        source_key: String,
    },
}
