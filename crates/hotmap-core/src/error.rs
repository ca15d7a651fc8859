//! Error types for descriptor parsing and id qualification.
//!
//! We keep errors simple and actionable. Each variant tells you
//! which file or id went wrong and (usually) how to fix it.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for functions that can fail while reading descriptors.
pub type Result<T> = std::result::Result<T, DescriptorError>;

/// Things that can go wrong when reading a descriptor file.
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// Couldn't read the file from disk.
    #[error("failed to read descriptor '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed XML.
    #[error("malformed xml in '{origin}': {message}")]
    Xml { origin: String, message: String },

    /// Well-formed XML that doesn't describe what we expected, such as
    /// a mapper without a namespace or a bean without an id.
    #[error("invalid descriptor '{origin}': {message}")]
    Invalid { origin: String, message: String },

    /// A locally declared id broke the qualification rule.
    #[error("in '{origin}': {source}")]
    Qualify {
        origin: String,
        #[source]
        source: QualifyError,
    },
}

impl DescriptorError {
    /// Creates an IO error with the path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn xml(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::Xml {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

/// Raised synchronously by id qualification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QualifyError {
    /// Local ids may not carry their own qualifier.
    #[error("dots are not allowed in element names, please remove it from '{id}' (namespace '{namespace}')")]
    DottedLocalId { id: String, namespace: String },

    #[error("empty id in namespace '{0}'")]
    EmptyId(String),
}
