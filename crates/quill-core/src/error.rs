use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::document::NodeKey;

/// Category of a failed backend command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The backend could not be reached
    Unreachable,
    /// The referenced entity does not exist
    NotFound,
    /// The backend refused the request
    Rejected,
    /// The reply could not be decoded into the expected shape
    Malformed,
    /// Client-side fault (e.g. a cache entry holding an unexpected type)
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Malformed => "malformed",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Typed error descriptor carried by the error variant of a command reply.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CommandError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
}

impl CommandError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unreachable, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejected, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

/// Form-level checks performed before any command is issued
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("node {0} does not exist")]
    MissingNode(NodeKey),
    #[error("node {key} is a {found}, expected {expected}")]
    WrongKind {
        key: NodeKey,
        expected: &'static str,
        found: String,
    },
    #[error("offset {offset} is out of bounds for node {key}")]
    OffsetOutOfBounds { key: NodeKey, offset: usize },
    #[error("the root node cannot be {0}")]
    RootOperation(&'static str),
    #[error("invalid serialized state: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DocumentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeaheadError {
    #[error("no link suggestion is being composed")]
    NotComposing,
    #[error("no suggestion at index {index} (have {available})")]
    NoOption { index: usize, available: usize },
    #[error("text no longer reads {expected:?} where the suggestion started")]
    SpanChanged { expected: String },
    #[error(transparent)]
    Document(#[from] DocumentError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    #[error("could not serialize the document: {0}")]
    Document(#[from] DocumentError),
    #[error("could not save the document: {0}")]
    Command(#[from] CommandError),
}
