//! The flat error hierarchy from spec.md §7, realized as one
//! `thiserror`-derived enum (teacher pattern: `SQLParseError`/`SQLLexError`
//! in `crates/parser-core/src/errors.rs` -- a `#[error("...")]` template
//! per struct, not a hand-written `Display` impl).

use thiserror::Error;

/// The flat taxonomy a host serializes as `{ kind, message }` (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxError,
    SemanticError,
    TypeError,
    ConstraintError,
    NotFoundError,
    FeatureError,
    IOError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::SemanticError => "SemanticError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ConstraintError => "ConstraintError",
            ErrorKind::NotFoundError => "NotFoundError",
            ErrorKind::FeatureError => "FeatureError",
            ErrorKind::IOError => "IOError",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("syntax error at position {position}: expected {expected}, found {found}")]
    SyntaxError {
        expected: String,
        found: String,
        position: usize,
    },

    #[error("semantic error: {message}")]
    SemanticError { message: String },

    #[error("ambiguous column `{column}`: present in more than one relation")]
    AmbiguousColumn { column: String },

    #[error("type error: {message}")]
    TypeError { message: String },

    #[error("constraint violation: {message}")]
    ConstraintError { message: String },

    #[error(
        "circular foreign key dependency detected: {}",
        path.join(" -> ")
    )]
    CircularFK { path: Vec<String> },

    #[error("not found: {message}")]
    NotFoundError { message: String },

    #[error("unsupported: {message}")]
    FeatureError { message: String },

    #[error("io error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SyntaxError { .. } => ErrorKind::SyntaxError,
            Error::SemanticError { .. } | Error::AmbiguousColumn { .. } => ErrorKind::SemanticError,
            Error::TypeError { .. } => ErrorKind::TypeError,
            Error::ConstraintError { .. } | Error::CircularFK { .. } => ErrorKind::ConstraintError,
            Error::NotFoundError { .. } => ErrorKind::NotFoundError,
            Error::FeatureError { .. } => ErrorKind::FeatureError,
            Error::IOError(_) | Error::SerdeError(_) => ErrorKind::IOError,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Error {
        Error::NotFoundError {
            message: message.into(),
        }
    }

    pub fn semantic(message: impl Into<String>) -> Error {
        Error::SemanticError {
            message: message.into(),
        }
    }

    pub fn constraint(message: impl Into<String>) -> Error {
        Error::ConstraintError {
            message: message.into(),
        }
    }

    pub fn feature(message: impl Into<String>) -> Error {
        Error::FeatureError {
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Error {
        Error::TypeError {
            message: message.into(),
        }
    }
}

/// What a host actually sees over the wire: `{ kind, message }`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HostError {
    pub kind: &'static str,
    pub message: String,
}

impl From<&Error> for HostError {
    fn from(err: &Error) -> Self {
        HostError {
            kind: err.kind().as_str(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
