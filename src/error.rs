use std::fmt;
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid feedback: {0}")]
    Validation(String),
    #[error("could not classify feedback: {0}")]
    Classification(#[from] InferenceError),
    #[error("ticket store error: {0}")]
    Store(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("server error: {0}")]
    Server(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl AppError {
    /// Stable name of the error class, shown to HTTP clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Classification(_) => "classification",
            AppError::Store(_) => "store",
            AppError::Configuration(_) => "configuration",
            AppError::Server(_) | AppError::Io(_) => "internal",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Expected to resolve on retry: timeouts, rate limits, 5xx.
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Error)]
#[error("{kind} inference failure: {message}")]
pub struct InferenceError {
    pub kind: FailureKind,
    pub message: String,
}

impl InferenceError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => f.write_str("transient"),
            FailureKind::Permanent => f.write_str("permanent"),
        }
    }
}
