//! Common types and utilities for the ease-gateway generator
//!
//! This crate contains the error type shared by the descriptor resolver,
//! the generator driver and the plugin binary, plus the option extension
//! messages (`HttpRule`, `ValidationRule`, ...) that annotate the input
//! `.proto` files.

pub mod options;

use thiserror::Error;

/// Errors that can occur while resolving bindings or generating gateway files
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// The file declares no service with an HTTP binding. Callers skip
    /// the file instead of failing the batch.
    #[error("no target service defined in the file")]
    NoTargetService,

    #[error("no message found: {0}")]
    MessageNotFound(String),

    #[error("no enum found: {0}")]
    EnumNotFound(String),

    #[error("no field {field:?} found in {message}")]
    FieldNotFound { field: String, message: String },

    #[error("invalid field path {path:?}: {reason}")]
    InvalidFieldPath { path: String, reason: String },

    #[error("invalid binding for {method}: {reason}")]
    InvalidBinding { method: String, reason: String },

    #[error("unsupported field type {wire_type} of parameter {parameter} in {service}.{method}")]
    UnsupportedConversion {
        wire_type: String,
        parameter: String,
        service: String,
        method: String,
    },

    #[error("package name {alias} is already taken. Use another alias")]
    AliasTaken { alias: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Emission error for {file}: {reason}")]
    Emission { file: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Generation error: {0}")]
    Generation(String),
}

impl GeneratorError {
    /// Whether this error only skips the current file
    pub fn is_skip(&self) -> bool {
        matches!(self, GeneratorError::NoTargetService)
    }
}

/// Result type for generator operations
pub type Result<T> = std::result::Result<T, GeneratorError>;
