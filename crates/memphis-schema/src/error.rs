// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for schema operations.
//!
//! Every layer wraps its cause into [`SchemaError`] instead of swallowing
//! it, so a caller always receives exactly one error per failed call.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Syntactic rejection of a name or schema type.
///
/// Deterministic on the same input: never worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} name can not be empty")]
    EmptyName(&'static str),

    #[error("{0} should be under 128 characters")]
    NameTooLong(&'static str),

    #[error("Only alphanumeric and the '_', '-', '.' characters are allowed in {0}")]
    InvalidCharacters(&'static str),

    #[error("{0} name can not start or end with non alphanumeric character")]
    InvalidBoundary(&'static str),

    #[error("unsupported schema type")]
    UnsupportedType,

    /// Known format that the broker does not accept yet.
    #[error("avro is not supported at this time")]
    UnsupportedButRecognized,
}

/// Failures of the request/reply round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("broker unreachable: {0}")]
    Unreachable(String),

    #[error("request cancelled")]
    Cancelled,
}

/// Uniform client error wrapping every failure of this crate.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The broker answered with a non-empty error string; surfaced verbatim.
    #[error("{0}")]
    BrokerRejected(String),

    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(String),

    #[error("schema generation failed: {0}")]
    Generation(String),

    #[error("{0} removal is not implemented")]
    NotImplemented(&'static str),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SchemaError {
    /// True for failures a caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchemaError::Transport(TransportError::Timeout | TransportError::Unreachable(_))
        )
    }
}
