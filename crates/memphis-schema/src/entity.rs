// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broker entity capability.
//!
//! Anything the client can create on the broker knows its own subject,
//! request body and how to read the broker's reply. [`crate::Conn::create`]
//! is the one generic routine that drives any of them.

use serde::Deserialize;

use crate::error::{Result, SchemaError};

/// Reply shape shared by creation-style requests; empty `error` is success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreationResponse {
    #[serde(default)]
    pub error: String,
}

/// A broker object that can be created (and possibly destroyed) through
/// a request/reply round trip.
pub trait Entity {
    /// Human readable kind, used in logs.
    fn kind(&self) -> &'static str;

    /// Subject the creation request is published on.
    fn creation_subject(&self) -> &str;

    /// Serialized creation request.
    fn creation_request(&self) -> Result<Vec<u8>>;

    /// Interpret the broker's reply to the creation request.
    fn handle_creation_response(&self, reply: &[u8]) -> Result<()> {
        handle_error_reply(reply)
    }

    /// Subject for destruction, `None` when removal is not wired.
    fn destruction_subject(&self) -> Option<&str>;

    /// Serialized destruction request.
    fn destruction_request(&self) -> Result<Vec<u8>>;
}

/// Parse an `{error}` reply, falling back to
/// [`default_handle_creation_response`] for anything else.
pub fn handle_error_reply(reply: &[u8]) -> Result<()> {
    match serde_json::from_slice::<CreationResponse>(reply) {
        Ok(resp) if resp.error.is_empty() => Ok(()),
        Ok(resp) => Err(SchemaError::BrokerRejected(resp.error)),
        Err(_) => default_handle_creation_response(reply),
    }
}

/// Fallback for replies that are not an `{error}` object: an empty reply
/// is success, any other text is the broker's error message.
pub fn default_handle_creation_response(reply: &[u8]) -> Result<()> {
    if reply.is_empty() {
        return Ok(());
    }
    Err(SchemaError::BrokerRejected(
        String::from_utf8_lossy(reply).into_owned(),
    ))
}
