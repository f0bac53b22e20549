// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request/reply transport seam.
//!
//! The connection itself (session setup, framing, auth) lives in the
//! messaging client; this crate only needs one correlated round trip.

use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

/// A request/reply primitive: publish `payload` on `subject` and await the
/// single correlated reply.
pub trait Transport: Send + Sync + 'static {
    /// Send a request and wait up to `timeout` for the reply.
    fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}
