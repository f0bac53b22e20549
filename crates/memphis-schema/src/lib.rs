// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema lifecycle for Memphis stations.
//!
//! Lets a producer declare the shape of the messages flowing through a
//! station and have the broker enforce it.
//!
//! # Features
//!
//! - **Validation**: schema/station names and schema types are checked
//!   before anything leaves the client
//! - **Creation**: schemas are uploaded through one request/reply round
//!   trip on `$memphis_schema_creations`
//! - **Auto-registration**: a schema is derived from the first message of a
//!   station (JSON Schema, GraphQL SDL or proto3), created and enforced
//! - **Enforcement**: attaching a schema to a station, with a per-station
//!   flag that keeps manual and automatic enforcement from overwriting
//!   each other
//!
//! # Architecture
//!
//! ```text
//! create_schema:      validate -> Schema -> Conn::create -> Transport -> broker
//! auto_register:      Message -> detect_format -> SchemaGenerator
//!                       -> create schema -> enforce (station lock)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use memphis_schema::{ClientConfig, Conn, Message, Transport};
//!
//! # async fn example(broker: impl Transport) -> memphis_schema::Result<()> {
//! let config = ClientConfig::new("svc-orders").station("orders", true);
//! let conn = Conn::new(broker, config).await?;
//!
//! conn.create_schema("orders-v1", "json", "./order.schema.json").await?;
//! conn.auto_register_schema(&Message::from(r#"{"id": 1}"#), "orders").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod conn;
pub mod enforcement;
pub mod entity;
pub mod error;
pub mod format;
pub mod generator;
pub mod proto;
pub mod schema;
pub mod station;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;
pub mod validate;

pub use config::{ClientConfig, ConfigError, StationConfig};
pub use conn::Conn;
pub use enforcement::AutoRegOutcome;
pub use entity::{default_handle_creation_response, CreationResponse, Entity};
pub use error::{Result, SchemaError, TransportError, ValidationError};
pub use format::{detect_format, Message, Sample};
pub use generator::{
    generate_schema, generate_schema_for_tag, Generators, GraphqlGenerator, JsonSchemaGenerator,
    ProtobufGenerator, SchemaGenerator,
};
pub use proto::{ProtoDescriptor, ProtoMessage, ProtoPayload};
pub use schema::{CreationRequest, RemovalRequest, Schema, SchemaType, SCHEMA_CREATIONS_SUBJECT};
pub use station::{Attachment, EnforcementState, StationSchema, SCHEMA_ATTACHMENTS_SUBJECT};
pub use transport::Transport;
pub use validate::{validate_name, validate_schema_name, validate_schema_type};
