// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broker connection facade for schema operations.

use std::io;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::entity::Entity;
use crate::error::{Result, SchemaError, TransportError};
use crate::generator::Generators;
use crate::schema::{Schema, SchemaType};
use crate::station::{StationRegistry, StationSchema};
use crate::transport::Transport;
use crate::validate::{validate_schema_name, validate_schema_type};

/// Schema client bound to one broker session.
///
/// Holds no schema registry of its own: every schema is built, uploaded
/// and dropped per call. The only state kept is per-station enforcement.
pub struct Conn<T: Transport> {
    transport: T,
    config: ClientConfig,
    pub(crate) stations: StationRegistry,
    pub(crate) generators: Generators,
}

impl<T: Transport> Conn<T> {
    /// Create a client over `transport`.
    ///
    /// Stations declared in the configuration with `auto_register` start
    /// with the auto-registration flag set.
    pub async fn new(transport: T, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let stations = StationRegistry::new();
        for station in config.stations.iter().filter(|s| s.auto_register) {
            stations.enable_auto_registration(&station.name).await;
        }
        tracing::debug!(
            username = %config.username,
            stations = config.stations.len(),
            "schema client ready"
        );
        Ok(Self {
            transport,
            config,
            stations,
            generators: Generators::default(),
        })
    }

    /// Replace the schema generators used by auto-registration.
    pub fn with_generators(mut self, generators: Generators) -> Self {
        self.generators = generators;
        self
    }

    /// Session identity recorded on uploads.
    pub fn username(&self) -> &str {
        &self.config.username
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Snapshot of a station's schema record.
    pub async fn station_state(&self, station: &str) -> Option<StationSchema> {
        self.stations.snapshot(station).await
    }

    /// Mark `station` to derive its schema from the next message.
    /// Returns false once a schema is enforced there.
    pub async fn enable_auto_registration(&self, station: &str) -> bool {
        self.stations.enable_auto_registration(station).await
    }

    /// One request/reply round trip bounded by the configured timeout and
    /// optionally by `cancel`. Work already sent is not rolled back.
    pub(crate) async fn round_trip(
        &self,
        subject: &str,
        payload: Vec<u8>,
        cancel: Option<&CancellationToken>,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        let timeout = self.config.timeout();
        let call = tokio::time::timeout(timeout, self.transport.request(subject, payload, timeout));
        let outcome = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(TransportError::Cancelled),
                res = call => res,
            },
            None => call.await,
        };
        outcome.unwrap_or(Err(TransportError::Timeout))
    }

    /// Create `entity` on the broker.
    pub async fn create<E: Entity>(&self, entity: &E) -> Result<()> {
        self.create_with_cancel(entity, None).await
    }

    /// Create `entity`, aborting the reply wait when `cancel` fires.
    pub async fn create_with_cancel<E: Entity>(
        &self,
        entity: &E,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let subject = entity.creation_subject();
        let body = entity.creation_request()?;
        tracing::debug!(kind = entity.kind(), subject, "sending creation request");

        let reply = self.round_trip(subject, body, cancel).await.map_err(|e| {
            tracing::warn!(kind = entity.kind(), subject, error = %e, "creation request failed");
            e
        })?;
        entity.handle_creation_response(&reply)
    }

    /// Destroy `entity` on the broker. Fails with `NotImplemented`, without
    /// sending anything, when the entity has no destruction subject.
    pub async fn destroy<E: Entity>(&self, entity: &E) -> Result<()> {
        let Some(subject) = entity.destruction_subject() else {
            return Err(SchemaError::NotImplemented(entity.kind()));
        };
        let body = entity.destruction_request()?;
        let reply = self.round_trip(subject, body, None).await?;
        crate::entity::handle_error_reply(&reply)
    }

    /// Validate and upload a new schema read from `path`.
    pub async fn create_schema(
        &self,
        name: &str,
        schema_type: &str,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        self.create_schema_with_cancel(name, schema_type, path, None)
            .await
    }

    /// [`Conn::create_schema`] with a cancellation token for the reply wait.
    pub async fn create_schema_with_cancel(
        &self,
        name: &str,
        schema_type: &str,
        path: impl AsRef<Path>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let content = read_schema_file(path.as_ref()).await?;
        self.create_schema_from_content_with_cancel(name, schema_type, content, cancel)
            .await
    }

    /// Validate and upload a schema whose definition is already in memory.
    pub async fn create_schema_from_content(
        &self,
        name: &str,
        schema_type: &str,
        content: impl Into<String>,
    ) -> Result<()> {
        self.create_schema_from_content_with_cancel(name, schema_type, content.into(), None)
            .await
    }

    async fn create_schema_from_content_with_cancel(
        &self,
        name: &str,
        schema_type: &str,
        content: String,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        validate_schema_name(name)?;
        let schema_type = validate_schema_type(schema_type)?;
        self.upload_schema(name, schema_type, content, String::new(), cancel)
            .await
    }

    pub(crate) async fn upload_schema(
        &self,
        name: &str,
        schema_type: SchemaType,
        content: String,
        message_struct_name: String,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let schema = Schema {
            name: name.to_string(),
            schema_type,
            created_by_username: self.config.username.clone(),
            content,
            message_struct_name,
        };
        self.create_with_cancel(&schema, cancel).await?;
        tracing::info!(schema = name, schema_type = %schema_type, "schema created");
        Ok(())
    }

    /// Remove a schema. Not wired on the broker yet, so this always fails
    /// with `NotImplemented` after validating the name.
    pub async fn remove_schema(&self, name: &str) -> Result<()> {
        validate_schema_name(name)?;
        let schema = Schema {
            name: name.to_string(),
            schema_type: SchemaType::Json,
            created_by_username: self.config.username.clone(),
            content: String::new(),
            message_struct_name: String::new(),
        };
        self.destroy(&schema).await
    }
}

/// Read a schema file as raw bytes. Invalid UTF-8 sequences are replaced
/// with U+FFFD, the same substitution the broker's JSON decoder applies.
async fn read_schema_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if bytes.is_empty() {
        return Err(SchemaError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, "schema file is empty"),
        });
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
