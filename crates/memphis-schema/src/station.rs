// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-station schema state.
//!
//! The auto-registration flag and the enforced schema name are the only
//! shared mutable state in this crate. Each station owns one record behind
//! its own async mutex, so every transition on a station is serialized
//! while different stations never contend.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::entity::Entity;
use crate::error::Result;

/// Subject schema attachments (enforcement) are published on.
pub const SCHEMA_ATTACHMENTS_SUBJECT: &str = "$memphis_schema_attachments";

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

/// Request to enforce schema `name` on `station_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub name: String,
    pub station_name: String,
    pub username: String,
}

impl Entity for Attachment {
    fn kind(&self) -> &'static str {
        "schema attachment"
    }

    fn creation_subject(&self) -> &str {
        SCHEMA_ATTACHMENTS_SUBJECT
    }

    fn creation_request(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn destruction_subject(&self) -> Option<&str> {
        None
    }

    fn destruction_request(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&serde_json::json!({
            "station_name": self.station_name,
            "username": self.username,
        }))?)
    }
}

// ---------------------------------------------------------------------------
// StationSchema
// ---------------------------------------------------------------------------

/// Where a station stands with respect to schema enforcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcementState {
    Unenforced,
    /// A schema is being derived from a message and uploaded.
    AutoRegistering,
    /// The named schema is enforced.
    Enforced(String),
}

/// Schema record of one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationSchema {
    /// Derive the schema from the next observed message.
    pub auto_reg_required: bool,
    pub state: EnforcementState,
}

impl StationSchema {
    fn new(auto_reg_required: bool) -> Self {
        Self {
            auto_reg_required,
            state: EnforcementState::Unenforced,
        }
    }

    /// Unenforced with the flag set -> AutoRegistering. Returns whether the
    /// caller now owns the auto-registration attempt.
    pub(crate) fn begin_auto_registration(&mut self) -> bool {
        if self.auto_reg_required && self.state == EnforcementState::Unenforced {
            self.state = EnforcementState::AutoRegistering;
            true
        } else {
            false
        }
    }

    /// Drop a failed attempt without retaining partial state.
    pub(crate) fn abort_auto_registration(&mut self) {
        if self.state == EnforcementState::AutoRegistering {
            self.state = EnforcementState::Unenforced;
        }
    }

    /// Successful enforcement: the only transition that clears the flag.
    pub(crate) fn record_enforcement(&mut self, schema_name: &str) {
        self.state = EnforcementState::Enforced(schema_name.to_string());
        self.auto_reg_required = false;
    }

    /// Name of the enforced schema, if any.
    pub fn enforced_schema(&self) -> Option<&str> {
        match &self.state {
            EnforcementState::Enforced(name) => Some(name),
            _ => None,
        }
    }
}

/// Ownership of a station's in-flight auto-registration.
///
/// Dropping a claim that was not disarmed puts the station back to
/// `Unenforced`, whether the attempt failed or its future was abandoned
/// mid-request.
pub(crate) struct AutoRegClaim {
    record: Arc<Mutex<StationSchema>>,
    armed: bool,
}

impl AutoRegClaim {
    /// Claim `record` if it is waiting for auto-registration.
    pub(crate) async fn acquire(record: &Arc<Mutex<StationSchema>>) -> Option<Self> {
        if !record.lock().await.begin_auto_registration() {
            return None;
        }
        Some(Self {
            record: Arc::clone(record),
            armed: true,
        })
    }

    /// The attempt reached a terminal outcome; leave the record alone.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AutoRegClaim {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.record.try_lock() {
            Ok(mut record) => record.abort_auto_registration(),
            Err(_) => {
                // Lock still held by the abandoned attachment step.
                let record = Arc::clone(&self.record);
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        record.lock().await.abort_auto_registration();
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// StationRegistry
// ---------------------------------------------------------------------------

/// Station records keyed by station name.
#[derive(Default)]
pub struct StationRegistry {
    stations: DashMap<String, Arc<Mutex<StationSchema>>>,
}

impl StationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lockable record for `station`, created unenforced on first use.
    pub(crate) fn record(&self, station: &str) -> Arc<Mutex<StationSchema>> {
        self.stations
            .entry(station.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(StationSchema::new(false))))
            .value()
            .clone()
    }

    /// Mark `station` for auto-registration. Returns false once a schema
    /// is enforced there.
    pub async fn enable_auto_registration(&self, station: &str) -> bool {
        let record = self.record(station);
        let mut guard = record.lock().await;
        if matches!(guard.state, EnforcementState::Enforced(_)) {
            return false;
        }
        guard.auto_reg_required = true;
        true
    }

    /// Snapshot of a station's record, `None` for unknown stations.
    pub async fn snapshot(&self, station: &str) -> Option<StationSchema> {
        let record = self.stations.get(station).map(|r| r.value().clone())?;
        let guard = record.lock().await;
        Some(guard.clone())
    }

    /// Known station names, sorted.
    pub fn stations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stations.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }
}
