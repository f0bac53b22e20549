// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema enforcement and auto-registration.
//!
//! Auto-registration derives a schema from a live message, uploads it and
//! enforces it on the station:
//!
//! ```text
//! Message -> detect_format -> generate -> create schema -> attach to station
//! ```
//!
//! Every successful attachment, manual or automatic, happens while holding
//! the station's lock and clears the station's auto-registration flag in
//! the same critical section. An auto-registration that finds the flag
//! already cleared when it reaches the attachment step stands down.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::conn::Conn;
use crate::error::Result;
use crate::format::{detect_format, Message};
use crate::generator::type_name_for;
use crate::station::{Attachment, AutoRegClaim, EnforcementState, StationSchema};
use crate::transport::Transport;
use crate::validate::{validate_schema_name, validate_station_name};

/// Result of an auto-registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoRegOutcome {
    /// The derived schema was created and enforced under this name.
    Registered(String),
    /// The station is not waiting for auto-registration (flag unset, a
    /// schema already enforced, or another attempt in flight).
    NotRequired,
    /// A manual enforcement landed while this attempt was in flight; the
    /// derived schema was uploaded but not attached.
    Superseded,
}

impl<T: Transport> Conn<T> {
    /// Name given to the schema auto-registered for `station`:
    /// `<station>-<auto_schema_suffix>`.
    pub fn auto_schema_name(&self, station: &str) -> String {
        format!("{}-{}", station, self.config().auto_schema_suffix)
    }

    /// Enforce schema `schema_name` on `station`.
    ///
    /// On success the station is `Enforced(schema_name)` and its
    /// auto-registration flag is cleared. Enforcing another schema on an
    /// enforced station replaces it directly.
    pub async fn enforce_schema(&self, schema_name: &str, station: &str) -> Result<()> {
        self.enforce_schema_with_cancel(schema_name, station, None)
            .await
    }

    /// [`Conn::enforce_schema`] with a cancellation token for the reply
    /// wait. A cancelled enforcement leaves the station as it was.
    pub async fn enforce_schema_with_cancel(
        &self,
        schema_name: &str,
        station: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        validate_schema_name(schema_name)?;
        validate_station_name(station)?;

        let record = self.stations.record(station);
        let mut guard = record.lock().await;
        self.attach(schema_name, station, &mut guard, cancel).await?;
        tracing::info!(schema = schema_name, station, "schema enforced");
        Ok(())
    }

    /// Derive a schema from `message`, create it and enforce it on
    /// `station`, if the station is waiting for one.
    ///
    /// On failure the station goes back to `Unenforced` with its flag
    /// still set, so the next message can try again. The same holds when
    /// the returned future is dropped before it completes.
    pub async fn auto_register_schema(
        &self,
        message: &Message,
        station: &str,
    ) -> Result<AutoRegOutcome> {
        self.auto_register_schema_with_cancel(message, station, None)
            .await
    }

    /// [`Conn::auto_register_schema`] with a cancellation token covering
    /// both the schema upload and the attachment.
    pub async fn auto_register_schema_with_cancel(
        &self,
        message: &Message,
        station: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<AutoRegOutcome> {
        validate_station_name(station)?;

        let record = self.stations.record(station);
        let Some(claim) = AutoRegClaim::acquire(&record).await else {
            return Ok(AutoRegOutcome::NotRequired);
        };

        match self.derive_and_attach(message, station, &record, cancel).await {
            Ok(outcome) => {
                claim.disarm();
                Ok(outcome)
            }
            Err(e) => {
                drop(claim);
                tracing::warn!(station, error = %e, "schema auto-registration failed");
                Err(e)
            }
        }
    }

    async fn derive_and_attach(
        &self,
        message: &Message,
        station: &str,
        record: &Arc<Mutex<StationSchema>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<AutoRegOutcome> {
        let sample = detect_format(message)?;
        let struct_name = sample
            .descriptor
            .as_ref()
            .map(|d| d.message_name.clone())
            .unwrap_or_else(|| type_name_for(station));
        let content = self
            .generators
            .generate(&sample, sample.format, &struct_name)?;

        let schema_name = self.auto_schema_name(station);
        validate_schema_name(&schema_name)?;
        self.upload_schema(&schema_name, sample.format, content, struct_name, cancel)
            .await?;

        let mut guard = record.lock().await;
        if !guard.auto_reg_required || guard.state != EnforcementState::AutoRegistering {
            tracing::info!(
                station,
                schema = %schema_name,
                "schema enforced manually meanwhile; skipping auto enforcement"
            );
            return Ok(AutoRegOutcome::Superseded);
        }
        self.attach(&schema_name, station, &mut guard, cancel).await?;
        tracing::info!(station, schema = %schema_name, format = %sample.format, "schema auto-registered");
        Ok(AutoRegOutcome::Registered(schema_name))
    }

    /// Send the attachment and record it. The caller holds the station lock.
    async fn attach(
        &self,
        schema_name: &str,
        station: &str,
        record: &mut StationSchema,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let attachment = Attachment {
            name: schema_name.to_string(),
            station_name: station.to_string(),
            username: self.username().to_string(),
        };
        self.create_with_cancel(&attachment, cancel).await?;
        record.record_enforcement(schema_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::SchemaError;
    use crate::schema::SCHEMA_CREATIONS_SUBJECT;
    use crate::station::SCHEMA_ATTACHMENTS_SUBJECT;
    use crate::testing::{MockBroker, MockReply};
    use serde_json::json;
    use std::time::Duration;

    async fn conn(broker: &MockBroker, auto_station: Option<&str>) -> Conn<MockBroker> {
        let mut config = ClientConfig::new("svc").request_timeout(Duration::from_secs(1));
        if let Some(station) = auto_station {
            config = config.station(station, true);
        }
        Conn::new(broker.clone(), config).await.unwrap()
    }

    fn order() -> Message {
        Message::from(json!({"id": 1, "item": "book"}).as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn auto_registration_creates_then_enforces() {
        let broker = MockBroker::new();
        let conn = conn(&broker, Some("orders")).await;

        let outcome = conn.auto_register_schema(&order(), "orders").await.unwrap();
        assert_eq!(outcome, AutoRegOutcome::Registered("orders-auto".into()));

        let sent = broker.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, SCHEMA_CREATIONS_SUBJECT);
        assert_eq!(sent[0].json()["name"], "orders-auto");
        assert_eq!(sent[0].json()["type"], "json");
        let content: serde_json::Value =
            serde_json::from_str(sent[0].json()["schema_content"].as_str().unwrap()).unwrap();
        assert_eq!(content["title"], "Orders");
        assert_eq!(sent[1].subject, SCHEMA_ATTACHMENTS_SUBJECT);
        assert_eq!(
            sent[1].json(),
            json!({"name": "orders-auto", "station_name": "orders", "username": "svc"})
        );

        let state = conn.station_state("orders").await.unwrap();
        assert_eq!(state.state, EnforcementState::Enforced("orders-auto".into()));
        assert!(!state.auto_reg_required);

        // Terminal: a second message does nothing.
        let again = conn.auto_register_schema(&order(), "orders").await.unwrap();
        assert_eq!(again, AutoRegOutcome::NotRequired);
        assert_eq!(broker.request_count(), 2);
    }

    #[tokio::test]
    async fn not_required_without_flag() {
        let broker = MockBroker::new();
        let conn = conn(&broker, None).await;
        let outcome = conn.auto_register_schema(&order(), "orders").await.unwrap();
        assert_eq!(outcome, AutoRegOutcome::NotRequired);
        assert_eq!(broker.request_count(), 0);
    }

    #[tokio::test]
    async fn detection_failure_leaves_station_unenforced() {
        let broker = MockBroker::new();
        let conn = conn(&broker, Some("orders")).await;
        let raw = Message::Bytes {
            payload: vec![1, 2, 3],
            declared: None,
        };

        let err = conn.auto_register_schema(&raw, "orders").await.unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedMessageType(_)));
        assert_eq!(broker.request_count(), 0);

        let state = conn.station_state("orders").await.unwrap();
        assert_eq!(state.state, EnforcementState::Unenforced);
        assert!(state.auto_reg_required);
    }

    #[tokio::test]
    async fn rejected_creation_skips_enforcement() {
        let broker = MockBroker::new();
        broker.reply_on(SCHEMA_CREATIONS_SUBJECT, MockReply::rejected("name exists"));
        let conn = conn(&broker, Some("orders")).await;

        let err = conn.auto_register_schema(&order(), "orders").await.unwrap_err();
        assert!(matches!(err, SchemaError::BrokerRejected(ref m) if m == "name exists"));
        assert!(broker.requests_on(SCHEMA_ATTACHMENTS_SUBJECT).is_empty());

        // Retry with the next message succeeds.
        let outcome = conn.auto_register_schema(&order(), "orders").await.unwrap();
        assert_eq!(outcome, AutoRegOutcome::Registered("orders-auto".into()));
    }

    #[tokio::test]
    async fn failed_attachment_restores_unenforced() {
        let broker = MockBroker::new();
        broker.reply_on(SCHEMA_ATTACHMENTS_SUBJECT, MockReply::rejected("station not found"));
        let conn = conn(&broker, Some("orders")).await;

        let err = conn.auto_register_schema(&order(), "orders").await.unwrap_err();
        assert!(matches!(err, SchemaError::BrokerRejected(_)));
        let state = conn.station_state("orders").await.unwrap();
        assert_eq!(state.state, EnforcementState::Unenforced);
        assert!(state.auto_reg_required);
    }

    #[tokio::test]
    async fn manual_enforcement_clears_flag_and_changes_directly() {
        let broker = MockBroker::new();
        let conn = conn(&broker, Some("orders")).await;

        conn.enforce_schema("orders-v1", "orders").await.unwrap();
        let state = conn.station_state("orders").await.unwrap();
        assert_eq!(state.enforced_schema(), Some("orders-v1"));
        assert!(!state.auto_reg_required);

        conn.enforce_schema("orders-v2", "orders").await.unwrap();
        let state = conn.station_state("orders").await.unwrap();
        assert_eq!(state.state, EnforcementState::Enforced("orders-v2".into()));

        assert!(!conn.enable_auto_registration("orders").await);
        let outcome = conn.auto_register_schema(&order(), "orders").await.unwrap();
        assert_eq!(outcome, AutoRegOutcome::NotRequired);
    }

    #[tokio::test]
    async fn failed_manual_enforcement_keeps_state() {
        let broker = MockBroker::new();
        broker.reply_on(SCHEMA_ATTACHMENTS_SUBJECT, MockReply::rejected("schema not found"));
        let conn = conn(&broker, Some("orders")).await;

        assert!(conn.enforce_schema("ghost", "orders").await.is_err());
        let state = conn.station_state("orders").await.unwrap();
        assert_eq!(state.state, EnforcementState::Unenforced);
        assert!(state.auto_reg_required);
    }

    #[tokio::test]
    async fn enforcement_validates_names() {
        let broker = MockBroker::new();
        let conn = conn(&broker, None).await;
        assert!(matches!(
            conn.enforce_schema("Bad", "orders").await,
            Err(SchemaError::Validation(_))
        ));
        assert!(matches!(
            conn.enforce_schema("good", "-orders").await,
            Err(SchemaError::Validation(_))
        ));
        assert_eq!(broker.request_count(), 0);
    }

    #[tokio::test]
    async fn auto_name_too_long_is_reported() {
        let broker = MockBroker::new();
        let station = "s".repeat(126);
        let conn = conn(&broker, Some(station.as_str())).await;
        let err = conn.auto_register_schema(&order(), &station).await.unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Validation(crate::ValidationError::NameTooLong(_))
        ));
        assert_eq!(broker.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_enforcement_during_upload_supersedes_auto() {
        let broker = MockBroker::new();
        broker.set_latency(Duration::from_millis(50));
        let conn = Arc::new(conn(&broker, Some("orders")).await);

        let auto = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.auto_register_schema(&order(), "orders").await })
        };
        // Let the auto attempt claim the station and start uploading.
        tokio::time::sleep(Duration::from_millis(10)).await;
        conn.enforce_schema("orders-manual", "orders").await.unwrap();

        let outcome = auto.await.unwrap().unwrap();
        assert_eq!(outcome, AutoRegOutcome::Superseded);

        let state = conn.station_state("orders").await.unwrap();
        assert_eq!(state.state, EnforcementState::Enforced("orders-manual".into()));
        assert!(!state.auto_reg_required);
        let attachments = broker.requests_on(SCHEMA_ATTACHMENTS_SUBJECT);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].json()["name"], "orders-manual");
    }

    #[tokio::test(start_paused = true)]
    async fn manual_enforcement_during_auto_attach_wins_last() {
        let broker = MockBroker::new();
        broker.set_latency(Duration::from_millis(50));
        let conn = Arc::new(conn(&broker, Some("orders")).await);

        let auto = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.auto_register_schema(&order(), "orders").await })
        };
        // Upload ends at 50ms; auto attachment holds the lock until 100ms.
        tokio::time::sleep(Duration::from_millis(70)).await;
        conn.enforce_schema("orders-manual", "orders").await.unwrap();

        let outcome = auto.await.unwrap().unwrap();
        assert_eq!(outcome, AutoRegOutcome::Registered("orders-auto".into()));

        let state = conn.station_state("orders").await.unwrap();
        assert_eq!(state.state, EnforcementState::Enforced("orders-manual".into()));
        assert!(!state.auto_reg_required);
        let names: Vec<_> = broker
            .requests_on(SCHEMA_ATTACHMENTS_SUBJECT)
            .iter()
            .map(|r| r.json()["name"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(names, vec!["orders-auto", "orders-manual"]);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_attempt_releases_station() {
        let broker = MockBroker::new();
        broker.set_latency(Duration::from_millis(100));
        let conn = conn(&broker, Some("orders")).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            conn.auto_register_schema(&order(), "orders"),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(broker.requests_on(SCHEMA_CREATIONS_SUBJECT).len(), 1);

        let state = conn.station_state("orders").await.unwrap();
        assert_eq!(state.state, EnforcementState::Unenforced);
        assert!(state.auto_reg_required);

        let outcome = conn.auto_register_schema(&order(), "orders").await.unwrap();
        assert_eq!(outcome, AutoRegOutcome::Registered("orders-auto".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_upload_releases_station() {
        let broker = MockBroker::new();
        broker.set_latency(Duration::from_millis(100));
        let conn = conn(&broker, Some("orders")).await;

        let token = CancellationToken::new();
        let canceller = token.clone();
        let observer = broker.clone();
        tokio::spawn(async move {
            while observer.request_count() == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            canceller.cancel();
        });

        let err = conn
            .auto_register_schema_with_cancel(&order(), "orders", Some(&token))
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::Transport(crate::TransportError::Cancelled)));
        assert!(broker.requests_on(SCHEMA_ATTACHMENTS_SUBJECT).is_empty());

        let state = conn.station_state("orders").await.unwrap();
        assert_eq!(state.state, EnforcementState::Unenforced);
        assert!(state.auto_reg_required);

        let outcome = conn.auto_register_schema(&order(), "orders").await.unwrap();
        assert_eq!(outcome, AutoRegOutcome::Registered("orders-auto".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_enforcement_keeps_state() {
        let broker = MockBroker::new();
        broker.set_latency(Duration::from_millis(100));
        let conn = conn(&broker, Some("orders")).await;

        let token = CancellationToken::new();
        token.cancel();
        let err = conn
            .enforce_schema_with_cancel("orders-v1", "orders", Some(&token))
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::Transport(crate::TransportError::Cancelled)));

        let state = conn.station_state("orders").await.unwrap();
        assert_eq!(state.state, EnforcementState::Unenforced);
        assert!(state.auto_reg_required);
    }

    #[tokio::test]
    async fn stations_are_independent() {
        let broker = MockBroker::new();
        let config = ClientConfig::new("svc").station("a", true).station("b", true);
        let conn = Conn::new(broker.clone(), config).await.unwrap();

        let (order_a, order_b) = (order(), order());
        let (a, b) = tokio::join!(
            conn.auto_register_schema(&order_a, "a"),
            conn.auto_register_schema(&order_b, "b")
        );
        assert_eq!(a.unwrap(), AutoRegOutcome::Registered("a-auto".into()));
        assert_eq!(b.unwrap(), AutoRegOutcome::Registered("b-auto".into()));
    }
}
