// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process broker stand-in for tests.
//!
//! [`MockBroker`] records every request and answers from a per-subject
//! script, falling back to a default reply. Clones share state, so a test
//! can keep one handle while the [`crate::Conn`] owns another.
//!
//! [`descriptors`] builds the `prost-types` descriptors that code generated
//! by `prost-build` would otherwise provide.
//!
//! Compiled for this crate's tests and behind the `testing` feature.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportError;
use crate::transport::Transport;

/// Scripted answer to one request.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Reply with these bytes.
    Payload(Vec<u8>),
    /// Fail the request with a transport error.
    Fail(TransportError),
    /// Never answer; the request runs into its timeout.
    Silent,
}

impl MockReply {
    /// `{"error": ""}`.
    pub fn ok() -> Self {
        MockReply::Payload(br#"{"error":""}"#.to_vec())
    }

    /// `{"error": message}`.
    pub fn rejected(message: &str) -> Self {
        MockReply::Payload(serde_json::json!({ "error": message }).to_string().into_bytes())
    }
}

/// A request observed by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub subject: String,
    pub payload: Vec<u8>,
}

impl RecordedRequest {
    /// Payload parsed as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

struct Inner {
    requests: Mutex<Vec<RecordedRequest>>,
    scripted: Mutex<HashMap<String, VecDeque<MockReply>>>,
    default_reply: Mutex<MockReply>,
    latency: Mutex<Option<Duration>>,
}

/// Recording, scriptable [`Transport`].
#[derive(Clone)]
pub struct MockBroker {
    inner: Arc<Inner>,
}

impl MockBroker {
    /// A broker that accepts everything.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                requests: Mutex::new(Vec::new()),
                scripted: Mutex::new(HashMap::new()),
                default_reply: Mutex::new(MockReply::ok()),
                latency: Mutex::new(None),
            }),
        }
    }

    /// Queue a reply for the next request on `subject`.
    pub fn reply_on(&self, subject: &str, reply: MockReply) -> &Self {
        self.inner
            .scripted
            .lock()
            .entry(subject.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Reply used when no scripted reply is queued.
    pub fn set_default_reply(&self, reply: MockReply) {
        *self.inner.default_reply.lock() = reply;
    }

    /// Delay every reply by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock() = Some(latency);
    }

    /// All requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().clone()
    }

    /// Requests received on one subject.
    pub fn requests_on(&self, subject: &str) -> Vec<RecordedRequest> {
        self.inner
            .requests
            .lock()
            .iter()
            .filter(|r| r.subject == subject)
            .cloned()
            .collect()
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.inner.requests.lock().len()
    }

    fn next_reply(&self, subject: &str) -> MockReply {
        let scripted = self
            .inner
            .scripted
            .lock()
            .get_mut(subject)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| self.inner.default_reply.lock().clone())
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockBroker {
    async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.inner.requests.lock().push(RecordedRequest {
            subject: subject.to_string(),
            payload,
        });
        let reply = self.next_reply(subject);
        let latency = *self.inner.latency.lock();

        if let Some(latency) = latency {
            if latency >= timeout {
                tokio::time::sleep(timeout).await;
                return Err(TransportError::Timeout);
            }
            tokio::time::sleep(latency).await;
        }

        match reply {
            MockReply::Payload(bytes) => Ok(bytes),
            MockReply::Fail(err) => Err(err),
            MockReply::Silent => {
                tokio::time::sleep(timeout).await;
                Err(TransportError::Timeout)
            }
        }
    }
}

/// Builders for hand-written protobuf file descriptors.
pub mod descriptors {
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto, MessageOptions,
    };

    /// Singular scalar field.
    pub fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(Label::Optional as i32),
            r#type: Some(ty as i32),
            ..Default::default()
        }
    }

    /// Singular message field; `type_name` as protoc writes it (`.pkg.Msg`).
    pub fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
        FieldDescriptorProto {
            type_name: Some(type_name.to_string()),
            ..field(name, number, Type::Message)
        }
    }

    /// Enum field.
    pub fn enum_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
        FieldDescriptorProto {
            type_name: Some(type_name.to_string()),
            ..field(name, number, Type::Enum)
        }
    }

    /// Turn a field into a repeated one.
    pub fn repeated(field: FieldDescriptorProto) -> FieldDescriptorProto {
        FieldDescriptorProto {
            label: Some(Label::Repeated as i32),
            ..field
        }
    }

    pub fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
        DescriptorProto {
            name: Some(name.to_string()),
            field: fields,
            ..Default::default()
        }
    }

    /// Synthetic `<Name>Entry` message backing a `map<K, V>` field.
    pub fn map_entry(name: &str, key: Type, value: FieldDescriptorProto) -> DescriptorProto {
        DescriptorProto {
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..message(
                name,
                vec![
                    field("key", 1, key),
                    FieldDescriptorProto {
                        name: Some("value".into()),
                        number: Some(2),
                        ..value
                    },
                ],
            )
        }
    }

    /// Enum with `(name, number)` values.
    pub fn enumeration(name: &str, values: &[(&str, i32)]) -> EnumDescriptorProto {
        EnumDescriptorProto {
            name: Some(name.to_string()),
            value: values
                .iter()
                .map(|(value, number)| EnumValueDescriptorProto {
                    name: Some(value.to_string()),
                    number: Some(*number),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    /// proto3 file in `package` holding `messages`.
    pub fn file(package: &str, messages: Vec<DescriptorProto>) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some(format!("{}.proto", package.replace('.', "/"))),
            package: (!package.is_empty()).then(|| package.to_string()),
            message_type: messages,
            syntax: Some("proto3".into()),
            ..Default::default()
        }
    }
}
