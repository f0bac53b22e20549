// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message format detection.
//!
//! A producer hands over one of a closed set of message shapes; detection
//! encodes it the way it would be published and classifies it into a
//! [`SchemaType`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};
use crate::proto::{ProtoDescriptor, ProtoMessage, ProtoPayload};
use crate::schema::SchemaType;

/// In-memory message as handed over by a producer.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Already-encoded bytes. Their format cannot be inferred, so the
    /// producer has to declare it.
    Bytes {
        payload: Vec<u8>,
        declared: Option<SchemaType>,
    },
    /// JSON document text.
    Text(String),
    /// Key-value mapping.
    Mapping(Map<String, Value>),
    /// Structurally typed protobuf message, encoded by `prost`.
    Proto(ProtoPayload),
    /// Plain record, captured through its `Serialize` impl.
    Record(Value),
}

impl Message {
    /// Raw bytes of a declared format.
    pub fn bytes(payload: impl Into<Vec<u8>>, declared: SchemaType) -> Self {
        Message::Bytes {
            payload: payload.into(),
            declared: Some(declared),
        }
    }

    /// Capture a serializable record.
    pub fn record<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Message::Record(serde_json::to_value(value)?))
    }

    /// Encode a protobuf message and keep its descriptor.
    pub fn proto<M: ProtoMessage>(message: &M) -> Self {
        Message::Proto(ProtoPayload::new(message))
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<Map<String, Value>> for Message {
    fn from(map: Map<String, Value>) -> Self {
        Message::Mapping(map)
    }
}

/// Encoded message together with its detected format.
#[derive(Debug, Clone)]
pub struct Sample {
    pub format: SchemaType,
    /// Bytes as they would be published.
    pub payload: Vec<u8>,
    /// Present for protobuf messages that carry their descriptor.
    pub descriptor: Option<ProtoDescriptor>,
}

impl Sample {
    fn json(payload: Vec<u8>) -> Self {
        Self {
            format: SchemaType::Json,
            payload,
            descriptor: None,
        }
    }
}

/// Encode `message` and classify its format.
pub fn detect_format(message: &Message) -> Result<Sample> {
    match message {
        Message::Bytes {
            payload,
            declared: Some(format),
        } => Ok(Sample {
            format: *format,
            payload: payload.clone(),
            descriptor: None,
        }),
        Message::Bytes { declared: None, .. } => Err(SchemaError::UnsupportedMessageType(
            "raw bytes need a declared schema type".into(),
        )),
        Message::Text(text) => Ok(Sample::json(text.as_bytes().to_vec())),
        Message::Mapping(map) => Ok(Sample::json(serde_json::to_vec(map)?)),
        Message::Proto(proto) => Ok(Sample {
            format: SchemaType::Protobuf,
            payload: proto.encoded.clone(),
            descriptor: Some(proto.descriptor.clone()),
        }),
        Message::Record(value @ Value::Object(_)) => Ok(Sample::json(serde_json::to_vec(value)?)),
        Message::Record(other) => Err(SchemaError::UnsupportedMessageType(format!(
            "record serializes to {}, expected an object",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
