// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema entity and its wire shapes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entity::Entity;
use crate::error::{Result, ValidationError};
use crate::validate::validate_schema_type;

/// Subject every schema creation is published on, regardless of type.
pub const SCHEMA_CREATIONS_SUBJECT: &str = "$memphis_schema_creations";

// ---------------------------------------------------------------------------
// SchemaType
// ---------------------------------------------------------------------------

/// Creatable schema formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Protobuf,
    Json,
    Graphql,
}

impl SchemaType {
    /// Wire tag of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Protobuf => "protobuf",
            SchemaType::Json => "json",
            SchemaType::Graphql => "graphql",
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaType {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        validate_schema_type(s)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// One named, typed schema as uploaded to the broker.
///
/// Built per create call and dropped after the round trip; the broker
/// owns storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub name: String,
    pub schema_type: SchemaType,
    pub created_by_username: String,
    /// Raw definition text, opaque to the client.
    pub content: String,
    /// Language-specific message name hint. Not sent on creation.
    pub message_struct_name: String,
}

/// Creation request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    pub created_by_username: String,
    pub schema_content: String,
    pub message_struct_name: String,
}

/// Removal request payload. No subject accepts it yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalRequest {
    pub name: String,
}

impl Schema {
    /// Build the creation payload; `message_struct_name` is always empty.
    pub fn to_creation_request(&self) -> CreationRequest {
        CreationRequest {
            name: self.name.clone(),
            schema_type: self.schema_type,
            created_by_username: self.created_by_username.clone(),
            schema_content: self.content.clone(),
            message_struct_name: String::new(),
        }
    }
}

impl From<CreationRequest> for Schema {
    fn from(req: CreationRequest) -> Self {
        Schema {
            name: req.name,
            schema_type: req.schema_type,
            created_by_username: req.created_by_username,
            content: req.schema_content,
            message_struct_name: req.message_struct_name,
        }
    }
}

impl Entity for Schema {
    fn kind(&self) -> &'static str {
        "schema"
    }

    fn creation_subject(&self) -> &str {
        SCHEMA_CREATIONS_SUBJECT
    }

    fn creation_request(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_creation_request())?)
    }

    fn destruction_subject(&self) -> Option<&str> {
        None
    }

    fn destruction_request(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&RemovalRequest {
            name: self.name.clone(),
        })?)
    }
}
