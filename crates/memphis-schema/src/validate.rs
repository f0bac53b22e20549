// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Name and schema type validation.
//!
//! Pure checks, run before anything is sent to the broker. The first
//! failing rule wins; errors are never accumulated.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::ValidationError;
use crate::schema::SchemaType;

/// Object kind used in schema name errors.
pub const SCHEMA_OBJECT: &str = "Schema";

/// Object kind used in station name errors.
pub const STATION_OBJECT: &str = "Station";

/// Longest accepted name, in bytes.
pub const MAX_NAME_LEN: usize = 128;

fn name_charset() -> &'static Regex {
    static CHARSET: OnceLock<Regex> = OnceLock::new();
    CHARSET.get_or_init(|| Regex::new("^[a-z0-9_.-]*$").expect("static pattern"))
}

fn is_boundary_symbol(c: char) -> bool {
    matches!(c, '.' | '-' | '_')
}

/// Validate a broker object name.
///
/// Rules, in order: non-empty, at most 128 bytes, only `[a-z0-9_.-]`,
/// and neither first nor last character is `.`, `-` or `_`.
pub fn validate_name(name: &str, object_kind: &'static str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName(object_kind));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong(object_kind));
    }

    if !name_charset().is_match(name) {
        return Err(ValidationError::InvalidCharacters(object_kind));
    }

    // Charset check above guarantees ASCII, so first/last chars exist.
    let first = name.chars().next().unwrap_or('.');
    let last = name.chars().next_back().unwrap_or('.');
    if is_boundary_symbol(first) || is_boundary_symbol(last) {
        return Err(ValidationError::InvalidBoundary(object_kind));
    }

    Ok(())
}

/// Validate a schema name.
pub fn validate_schema_name(name: &str) -> Result<(), ValidationError> {
    validate_name(name, SCHEMA_OBJECT)
}

/// Validate a station name.
pub fn validate_station_name(name: &str) -> Result<(), ValidationError> {
    validate_name(name, STATION_OBJECT)
}

/// Validate a schema type tag and return the creatable type.
///
/// `avro` is recognized but rejected with its own error.
pub fn validate_schema_type(schema_type: &str) -> Result<SchemaType, ValidationError> {
    match schema_type {
        "protobuf" => Ok(SchemaType::Protobuf),
        "json" => Ok(SchemaType::Json),
        "graphql" => Ok(SchemaType::Graphql),
        "avro" => Err(ValidationError::UnsupportedButRecognized),
        _ => Err(ValidationError::UnsupportedType),
    }
}
