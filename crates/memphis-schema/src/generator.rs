// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema inference from a sample message.
//!
//! One [`SchemaGenerator`] per format. The built-ins are minimal structural
//! inferencers; [`Generators`] lets a caller swap any of them without
//! touching auto-registration.

use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt::Write as _;

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto};

use crate::error::{Result, SchemaError};
use crate::format::Sample;
use crate::proto::ProtoDescriptor;
use crate::schema::SchemaType;
use crate::validate::validate_schema_type;

/// JSON Schema dialect emitted by [`JsonSchemaGenerator`].
pub const JSON_SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

/// Produces schema text of one format from a sample.
pub trait SchemaGenerator: Send + Sync {
    /// Generate a schema whose root type is called `type_name`.
    fn generate(&self, sample: &Sample, type_name: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// One generator per creatable format.
pub struct Generators {
    protobuf: Box<dyn SchemaGenerator>,
    json: Box<dyn SchemaGenerator>,
    graphql: Box<dyn SchemaGenerator>,
}

impl Generators {
    /// Replace the generator for `format`.
    pub fn with(mut self, format: SchemaType, generator: impl SchemaGenerator + 'static) -> Self {
        let slot = match format {
            SchemaType::Protobuf => &mut self.protobuf,
            SchemaType::Json => &mut self.json,
            SchemaType::Graphql => &mut self.graphql,
        };
        *slot = Box::new(generator);
        self
    }

    /// Generate `format` schema text from `sample`.
    pub fn generate(&self, sample: &Sample, format: SchemaType, type_name: &str) -> Result<String> {
        let generator = match format {
            SchemaType::Protobuf => &self.protobuf,
            SchemaType::Json => &self.json,
            SchemaType::Graphql => &self.graphql,
        };
        generator.generate(sample, type_name)
    }
}

impl Default for Generators {
    fn default() -> Self {
        Self {
            protobuf: Box::new(ProtobufGenerator),
            json: Box::new(JsonSchemaGenerator),
            graphql: Box::new(GraphqlGenerator),
        }
    }
}

/// Generate schema text with the built-in generators.
pub fn generate_schema(sample: &Sample, format: SchemaType, type_name: &str) -> Result<String> {
    Generators::default().generate(sample, format, type_name)
}

/// Like [`generate_schema`] for a raw type tag; unknown tags produce no
/// schema text and fail validation.
pub fn generate_schema_for_tag(sample: &Sample, tag: &str, type_name: &str) -> Result<String> {
    let format = validate_schema_type(tag)?;
    generate_schema(sample, format, type_name)
}

/// PascalCase type name derived from a station name
/// (`orders.eu-west` -> `OrdersEuWest`).
pub fn type_name_for(station: &str) -> String {
    let mut out = String::with_capacity(station.len());
    for part in station.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "Station");
    }
    out
}

fn parse_json_sample(sample: &Sample) -> Result<Value> {
    serde_json::from_slice(&sample.payload)
        .map_err(|e| SchemaError::Generation(format!("sample is not valid JSON: {}", e)))
}

// ---------------------------------------------------------------------------
// JSON Schema
// ---------------------------------------------------------------------------

/// Infers a JSON Schema document from a JSON sample.
pub struct JsonSchemaGenerator;

impl JsonSchemaGenerator {
    fn describe(value: &Value) -> Value {
        match value {
            Value::Null => json!({ "type": "null" }),
            Value::Bool(_) => json!({ "type": "boolean" }),
            Value::Number(n) if n.is_f64() => json!({ "type": "number" }),
            Value::Number(_) => json!({ "type": "integer" }),
            Value::String(_) => json!({ "type": "string" }),
            Value::Array(items) => {
                let mut variants: Vec<Value> = Vec::new();
                for item in items {
                    let schema = Self::describe(item);
                    if !variants.contains(&schema) {
                        variants.push(schema);
                    }
                }
                match variants.len() {
                    0 => json!({ "type": "array" }),
                    1 => json!({ "type": "array", "items": variants.remove(0) }),
                    _ => json!({ "type": "array", "items": { "anyOf": variants } }),
                }
            }
            Value::Object(map) => {
                let properties: Map<String, Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::describe(v)))
                    .collect();
                let required: Vec<&String> = map.keys().collect();
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            }
        }
    }
}

impl SchemaGenerator for JsonSchemaGenerator {
    fn generate(&self, sample: &Sample, type_name: &str) -> Result<String> {
        let value = parse_json_sample(sample)?;
        let mut schema = Self::describe(&value);
        if let Value::Object(root) = &mut schema {
            root.insert("$schema".into(), Value::String(JSON_SCHEMA_DIALECT.into()));
            root.insert("title".into(), Value::String(type_name.into()));
        }
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

// ---------------------------------------------------------------------------
// GraphQL SDL
// ---------------------------------------------------------------------------

/// Infers GraphQL object types from a JSON-shaped sample.
pub struct GraphqlGenerator;

struct SdlBuilder {
    types: Vec<(String, Vec<(String, String)>)>,
    taken: HashSet<String>,
}

impl SdlBuilder {
    fn reserve(&mut self, wanted: String) -> String {
        let mut name = wanted.clone();
        let mut n = 2;
        while !self.taken.insert(name.clone()) {
            name = format!("{}{}", wanted, n);
            n += 1;
        }
        name
    }

    fn object_type(&mut self, wanted: String, map: &Map<String, Value>) -> Result<String> {
        if map.is_empty() {
            return Err(SchemaError::Generation(format!(
                "type {} has no fields; GraphQL types need at least one",
                wanted
            )));
        }
        let name = self.reserve(wanted);
        let slot = self.types.len();
        self.types.push((name.clone(), Vec::new()));

        let mut fields = Vec::with_capacity(map.len());
        for (key, value) in map {
            if !is_graphql_name(key) {
                return Err(SchemaError::Generation(format!(
                    "'{}' is not a valid GraphQL field name",
                    key
                )));
            }
            let ty = self.field_type(&name, key, value)?;
            fields.push((key.clone(), ty));
        }
        self.types[slot].1 = fields;
        Ok(name)
    }

    fn field_type(&mut self, parent: &str, key: &str, value: &Value) -> Result<String> {
        Ok(match value {
            Value::Null => "String".to_string(),
            Value::Bool(_) => "Boolean!".to_string(),
            Value::Number(n) => match n.as_i64() {
                Some(i) if i32::try_from(i).is_ok() => "Int!".to_string(),
                _ => "Float!".to_string(),
            },
            Value::String(_) => "String!".to_string(),
            Value::Array(items) => match items.first() {
                Some(first) => format!("[{}]!", self.field_type(parent, key, first)?),
                None => "[String]".to_string(),
            },
            Value::Object(map) => {
                let wanted = format!("{}{}", parent, type_name_for(key));
                format!("{}!", self.object_type(wanted, map)?)
            }
        })
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (i, (name, fields)) in self.types.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "type {} {{", name);
            for (field, ty) in fields {
                let _ = writeln!(out, "  {}: {}", field, ty);
            }
            out.push_str("}\n");
        }
        out
    }
}

fn is_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

impl SchemaGenerator for GraphqlGenerator {
    fn generate(&self, sample: &Sample, type_name: &str) -> Result<String> {
        let value = parse_json_sample(sample)?;
        let Value::Object(map) = &value else {
            return Err(SchemaError::Generation(
                "GraphQL generation needs an object sample".into(),
            ));
        };
        if !is_graphql_name(type_name) {
            return Err(SchemaError::Generation(format!(
                "'{}' is not a valid GraphQL type name",
                type_name
            )));
        }
        let mut builder = SdlBuilder {
            types: Vec::new(),
            taken: HashSet::new(),
        };
        builder.object_type(type_name.to_string(), map)?;
        Ok(builder.render())
    }
}

// ---------------------------------------------------------------------------
// Protobuf
// ---------------------------------------------------------------------------

/// Renders `.proto` text from the sample's `prost-types` descriptor.
///
/// The root message comes first, followed by every top-level message or
/// enum it references, breadth-first and each once. Nested types stay
/// nested and map entries render as `map<K, V>`.
pub struct ProtobufGenerator;

impl SchemaGenerator for ProtobufGenerator {
    fn generate(&self, sample: &Sample, _type_name: &str) -> Result<String> {
        let desc = sample.descriptor.as_ref().ok_or_else(|| {
            SchemaError::Generation("protobuf generation needs a message descriptor".into())
        })?;
        if desc.message(&desc.message_name).is_none() {
            return Err(SchemaError::Generation(format!(
                "message {} not found in {}",
                desc.message_name,
                desc.file.name()
            )));
        }

        let mut out = String::from("syntax = \"proto3\";\n");
        if !desc.file.package().is_empty() {
            let _ = write!(out, "\npackage {};\n", desc.file.package());
        }

        let mut emitter = ProtoEmitter {
            desc,
            out,
            refs: Vec::new(),
        };
        let root = desc.root_name().to_string();
        let mut queue = vec![root.clone()];
        let mut seen = HashSet::from([root]);
        let mut next = 0;
        while next < queue.len() {
            let name = queue[next].clone();
            next += 1;
            emitter.out.push('\n');
            if let Some(message) = desc.message(&name) {
                emitter.message(message, 0)?;
            } else if let Some(enumeration) = desc.enumeration(&name) {
                emitter.enumeration(enumeration, 0)?;
            } else {
                return Err(SchemaError::Generation(format!("unresolved type {}", name)));
            }
            for path in emitter.refs.drain(..) {
                let top = path.split('.').next().unwrap_or(&path).to_string();
                if seen.insert(top.clone()) {
                    queue.push(top);
                }
            }
        }
        Ok(emitter.out)
    }
}

struct ProtoEmitter<'a> {
    desc: &'a ProtoDescriptor,
    out: String,
    /// Relative paths of types referenced by emitted fields.
    refs: Vec<String>,
}

impl ProtoEmitter<'_> {
    fn message(&mut self, message: &DescriptorProto, depth: usize) -> Result<()> {
        let pad = "  ".repeat(depth);
        let mut numbers = HashSet::new();
        for field in &message.field {
            if field.number() <= 0 {
                return Err(SchemaError::Generation(format!(
                    "{}.{} has field number {}",
                    message.name(),
                    field.name(),
                    field.number()
                )));
            }
            if !numbers.insert(field.number()) {
                return Err(SchemaError::Generation(format!(
                    "{} reuses field number {}",
                    message.name(),
                    field.number()
                )));
            }
        }

        let _ = writeln!(self.out, "{}message {} {{", pad, message.name());
        for field in &message.field {
            let (label, ty) = self.field_type(field)?;
            let _ = writeln!(
                self.out,
                "{}  {}{} {} = {};",
                pad,
                label,
                ty,
                field.name(),
                field.number()
            );
        }
        for enumeration in &message.enum_type {
            self.enumeration(enumeration, depth + 1)?;
        }
        for nested in message.nested_type.iter().filter(|m| !is_map_entry(m)) {
            self.message(nested, depth + 1)?;
        }
        let _ = writeln!(self.out, "{}}}", pad);
        Ok(())
    }

    fn enumeration(&mut self, enumeration: &EnumDescriptorProto, depth: usize) -> Result<()> {
        if enumeration.value.first().map(|v| v.number()) != Some(0) {
            return Err(SchemaError::Generation(format!(
                "enum {} must start with a zero value",
                enumeration.name()
            )));
        }
        let pad = "  ".repeat(depth);
        let _ = writeln!(self.out, "{}enum {} {{", pad, enumeration.name());
        for value in &enumeration.value {
            let _ = writeln!(self.out, "{}  {} = {};", pad, value.name(), value.number());
        }
        let _ = writeln!(self.out, "{}}}", pad);
        Ok(())
    }

    /// Label prefix and type text of one field.
    fn field_type(&mut self, field: &FieldDescriptorProto) -> Result<(&'static str, String)> {
        let desc = self.desc;
        let ty = match field.r#type() {
            Type::Message => {
                let path = desc.relative(field.type_name());
                let target = desc.message(path).ok_or_else(|| {
                    SchemaError::Generation(format!(
                        "{} refers to unknown message {}",
                        field.name(),
                        field.type_name()
                    ))
                })?;
                if is_map_entry(target) {
                    return Ok(("", self.map_type(field, target)?));
                }
                self.refs.push(path.to_string());
                path.to_string()
            }
            Type::Enum => {
                let path = desc.relative(field.type_name());
                if desc.enumeration(path).is_none() {
                    return Err(SchemaError::Generation(format!(
                        "{} refers to unknown enum {}",
                        field.name(),
                        field.type_name()
                    )));
                }
                self.refs.push(path.to_string());
                path.to_string()
            }
            Type::Group => {
                return Err(SchemaError::Generation(format!(
                    "{} is a group, which proto3 does not support",
                    field.name()
                )))
            }
            scalar => scalar_name(scalar).to_string(),
        };
        let label = if field.label() == Label::Repeated {
            "repeated "
        } else if field.proto3_optional() {
            "optional "
        } else {
            ""
        };
        Ok((label, ty))
    }

    fn map_type(&mut self, field: &FieldDescriptorProto, entry: &DescriptorProto) -> Result<String> {
        let part = |number: i32| {
            entry.field.iter().find(|f| f.number() == number).ok_or_else(|| {
                SchemaError::Generation(format!("map field {} lacks entry field {}", field.name(), number))
            })
        };
        let key = part(1)?;
        let value = part(2)?;
        let (_, value_type) = self.field_type(value)?;
        Ok(format!("map<{}, {}>", scalar_name(key.r#type()), value_type))
    }
}

fn is_map_entry(message: &DescriptorProto) -> bool {
    message
        .options
        .as_ref()
        .is_some_and(|options| options.map_entry())
}

fn scalar_name(ty: Type) -> &'static str {
    match ty {
        Type::Double => "double",
        Type::Float => "float",
        Type::Int64 => "int64",
        Type::Uint64 => "uint64",
        Type::Int32 => "int32",
        Type::Fixed64 => "fixed64",
        Type::Fixed32 => "fixed32",
        Type::Bool => "bool",
        Type::String => "string",
        Type::Bytes => "bytes",
        Type::Uint32 => "uint32",
        Type::Sfixed32 => "sfixed32",
        Type::Sfixed64 => "sfixed64",
        Type::Sint32 => "sint32",
        Type::Sint64 => "sint64",
        Type::Group | Type::Message | Type::Enum => "",
    }
}
