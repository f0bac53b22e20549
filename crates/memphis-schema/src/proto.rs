// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol buffer message capability.
//!
//! A `prost` message type that wants to be recognized as protobuf (rather
//! than a plain record) implements [`ProtoMessage`]: on top of
//! [`prost::Name`] it hands out the `FileDescriptorProto` of the `.proto`
//! file that defines it. The descriptor is what schema generation reads;
//! `prost` does the wire encoding.

use prost::Message as _;
use prost_types::{DescriptorProto, EnumDescriptorProto, FileDescriptorProto};

/// A `prost` message that can describe its own `.proto` layout.
pub trait ProtoMessage: prost::Name {
    /// Descriptor of the file defining this message and every message or
    /// enum it references.
    fn file_descriptor() -> FileDescriptorProto;
}

/// Where a protobuf message type lives: its file descriptor plus the
/// message's path inside it (`Order`, or `Order.Line` when nested).
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoDescriptor {
    pub message_name: String,
    pub file: FileDescriptorProto,
}

impl ProtoDescriptor {
    /// Descriptor of message type `M`.
    pub fn of<M: ProtoMessage>() -> Self {
        Self {
            message_name: M::NAME.to_string(),
            file: M::file_descriptor(),
        }
    }

    /// Root segment of the message path, i.e. the top-level type to emit.
    pub fn root_name(&self) -> &str {
        self.message_name
            .split('.')
            .next()
            .unwrap_or(&self.message_name)
    }

    /// Path of `type_name` relative to the file's package:
    /// `.shop.Order.Line` -> `Order.Line`.
    pub fn relative<'n>(&self, type_name: &'n str) -> &'n str {
        let package = self.file.package();
        type_name
            .strip_prefix('.')
            .map(|t| {
                if package.is_empty() {
                    t
                } else {
                    t.strip_prefix(package)
                        .and_then(|rest| rest.strip_prefix('.'))
                        .unwrap_or(t)
                }
            })
            .unwrap_or(type_name)
    }

    /// Message at relative `path`, walking nested types.
    pub fn message(&self, path: &str) -> Option<&DescriptorProto> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.file.message_type.iter().find(|m| m.name() == first)?;
        for segment in segments {
            current = current.nested_type.iter().find(|m| m.name() == segment)?;
        }
        Some(current)
    }

    /// Enum at relative `path`, top-level or nested in a message.
    pub fn enumeration(&self, path: &str) -> Option<&EnumDescriptorProto> {
        match path.rsplit_once('.') {
            None => self.file.enum_type.iter().find(|e| e.name() == path),
            Some((parent, name)) => self
                .message(parent)?
                .enum_type
                .iter()
                .find(|e| e.name() == name),
        }
    }
}

/// An encoded protobuf message together with its descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoPayload {
    pub descriptor: ProtoDescriptor,
    pub encoded: Vec<u8>,
}

impl ProtoPayload {
    /// Encode `message` with `prost` and capture its descriptor.
    pub fn new<M: ProtoMessage>(message: &M) -> Self {
        Self {
            descriptor: ProtoDescriptor::of::<M>(),
            encoded: message.encode_to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::descriptors::{field, file, message, message_field};
    use prost::Message as _;
    use prost_types::field_descriptor_proto::Type;

    #[derive(Clone, PartialEq, prost::Message)]
    struct Ping {
        #[prost(uint64, tag = "1")]
        seq: u64,
    }

    impl prost::Name for Ping {
        const NAME: &'static str = "Ping";
        const PACKAGE: &'static str = "net";
    }

    impl ProtoMessage for Ping {
        fn file_descriptor() -> FileDescriptorProto {
            file("net", vec![message("Ping", vec![field("seq", 1, Type::Uint64)])])
        }
    }

    #[test]
    fn payload_is_prost_encoding() {
        let payload = ProtoPayload::new(&Ping { seq: 150 });
        // Canonical example from the protobuf encoding guide.
        assert_eq!(payload.encoded, vec![0x08, 0x96, 0x01]);
        assert_eq!(Ping::decode(&payload.encoded[..]).unwrap().seq, 150);
        assert_eq!(payload.descriptor.message_name, "Ping");
        assert_eq!(payload.descriptor.file.package(), "net");
    }

    #[test]
    fn resolves_relative_and_nested_names() {
        let mut order = message(
            "Order",
            vec![message_field("line", 1, ".shop.Order.Line")],
        );
        order
            .nested_type
            .push(message("Line", vec![field("sku", 1, Type::String)]));
        order.enum_type.push(EnumDescriptorProto {
            name: Some("Status".into()),
            ..Default::default()
        });
        let desc = ProtoDescriptor {
            message_name: "Order.Line".into(),
            file: file("shop", vec![order]),
        };

        assert_eq!(desc.root_name(), "Order");
        assert_eq!(desc.relative(".shop.Order.Line"), "Order.Line");
        assert_eq!(desc.relative(".other.Thing"), "other.Thing");
        assert_eq!(desc.relative("Order"), "Order");
        assert_eq!(desc.message("Order.Line").map(|m| m.name()), Some("Line"));
        assert!(desc.message("Order.Missing").is_none());
        assert!(desc.enumeration("Order.Status").is_some());
        assert!(desc.enumeration("Status").is_none());
    }
}
