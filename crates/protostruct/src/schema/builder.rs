// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder API for MessageSchema.

use crate::schema::{EnumSchema, EnumVariant, FieldKind, FieldSchema, MessageSchema};
use std::sync::Arc;

/// Builder for creating MessageSchema instances.
///
/// Field numbers are assigned sequentially from 1 unless given explicitly
/// with [`SchemaBuilder::field_with_number`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldSchema>,
    next_number: u32,
}

impl SchemaBuilder {
    /// Create a new builder for a message type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            next_number: 1,
        }
    }

    fn push(mut self, field: FieldSchema) -> Self {
        self.next_number = field.number + 1;
        self.fields.push(field);
        self
    }

    /// Add a singular field.
    pub fn field(self, name: impl Into<String>, kind: FieldKind) -> Self {
        let number = self.next_number;
        self.push(FieldSchema::new(name, number, kind))
    }

    /// Add a singular field with an explicit field number.
    pub fn field_with_number(self, name: impl Into<String>, kind: FieldKind, number: u32) -> Self {
        self.push(FieldSchema::new(name, number, kind))
    }

    /// Add a string field.
    pub fn string_field(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::String)
    }

    /// Add an enum field.
    pub fn enum_field(self, name: impl Into<String>, schema: Arc<EnumSchema>) -> Self {
        self.field(name, FieldKind::Enum(schema))
    }

    /// Add a repeated field.
    pub fn repeated_field(self, name: impl Into<String>, kind: FieldKind) -> Self {
        let number = self.next_number;
        self.push(FieldSchema::repeated(name, number, kind))
    }

    /// Add a nested message field.
    pub fn message_field(self, name: impl Into<String>, nested: Arc<MessageSchema>) -> Self {
        self.field(name, FieldKind::Message(nested))
    }

    /// Add a repeated nested message field.
    pub fn repeated_message_field(
        self,
        name: impl Into<String>,
        nested: Arc<MessageSchema>,
    ) -> Self {
        self.repeated_field(name, FieldKind::Message(nested))
    }

    /// Add a `map<key, value>` field.
    ///
    /// The synthetic entry type is named after the field, `member8` giving
    /// `Member8Entry`.
    pub fn map_field(self, name: impl Into<String>, key: FieldKind, value: FieldKind) -> Self {
        let name = name.into();
        let entry = Arc::new(MessageSchema::map_entry(entry_name(&name), key, value));
        let number = self.next_number;
        self.push(FieldSchema::map(name, number, entry))
    }

    /// Add a `map<key, Message>` field.
    pub fn map_message_field(
        self,
        name: impl Into<String>,
        key: FieldKind,
        value: Arc<MessageSchema>,
    ) -> Self {
        self.map_field(name, key, FieldKind::Message(value))
    }

    /// Build the MessageSchema.
    pub fn build(self) -> MessageSchema {
        MessageSchema::new(self.name, self.fields)
    }
}

fn entry_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 5);
    let mut upper = true;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out.push_str("Entry");
    out
}

/// Builder for enum schemas.
#[derive(Debug)]
pub struct EnumBuilder {
    name: String,
    variants: Vec<EnumVariant>,
    next_number: i32,
}

impl EnumBuilder {
    /// Create a new enum builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variants: Vec::new(),
            next_number: 0,
        }
    }

    /// Add a variant with auto-incrementing number.
    pub fn variant(mut self, name: impl Into<String>) -> Self {
        self.variants.push(EnumVariant::new(name, self.next_number));
        self.next_number += 1;
        self
    }

    /// Add a variant with explicit number.
    pub fn variant_number(mut self, name: impl Into<String>, number: i32) -> Self {
        self.variants.push(EnumVariant::new(name, number));
        self.next_number = number + 1;
        self
    }

    /// Build the EnumSchema.
    pub fn build(self) -> EnumSchema {
        EnumSchema::new(self.name, self.variants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cardinality;

    #[test]
    fn test_builder_numbers_fields_sequentially() {
        let schema = SchemaBuilder::new("Message1")
            .field("member1", FieldKind::Int32)
            .field_with_number("member2", FieldKind::Int64, 10)
            .string_field("member3")
            .build();

        let numbers: Vec<u32> = schema.fields().iter().map(|f| f.number).collect();
        assert_eq!(numbers, vec![1, 10, 11]);
        assert_eq!(schema.name, "Message1");
    }

    #[test]
    fn test_builder_map_field() {
        let schema = SchemaBuilder::new("Message1")
            .map_field("member_eight", FieldKind::String, FieldKind::Int32)
            .build();

        let field = schema.field("member_eight").expect("map field");
        assert_eq!(field.cardinality, Cardinality::Map);
        let entry = field.message_schema().expect("entry schema");
        assert_eq!(entry.name, "MemberEightEntry");
        assert!(entry.is_map_entry());
    }

    #[test]
    fn test_builder_nested_and_repeated() {
        let inner = Arc::new(SchemaBuilder::new("Inner").field("v", FieldKind::Bool).build());
        let schema = SchemaBuilder::new("Outer")
            .message_field("one", inner.clone())
            .repeated_message_field("many", inner)
            .repeated_field("ids", FieldKind::UInt64)
            .build();

        assert_eq!(schema.fields()[0].cardinality, Cardinality::Singular);
        assert_eq!(schema.fields()[1].cardinality, Cardinality::Repeated);
        assert_eq!(schema.fields()[2].kind, FieldKind::UInt64);
    }

    #[test]
    fn test_enum_builder() {
        let e = EnumBuilder::new("Enum")
            .variant("EN_FLAG1")
            .variant("EN_FLAG2")
            .variant_number("EN_FLAG9", 9)
            .variant("EN_FLAG10")
            .build();
        let numbers: Vec<i32> = e.variants.iter().map(|v| v.number).collect();
        assert_eq!(numbers, vec![0, 1, 9, 10]);
    }
}
