// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::float_cmp)] // Test assertions with constants
#![allow(clippy::missing_panics_doc)] // Tests panic on failure
#![allow(clippy::too_many_lines)] // Test fixtures

//! Native struct <-> `prost_reflect::DynamicMessage` integration tests
//!
//! The schema comes from a protobuf descriptor pool instead of a builder,
//! and the converted message goes through the protobuf wire format before
//! being decoded back into a struct.

use prost::Message as _;
use prost_reflect::{DescriptorPool, DynamicMessage, MapKey, MessageDescriptor, Value};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MessageOptions,
};
use protostruct::native::{StructBytes, StructMap, StructString, StructVec};
use protostruct::reflect::schema_from_descriptor;
use protostruct::{
    compute_layout, field_offsets, proto_to_new_struct, proto_to_struct, struct_to_proto,
    StructLayout,
};
use std::mem;

// ============================================================================
// Fixtures
// ============================================================================

const OFFLINE: i32 = 0;
const ONLINE: i32 = 1;

#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq)]
struct Point {
    x: f64,
    y: f64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq)]
struct Reading {
    id: u32,
    label: StructString,
    state: i32,
    samples: StructVec<f64>,
    limits: StructMap<StructString, i64>,
    origin: Point,
    path: StructVec<Point>,
    anchors: StructMap<u32, Point>,
    payload: StructBytes,
    flags: StructVec<bool>,
}

fn field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.into()),
        number: Some(number),
        r#type: Some(ty as i32),
        label: Some(label as i32),
        ..Default::default()
    }
}

fn typed(mut proto: FieldDescriptorProto, type_name: &str) -> FieldDescriptorProto {
    proto.type_name = Some(type_name.into());
    proto
}

fn map_entry(name: &str, key: Type, value: FieldDescriptorProto) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.into()),
        field: vec![field("key", 1, key, Label::Optional), value],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn pool() -> DescriptorPool {
    let point = DescriptorProto {
        name: Some("Point".into()),
        field: vec![
            field("x", 1, Type::Double, Label::Optional),
            field("y", 2, Type::Double, Label::Optional),
        ],
        ..Default::default()
    };
    let reading = DescriptorProto {
        name: Some("Reading".into()),
        field: vec![
            field("id", 1, Type::Fixed32, Label::Optional),
            field("label", 2, Type::String, Label::Optional),
            typed(field("state", 3, Type::Enum, Label::Optional), ".telemetry.State"),
            field("samples", 4, Type::Double, Label::Repeated),
            typed(
                field("limits", 5, Type::Message, Label::Repeated),
                ".telemetry.Reading.LimitsEntry",
            ),
            typed(field("origin", 6, Type::Message, Label::Optional), ".telemetry.Point"),
            typed(field("path", 7, Type::Message, Label::Repeated), ".telemetry.Point"),
            typed(
                field("anchors", 8, Type::Message, Label::Repeated),
                ".telemetry.Reading.AnchorsEntry",
            ),
            field("payload", 9, Type::Bytes, Label::Optional),
            field("flags", 10, Type::Bool, Label::Repeated),
        ],
        nested_type: vec![
            map_entry(
                "LimitsEntry",
                Type::String,
                field("value", 2, Type::Sint64, Label::Optional),
            ),
            map_entry(
                "AnchorsEntry",
                Type::Uint32,
                typed(field("value", 2, Type::Message, Label::Optional), ".telemetry.Point"),
            ),
        ],
        ..Default::default()
    };
    let node = DescriptorProto {
        name: Some("Node".into()),
        field: vec![typed(
            field("children", 1, Type::Message, Label::Repeated),
            ".telemetry.Node",
        )],
        ..Default::default()
    };
    let state = EnumDescriptorProto {
        name: Some("State".into()),
        value: [("OFFLINE", OFFLINE), ("ONLINE", ONLINE)]
            .into_iter()
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some(name.into()),
                number: Some(number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };
    let file = FileDescriptorProto {
        name: Some("telemetry.proto".into()),
        package: Some("telemetry".into()),
        syntax: Some("proto3".into()),
        message_type: vec![point, reading, node],
        enum_type: vec![state],
        ..Default::default()
    };

    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(file).expect("valid descriptor");
    pool
}

fn descriptor(name: &str) -> MessageDescriptor {
    pool().get_message_by_name(name).expect("known message")
}

fn sample_reading() -> Reading {
    Reading {
        id: 4021,
        label: "boiler-2".into(),
        state: ONLINE,
        samples: vec![61.5, 62.25, -3.0].into(),
        limits: [("max".into(), 95), ("min".into(), -40)].into(),
        origin: Point { x: 48.85, y: 2.35 },
        path: vec![Point { x: 1.0, y: 2.0 }, Point { x: -1.0, y: 0.5 }].into(),
        anchors: [
            (7, Point { x: 0.0, y: 1.0 }),
            (u32::MAX, Point { x: 9.5, y: -9.5 }),
        ]
        .into(),
        payload: StructBytes::from(&[0x00, 0x7f, 0xff][..]),
        flags: vec![true, false].into(),
    }
}

fn encode(reading: &Reading) -> DynamicMessage {
    let mut msg = DynamicMessage::new(descriptor("telemetry.Reading"));
    // SAFETY: Reading mirrors telemetry.Reading field for field.
    assert!(unsafe { struct_to_proto(reading, &mut msg) });
    msg
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn test_descriptor_layout_matches_native_struct() {
    let schema = schema_from_descriptor(&descriptor("telemetry.Reading")).expect("schema");
    assert_eq!(compute_layout(&schema), StructLayout::of::<Reading>());

    let offsets = field_offsets(&schema).expect("offsets");
    assert_eq!(offsets[1], mem::offset_of!(Reading, label));
    assert_eq!(offsets[5], mem::offset_of!(Reading, origin));
    assert_eq!(offsets[7], mem::offset_of!(Reading, anchors));
    assert_eq!(offsets[9], mem::offset_of!(Reading, flags));
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_struct_to_prost_message() {
    let msg = encode(&sample_reading());

    let value = |name: &str| msg.get_field_by_name(name).expect("field").into_owned();
    assert_eq!(value("id"), Value::U32(4021));
    assert_eq!(value("label"), Value::String("boiler-2".into()));
    assert_eq!(value("state"), Value::EnumNumber(ONLINE));

    let limits = value("limits");
    let limits = limits.as_map().expect("map");
    assert_eq!(limits.len(), 2);
    assert_eq!(limits.get(&MapKey::String("min".into())), Some(&Value::I64(-40)));

    let anchors = value("anchors");
    let anchor = anchors
        .as_map()
        .and_then(|m| m.get(&MapKey::U32(u32::MAX)))
        .and_then(Value::as_message)
        .expect("anchor");
    assert_eq!(anchor.get_field_by_name("y").map(|v| v.into_owned()), Some(Value::F64(-9.5)));
}

#[test]
fn test_roundtrip_through_wire_format() {
    let original = sample_reading();
    let wire = encode(&original).encode_to_vec();
    let parsed =
        DynamicMessage::decode(descriptor("telemetry.Reading"), wire.as_slice()).expect("wire");

    // SAFETY: Reading mirrors telemetry.Reading.
    let decoded: Reading = unsafe { proto_to_new_struct(&parsed) }.expect("decode");
    assert_eq!(decoded, original);
}

#[test]
fn test_absent_fields_decode_as_defaults() {
    let mut msg = DynamicMessage::new(descriptor("telemetry.Reading"));
    msg.set_field_by_name("id", Value::U32(9));

    // SAFETY: Reading mirrors telemetry.Reading.
    let decoded: Reading = unsafe { proto_to_new_struct(&msg) }.expect("decode");
    assert_eq!(
        decoded,
        Reading {
            id: 9,
            ..Reading::default()
        }
    );
}

#[test]
fn test_decode_replaces_existing_reading() {
    let source = Reading {
        state: OFFLINE,
        limits: [("max".into(), 12)].into(),
        ..Reading::default()
    };
    let msg = encode(&source);

    let mut target = sample_reading();
    // SAFETY: Reading mirrors telemetry.Reading.
    assert!(unsafe { proto_to_struct(&msg, &mut target) });
    assert_eq!(target, source);
    assert!(target.path.is_empty());
    assert!(target.anchors.is_empty());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_recursive_message_not_converted() {
    let node = descriptor("telemetry.Node");
    assert!(schema_from_descriptor(&node).is_err());

    let mut msg = DynamicMessage::new(node);
    // SAFETY: the schema cannot be resolved, so nothing is read.
    assert!(!unsafe { struct_to_proto(&0u64, &mut msg) });
    // SAFETY: same as above, nothing is written.
    assert!(unsafe { proto_to_new_struct::<_, u64>(&msg) }.is_none());
}
