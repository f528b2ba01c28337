// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Example readability over pedantic
#![allow(clippy::unreadable_literal)] // Large sample constants

/// Round-trip Example for protostruct
///
/// Demonstrates:
/// - Describing a message schema with `SchemaBuilder`
/// - Mirroring it with a `#[repr(C)]` struct of native containers
/// - Encoding the struct into a `DynamicMessage`
/// - Decoding the message back into a fresh struct
///
/// Run with `RUST_LOG=debug` to see the conversion log.
use protostruct::native::{StructMap, StructString, StructVec};
use protostruct::reflect::DynamicMessage;
use protostruct::schema::{EnumBuilder, FieldKind, SchemaBuilder};
use std::sync::Arc;

#[repr(C)]
#[derive(Debug, Clone, PartialEq)]
struct Device {
    id: u32,
    state: i32,
    name: StructString,
    tags: StructVec<StructString>,
    readings: StructMap<StructString, f64>,
}

#[repr(C)]
#[derive(Debug, PartialEq)]
struct Site {
    devices: StructMap<u64, Device>,
    history: StructVec<Device>,
    latitude: f64,
    longitude: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== protostruct Round-trip Example ===\n");

    let state = Arc::new(
        EnumBuilder::new("State")
            .variant("OFFLINE")
            .variant("ONLINE")
            .build(),
    );
    let device = Arc::new(
        SchemaBuilder::new("Device")
            .field("id", FieldKind::UInt32)
            .enum_field("state", state)
            .string_field("name")
            .repeated_field("tags", FieldKind::String)
            .map_field("readings", FieldKind::String, FieldKind::Double)
            .build(),
    );
    let site = Arc::new(
        SchemaBuilder::new("Site")
            .map_message_field("devices", FieldKind::UInt64, device.clone())
            .repeated_message_field("history", device)
            .field("latitude", FieldKind::Double)
            .field("longitude", FieldKind::Double)
            .build(),
    );
    println!(
        "[OK] Site layout: {:?} (native {} bytes)",
        protostruct::compute_layout(&site),
        std::mem::size_of::<Site>()
    );

    let pump = Device {
        id: 17,
        state: 1,
        name: "pump".into(),
        tags: vec!["north".into(), "critical".into()].into(),
        readings: [("pressure".into(), 2.4), ("temperature".into(), 61.5)].into(),
    };
    let original = Site {
        devices: [(9001, pump.clone())].into(),
        history: vec![pump].into(),
        latitude: 48.8566,
        longitude: 2.3522,
    };

    let mut msg = DynamicMessage::new(&site);
    // SAFETY: Site mirrors the Site schema field for field.
    if !unsafe { protostruct::struct_to_proto(&original, &mut msg) } {
        return Err("struct to message failed".into());
    }
    println!("[OK] Encoded message:\n{}", msg);

    // SAFETY: same layout contract as above.
    let decoded: Site =
        unsafe { protostruct::proto_to_new_struct(&msg) }.ok_or("message to struct failed")?;
    if decoded != original {
        return Err("round-trip changed the value".into());
    }
    println!("[OK] Decoded struct matches the original");

    Ok(())
}
