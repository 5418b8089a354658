//! Encoder for the demo format, the inverse of [`crate::container`] and
//! [`crate::message`].
//!
//! Used to build fixtures and benchmark inputs. [`DemoWriter`] writes the
//! container, [`PacketWriter`] assembles the sub-messages of one packet.

use crate::{
    container::{encode_command, Compression, DemoHeader, FrameKind, MAGIC},
    message::{
        DeltaOp, EntityDelta, GameEventDescriptor, KeyType, RawValue, UserCommand,
        MSG_CREATE_STRING_TABLE, MSG_GAME_EVENT, MSG_GAME_EVENT_LIST, MSG_PACKET_ENTITIES,
        MSG_UPDATE_STRING_TABLE,
    },
    sendtables::{PropValue, ServerClass},
};

pub fn write_varint32(out: &mut Vec<u8>, value: u32) {
    write_varint64(out, value as u64);
}

pub fn write_varint64(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

pub fn write_signed_varint32(out: &mut Vec<u8>, value: i32) {
    write_varint32(out, ((value << 1) ^ (value >> 31)) as u32);
}

pub fn write_f32(out: &mut Vec<u8>, value: f32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_string(out: &mut Vec<u8>, value: &str) {
    write_varint32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

/// Encodes one property value the way the reconstructor decodes it.
pub fn encode_prop(value: &PropValue) -> Vec<u8> {
    let mut out = Vec::new();
    match value {
        PropValue::I32(v) => write_signed_varint32(&mut out, *v),
        PropValue::F32(v) => write_f32(&mut out, *v),
        PropValue::Vector(v) => v.iter().for_each(|c| write_f32(&mut out, *c)),
        PropValue::String(s) => write_string(&mut out, s),
        PropValue::Bool(b) => out.push(*b as u8),
    }
    out
}

pub fn encode_classes(classes: &[ServerClass]) -> Vec<u8> {
    let mut out = Vec::new();
    write_varint32(&mut out, classes.len() as u32);
    for class in classes {
        write_varint32(&mut out, class.id);
        write_string(&mut out, &class.name);
        write_varint32(&mut out, class.props.len() as u32);
        for prop in class.props.iter() {
            write_string(&mut out, &prop.name);
            out.push(prop.kind.tag());
        }
    }
    out
}

pub fn encode_string_table(out: &mut Vec<u8>, name: &str, entries: &[(u32, &str)]) {
    write_string(out, name);
    write_varint32(out, entries.len() as u32);
    for (index, value) in entries {
        write_varint32(out, *index);
        write_string(out, value);
    }
}

/// Payload of a `StringTables` frame.
pub fn encode_string_tables(tables: &[(&str, Vec<(u32, &str)>)]) -> Vec<u8> {
    let mut out = Vec::new();
    write_varint32(&mut out, tables.len() as u32);
    for (name, entries) in tables {
        encode_string_table(&mut out, name, entries);
    }
    out
}

pub fn encode_user_command(command: &UserCommand) -> Vec<u8> {
    let mut out = Vec::new();
    write_varint32(&mut out, command.user_id as u32);
    write_f32(&mut out, command.pitch);
    write_f32(&mut out, command.yaw);
    write_varint32(&mut out, command.buttons);
    out
}

/// Writes a whole demo into memory.
pub struct DemoWriter {
    buf: Vec<u8>,
    compression: Compression,
    frames_written: usize,
}

impl DemoWriter {
    pub fn new(header: &DemoHeader) -> Self {
        let mut buf = Vec::with_capacity(1024);
        buf.extend_from_slice(MAGIC);
        // Offsets to the file info and spawn groups, never read back
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());

        write_varint32(&mut buf, header.demo_protocol);
        write_varint32(&mut buf, header.network_protocol);
        write_string(&mut buf, &header.map_name);
        write_string(&mut buf, &header.server_name);
        write_f32(&mut buf, header.tick_interval);
        write_varint32(&mut buf, header.total_ticks);

        Self {
            buf,
            compression: Compression::None,
            frames_written: 0,
        }
    }

    /// Compression applied to all following frames.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn write_frame(&mut self, kind: FrameKind, tick: u32, payload: &[u8]) {
        let (compression, payload) = match self.compression {
            Compression::None => (Compression::None, payload.to_vec()),
            Compression::Snappy => match snap::raw::Encoder::new().compress_vec(payload) {
                Ok(compressed) => (Compression::Snappy, compressed),
                Err(e) => {
                    tracing::warn!(?e, "Could not compress frame, writing it uncompressed");
                    (Compression::None, payload.to_vec())
                }
            },
        };

        self.write_raw_frame(encode_command(kind, compression), tick, &payload);
    }

    /// Writes a frame with an arbitrary command value and no processing of
    /// the payload.
    pub fn write_raw_frame(&mut self, command: u32, tick: u32, payload: &[u8]) {
        write_varint32(&mut self.buf, command);
        write_varint32(&mut self.buf, tick);
        write_varint32(&mut self.buf, payload.len() as u32);
        self.buf.extend_from_slice(payload);
        self.frames_written += 1;
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Ends the demo with a `Stop` frame.
    pub fn finish(mut self, tick: u32) -> Vec<u8> {
        self.write_raw_frame(encode_command(FrameKind::Stop, Compression::None), tick, &[]);
        self.buf
    }

    /// The bytes written so far, without a `Stop` frame.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Builds the payload of one `Packet` or `Signon` frame.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: Vec<u8>,
    messages: usize,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.messages == 0
    }

    pub fn message(&mut self, type_id: u32, body: &[u8]) -> &mut Self {
        write_varint32(&mut self.buf, type_id);
        write_varint32(&mut self.buf, body.len() as u32);
        self.buf.extend_from_slice(body);
        self.messages += 1;
        self
    }

    pub fn string_table(&mut self, create: bool, name: &str, entries: &[(u32, &str)]) -> &mut Self {
        let mut body = Vec::new();
        encode_string_table(&mut body, name, entries);

        let type_id = if create {
            MSG_CREATE_STRING_TABLE
        } else {
            MSG_UPDATE_STRING_TABLE
        };
        self.message(type_id, &body)
    }

    pub fn game_event_list(&mut self, descriptors: &[GameEventDescriptor]) -> &mut Self {
        let mut body = Vec::new();
        write_varint32(&mut body, descriptors.len() as u32);
        for descriptor in descriptors {
            write_varint32(&mut body, descriptor.id);
            write_string(&mut body, &descriptor.name);
            write_varint32(&mut body, descriptor.keys.len() as u32);
            for (key, key_type) in descriptor.keys.iter() {
                write_string(&mut body, key);
                body.push(key_type.tag());
            }
        }
        self.message(MSG_GAME_EVENT_LIST, &body)
    }

    /// Writes the values in descriptor order, keys missing from `values`
    /// get their type's zero value.
    pub fn game_event(
        &mut self,
        descriptor: &GameEventDescriptor,
        values: &[(&str, RawValue)],
    ) -> &mut Self {
        let mut body = Vec::new();
        write_varint32(&mut body, descriptor.id);

        for (key, key_type) in descriptor.keys.iter() {
            let value = values.iter().find(|(k, _)| k == key).map(|(_, v)| v);
            match (key_type, value) {
                (KeyType::String, Some(RawValue::String(s))) => write_string(&mut body, s),
                (KeyType::String, _) => write_string(&mut body, ""),
                (KeyType::Float, Some(RawValue::F32(v))) => write_f32(&mut body, *v),
                (KeyType::Float, _) => write_f32(&mut body, 0.0),
                (KeyType::Long | KeyType::Short | KeyType::Byte, Some(RawValue::I32(v))) => {
                    write_signed_varint32(&mut body, *v)
                }
                (KeyType::Long | KeyType::Short | KeyType::Byte, _) => {
                    write_signed_varint32(&mut body, 0)
                }
                (KeyType::Bool, Some(RawValue::Bool(b))) => body.push(*b as u8),
                (KeyType::Bool, _) => body.push(0),
                (KeyType::U64, Some(RawValue::U64(v))) => write_varint64(&mut body, *v),
                (KeyType::U64, _) => write_varint64(&mut body, 0),
            }
        }

        self.message(MSG_GAME_EVENT, &body)
    }

    pub fn entity_deltas(&mut self, deltas: &[EntityDelta]) -> &mut Self {
        let mut body = Vec::new();
        write_varint32(&mut body, deltas.len() as u32);
        for delta in deltas {
            write_varint32(&mut body, delta.entity_id);
            match delta.op {
                DeltaOp::Update => body.push(0),
                DeltaOp::Create { class_id } => {
                    body.push(1);
                    write_varint32(&mut body, class_id);
                }
                DeltaOp::Delete => {
                    body.push(2);
                    continue;
                }
            }

            write_varint32(&mut body, delta.changes.len() as u32);
            for change in delta.changes.iter() {
                write_varint32(&mut body, change.index);
                write_varint32(&mut body, change.data.len() as u32);
                body.extend_from_slice(&change.data);
            }
        }
        self.message(MSG_PACKET_ENTITIES, &body)
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
