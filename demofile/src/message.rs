//! Decodes frame payloads into typed messages.
//!
//! Packet and signon frames carry a sequence of `(type id, size, body)`
//! sub-messages. Every type id this decoder understands has an entry in
//! [`MESSAGE_DECODERS`]; anything else is skipped by its length.

use std::collections::{BTreeMap, HashMap};

use crate::{
    bitreader::BitReader,
    container::{Frame, FrameKind},
    sendtables::{self, ServerClass},
    DemoError,
};

pub const MSG_CREATE_STRING_TABLE: u32 = 44;
pub const MSG_UPDATE_STRING_TABLE: u32 = 45;
pub const MSG_VOICE_DATA: u32 = 47;
pub const MSG_TEMP_ENTITIES: u32 = 51;
pub const MSG_PACKET_ENTITIES: u32 = 55;
pub const MSG_GAME_EVENT_LIST: u32 = 205;
pub const MSG_GAME_EVENT: u32 = 207;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    ServerClasses(Vec<ServerClass>),
    GameEvent(GameEvent),
    EntityDeltas(Vec<EntityDelta>),
    UserCommand(UserCommand),
    ConsoleCommand(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringTable {
    pub name: String,
    entries: BTreeMap<u32, String>,
}

impl StringTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.entries.get(&index).map(|s| s.as_str())
    }

    pub fn set(&mut self, index: u32, value: String) {
        self.entries.insert(index, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.entries.iter().map(|(i, v)| (*i, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringTables {
    tables: BTreeMap<String, StringTable>,
}

impl StringTables {
    pub fn get(&self, name: &str) -> Option<&StringTable> {
        self.tables.get(name)
    }

    fn apply(&mut self, name: String, entries: Vec<(u32, String)>) {
        let table = self
            .tables
            .entry(name.clone())
            .or_insert_with(|| StringTable::new(name));
        for (index, value) in entries {
            table.set(index, value);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    String,
    Float,
    Long,
    Short,
    Byte,
    Bool,
    U64,
}

impl KeyType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => Self::String,
            2 => Self::Float,
            3 => Self::Long,
            4 => Self::Short,
            5 => Self::Byte,
            6 => Self::Bool,
            7 => Self::U64,
            _ => return None,
        })
    }

    pub fn tag(&self) -> u8 {
        match self {
            Self::String => 1,
            Self::Float => 2,
            Self::Long => 3,
            Self::Short => 4,
            Self::Byte => 5,
            Self::Bool => 6,
            Self::U64 => 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEventDescriptor {
    pub id: u32,
    pub name: String,
    pub keys: Vec<(String, KeyType)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    String(String),
    F32(f32),
    I32(i32),
    Bool(bool),
    U64(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameEvent {
    pub name: String,
    pub keys: Vec<(String, RawValue)>,
}

impl GameEvent {
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.keys.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        match self.get(key)? {
            RawValue::I32(v) => Some(*v),
            RawValue::F32(v) => Some(*v as i32),
            RawValue::U64(v) => i32::try_from(*v).ok(),
            RawValue::Bool(b) => Some(*b as i32),
            RawValue::String(_) => None,
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            RawValue::U64(v) => Some(*v),
            RawValue::I32(v) => u64::try_from(*v).ok(),
            RawValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            RawValue::Bool(b) => Some(*b),
            RawValue::I32(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            RawValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOp {
    Update,
    Create { class_id: u32 },
    Delete,
}

/// A still encoded property value for one property index of the entity's
/// class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropChange {
    pub index: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDelta {
    pub entity_id: u32,
    pub op: DeltaOp,
    pub changes: Vec<PropChange>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserCommand {
    pub user_id: i32,
    pub pitch: f32,
    pub yaw: f32,
    pub buttons: u32,
}

impl UserCommand {
    pub const BUTTON_ATTACK: u32 = 1;

    pub fn attacking(&self) -> bool {
        self.buttons & Self::BUTTON_ATTACK != 0
    }
}

/// Wire level state shared by all messages of one decode pass.
#[derive(Debug, Default)]
pub struct SessionState {
    pub string_tables: StringTables,
    pub event_descriptors: HashMap<u32, GameEventDescriptor>,
}

pub type DecodeFn = fn(&mut SessionState, &[u8]) -> Result<Option<Message>, DemoError>;

pub static MESSAGE_DECODERS: phf::Map<u32, DecodeFn> = phf::phf_map! {
    44_u32 => decode_string_table_message as DecodeFn,
    45_u32 => decode_string_table_message as DecodeFn,
    47_u32 => ignore as DecodeFn,
    51_u32 => ignore as DecodeFn,
    55_u32 => decode_packet_entities as DecodeFn,
    205_u32 => decode_game_event_list as DecodeFn,
    207_u32 => decode_game_event as DecodeFn,
};

pub struct MessageDecoder {
    state: SessionState,
    skipped: usize,
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self {
            state: SessionState::default(),
            skipped: 0,
        }
    }

    pub fn string_tables(&self) -> &StringTables {
        &self.state.string_tables
    }

    pub fn event_descriptor(&self, id: u32) -> Option<&GameEventDescriptor> {
        self.state.event_descriptors.get(&id)
    }

    /// Number of sub-messages skipped because of an unknown type id.
    pub fn skipped_messages(&self) -> usize {
        self.skipped
    }

    pub fn into_string_tables(self) -> StringTables {
        self.state.string_tables
    }

    pub fn decode(&mut self, frame: &Frame<'_>) -> Result<Vec<Message>, DemoError> {
        match frame.kind {
            FrameKind::Packet | FrameKind::Signon => self.decode_packet(&frame.data),
            FrameKind::DataTables => Ok(vec![Message::ServerClasses(sendtables::parse_classes(
                &frame.data,
            )?)]),
            FrameKind::StringTables => {
                let mut reader = BitReader::new(&frame.data);
                let count = reader.read_varint32()?;
                for _ in 0..count {
                    let (name, entries) = read_string_table(&mut reader)?;
                    self.state.string_tables.apply(name, entries);
                }
                Ok(Vec::new())
            }
            FrameKind::UserCmd => {
                let mut reader = BitReader::new(&frame.data);
                Ok(vec![Message::UserCommand(UserCommand {
                    user_id: reader.read_varint32()? as i32,
                    pitch: reader.read_f32()?,
                    yaw: reader.read_f32()?,
                    buttons: reader.read_varint32()?,
                })])
            }
            FrameKind::ConsoleCmd => {
                let command = String::from_utf8_lossy(&frame.data)
                    .trim_end_matches('\0')
                    .to_owned();
                tracing::trace!(%command, "Console command");
                Ok(vec![Message::ConsoleCommand(command)])
            }
            FrameKind::SyncTick | FrameKind::CustomData | FrameKind::Stop => Ok(Vec::new()),
        }
    }

    fn decode_packet(&mut self, data: &[u8]) -> Result<Vec<Message>, DemoError> {
        let mut reader = BitReader::new(data);

        let mut messages = Vec::new();
        while !reader.is_empty() {
            let type_id = reader.read_varint32()?;
            let size = reader.read_varint32()? as usize;
            let body = reader.read_bytes(size)?;

            let decoder = match MESSAGE_DECODERS.get(&type_id) {
                Some(d) => d,
                None => {
                    tracing::warn!(type_id, size, "Skipping unknown message");
                    self.skipped += 1;
                    continue;
                }
            };

            if let Some(message) = decoder(&mut self.state, &body)? {
                messages.push(message);
            }
        }

        Ok(messages)
    }
}

fn ignore(_: &mut SessionState, _: &[u8]) -> Result<Option<Message>, DemoError> {
    Ok(None)
}

fn read_string_table(
    reader: &mut BitReader<'_>,
) -> Result<(String, Vec<(u32, String)>), DemoError> {
    let name = reader.read_string()?;
    let count = reader.read_varint32()?;

    let mut entries = Vec::with_capacity(count.min(4096) as usize);
    for _ in 0..count {
        let index = reader.read_varint32()?;
        let value = reader.read_string()?;
        entries.push((index, value));
    }

    Ok((name, entries))
}

fn decode_string_table_message(
    state: &mut SessionState,
    data: &[u8],
) -> Result<Option<Message>, DemoError> {
    let mut reader = BitReader::new(data);
    let (name, entries) = read_string_table(&mut reader)?;

    tracing::trace!(%name, entries = entries.len(), "String table update");
    state.string_tables.apply(name, entries);

    Ok(None)
}

fn decode_game_event_list(
    state: &mut SessionState,
    data: &[u8],
) -> Result<Option<Message>, DemoError> {
    let mut reader = BitReader::new(data);

    let count = reader.read_varint32()?;
    for _ in 0..count {
        let id = reader.read_varint32()?;
        let name = reader.read_string()?;

        let key_count = reader.read_varint32()?;
        let mut keys = Vec::with_capacity(key_count.min(256) as usize);
        for _ in 0..key_count {
            let key = reader.read_string()?;
            let tag = reader.read_u8()?;
            let key_type = KeyType::from_tag(tag).ok_or_else(|| DemoError::InvalidMessage {
                message: "game event list",
                reason: format!("key {}.{} has unknown type {}", name, key, tag),
            })?;
            keys.push((key, key_type));
        }

        state
            .event_descriptors
            .insert(id, GameEventDescriptor { id, name, keys });
    }

    Ok(None)
}

fn decode_game_event(state: &mut SessionState, data: &[u8]) -> Result<Option<Message>, DemoError> {
    let mut reader = BitReader::new(data);

    let id = reader.read_varint32()?;
    let descriptor = match state.event_descriptors.get(&id) {
        Some(d) => d,
        None => {
            tracing::warn!(id, "Game event without descriptor");
            return Ok(None);
        }
    };

    let mut keys = Vec::with_capacity(descriptor.keys.len());
    for (name, key_type) in descriptor.keys.iter() {
        let value = match key_type {
            KeyType::String => RawValue::String(reader.read_string()?),
            KeyType::Float => RawValue::F32(reader.read_f32()?),
            KeyType::Long | KeyType::Short | KeyType::Byte => {
                RawValue::I32(reader.read_signed_varint32()?)
            }
            KeyType::Bool => RawValue::Bool(reader.read_u8()? != 0),
            KeyType::U64 => RawValue::U64(reader.read_varint64()?),
        };
        keys.push((name.clone(), value));
    }

    Ok(Some(Message::GameEvent(GameEvent {
        name: descriptor.name.clone(),
        keys,
    })))
}

fn decode_packet_entities(_: &mut SessionState, data: &[u8]) -> Result<Option<Message>, DemoError> {
    let mut reader = BitReader::new(data);

    let count = reader.read_varint32()?;
    let mut deltas = Vec::with_capacity(count.min(4096) as usize);
    for _ in 0..count {
        let entity_id = reader.read_varint32()?;
        let op = match reader.read_u8()? {
            0 => DeltaOp::Update,
            1 => DeltaOp::Create {
                class_id: reader.read_varint32()?,
            },
            2 => DeltaOp::Delete,
            other => {
                return Err(DemoError::InvalidMessage {
                    message: "packet entities",
                    reason: format!("entity {} has unknown operation {}", entity_id, other),
                })
            }
        };

        let mut changes = Vec::new();
        if op != DeltaOp::Delete {
            let change_count = reader.read_varint32()?;
            changes.reserve(change_count.min(1024) as usize);
            for _ in 0..change_count {
                let index = reader.read_varint32()?;
                let data = reader.read_length_prefixed()?.into_owned();
                changes.push(PropChange { index, data });
            }
        }

        deltas.push(EntityDelta {
            entity_id,
            op,
            changes,
        });
    }

    Ok(Some(Message::EntityDeltas(deltas)))
}
