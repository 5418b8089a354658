//! Server class schema, decoded from `DataTables` frames.

use std::collections::HashMap;

use crate::{bitreader::BitReader, DemoError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PropType {
    Int,
    Float,
    Vector,
    String,
    Bool,
}

impl PropType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Int,
            1 => Self::Float,
            2 => Self::Vector,
            3 => Self::String,
            4 => Self::Bool,
            _ => return None,
        })
    }

    pub fn tag(&self) -> u8 {
        match self {
            Self::Int => 0,
            Self::Float => 1,
            Self::Vector => 2,
            Self::String => 3,
            Self::Bool => 4,
        }
    }

    /// Decodes one transmitted value of this type.
    pub fn decode(&self, data: &[u8]) -> Result<PropValue, DemoError> {
        let mut reader = BitReader::new(data);

        Ok(match self {
            Self::Int => PropValue::I32(reader.read_signed_varint32()?),
            Self::Float => PropValue::F32(reader.read_f32()?),
            Self::Vector => PropValue::Vector([
                reader.read_f32()?,
                reader.read_f32()?,
                reader.read_f32()?,
            ]),
            Self::String => PropValue::String(reader.read_string()?),
            Self::Bool => PropValue::Bool(reader.read_bit()?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PropValue {
    I32(i32),
    F32(f32),
    Vector([f32; 3]),
    String(String),
    Bool(bool),
}

impl PropValue {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            Self::Bool(b) => Some(*b as i32),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_i32().and_then(|v| u32::try_from(v).ok())
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            Self::I32(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<[f32; 3]> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::I32(v) => Some(*v != 0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PropDescriptor {
    pub name: String,
    pub kind: PropType,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ServerClass {
    pub id: u32,
    pub name: String,
    pub props: Vec<PropDescriptor>,
}

impl ServerClass {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            props: Vec::new(),
        }
    }

    pub fn with_prop(mut self, name: impl Into<String>, kind: PropType) -> Self {
        self.props.push(PropDescriptor {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn prop_index(&self, name: &str) -> Option<u32> {
        self.props
            .iter()
            .position(|p| p.name == name)
            .map(|i| i as u32)
    }
}

/// All server classes known to one decode pass, by class id.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: HashMap<u32, ServerClass>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later definitions of a class id replace earlier ones.
    pub fn register(&mut self, classes: impl IntoIterator<Item = ServerClass>) {
        for class in classes {
            tracing::trace!(id = class.id, name = %class.name, props = class.props.len(), "Server class");
            self.classes.insert(class.id, class);
        }
    }

    pub fn get(&self, id: u32) -> Option<&ServerClass> {
        self.classes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

pub(crate) fn parse_classes(data: &[u8]) -> Result<Vec<ServerClass>, DemoError> {
    let mut reader = BitReader::new(data);

    let count = reader.read_varint32()?;
    let mut classes = Vec::with_capacity(count.min(4096) as usize);
    for _ in 0..count {
        let id = reader.read_varint32()?;
        let name = reader.read_string()?;

        let prop_count = reader.read_varint32()?;
        let mut props = Vec::with_capacity(prop_count.min(4096) as usize);
        for _ in 0..prop_count {
            let prop_name = reader.read_string()?;
            let tag = reader.read_u8()?;
            let kind = PropType::from_tag(tag).ok_or_else(|| DemoError::InvalidMessage {
                message: "data tables",
                reason: format!("property {}.{} has unknown type {}", name, prop_name, tag),
            })?;

            props.push(PropDescriptor {
                name: prop_name,
                kind,
            });
        }

        classes.push(ServerClass { id, name, props });
    }

    Ok(classes)
}
