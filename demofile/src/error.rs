/// Everything that can go wrong while decoding a demo.
///
/// All variants except [`DemoError::UnknownEntityClass`] abort the decode,
/// the parser never hands out a partial result after one of them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DemoError {
    #[error("reading {requested} bits at bit {position} exceeds the buffer ({available} bits left)")]
    OutOfBounds {
        position: usize,
        requested: usize,
        available: usize,
    },
    #[error("varint at bit {position} is longer than {max_bytes} bytes")]
    VarintOverflow { position: usize, max_bytes: usize },
    #[error("invalid demo header: {0}")]
    InvalidHeader(String),
    #[error("malformed frame at offset {offset}: {reason}")]
    MalformedFrame { offset: usize, reason: String },
    #[error("unsupported compression tag {tag} in frame at offset {offset}")]
    UnsupportedCompression { offset: usize, tag: u32 },
    #[error("invalid {message} message: {reason}")]
    InvalidMessage {
        message: &'static str,
        reason: String,
    },
    #[error("entity {entity_id} references unknown class {class_id}")]
    UnknownEntityClass { entity_id: u32, class_id: u32 },
}

impl DemoError {
    /// The demo uses a format feature this decoder does not implement, as
    /// opposed to being corrupt.
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self, Self::UnsupportedCompression { .. })
    }

    /// Only affects a single entity, decoding can carry on without it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownEntityClass { .. })
    }
}
