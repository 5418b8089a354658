//! The outer `PBDEMS2` container: preamble, header and the frame stream.

use std::borrow::Cow;

use crate::{bitreader::BitReader, DemoError};

pub const MAGIC: &[u8; 8] = b"PBDEMS2\0";

/// Magic plus the two (unused) offset fields.
pub const PREAMBLE_SIZE: usize = 16;

const KIND_MASK: u32 = 0x3F;
const COMPRESSION_SHIFT: u32 = 6;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DemoHeader {
    pub demo_protocol: u32,
    pub network_protocol: u32,
    pub map_name: String,
    pub server_name: String,
    /// Seconds per simulation tick
    pub tick_interval: f32,
    pub total_ticks: u32,
}

impl DemoHeader {
    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    /// Playback duration in seconds.
    pub fn duration(&self) -> f32 {
        self.total_ticks as f32 * self.tick_interval
    }

    pub fn tick_rate(&self) -> f32 {
        if self.tick_interval > 0.0 {
            1.0 / self.tick_interval
        } else {
            0.0
        }
    }

    fn parse(reader: &mut BitReader<'_>) -> Result<Self, DemoError> {
        Ok(Self {
            demo_protocol: reader.read_varint32()?,
            network_protocol: reader.read_varint32()?,
            map_name: reader.read_string()?,
            server_name: reader.read_string()?,
            tick_interval: reader.read_f32()?,
            total_ticks: reader.read_varint32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Stop,
    SyncTick,
    DataTables,
    StringTables,
    Packet,
    Signon,
    ConsoleCmd,
    CustomData,
    UserCmd,
}

impl FrameKind {
    pub fn from_command(command: u32) -> Option<Self> {
        Some(match command {
            0 => Self::Stop,
            3 => Self::SyncTick,
            4 => Self::DataTables,
            6 => Self::StringTables,
            7 => Self::Packet,
            8 => Self::Signon,
            9 => Self::ConsoleCmd,
            10 => Self::CustomData,
            12 => Self::UserCmd,
            _ => return None,
        })
    }

    pub fn command(&self) -> u32 {
        match self {
            Self::Stop => 0,
            Self::SyncTick => 3,
            Self::DataTables => 4,
            Self::StringTables => 6,
            Self::Packet => 7,
            Self::Signon => 8,
            Self::ConsoleCmd => 9,
            Self::CustomData => 10,
            Self::UserCmd => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Snappy,
}

impl Compression {
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::None),
            1 => Some(Self::Snappy),
            _ => None,
        }
    }

    pub fn tag(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Snappy => 1,
        }
    }
}

/// Combines a frame kind and compression into the command varint.
pub fn encode_command(kind: FrameKind, compression: Compression) -> u32 {
    kind.command() | (compression.tag() << COMPRESSION_SHIFT)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame<'b> {
    pub kind: FrameKind,
    pub tick: u32,
    /// Already decompressed
    pub data: Cow<'b, [u8]>,
}

#[derive(Debug)]
pub struct Container<'b> {
    pub header: DemoHeader,
    pub inner: &'b [u8],
    inner_offset: usize,
}

impl<'b> Container<'b> {
    pub fn parse(buf: &'b [u8]) -> Result<Self, DemoError> {
        if buf.len() < PREAMBLE_SIZE {
            return Err(DemoError::InvalidHeader(format!(
                "expected at least {} bytes, got {}",
                PREAMBLE_SIZE,
                buf.len()
            )));
        }
        if &buf[..MAGIC.len()] != MAGIC {
            return Err(DemoError::InvalidHeader(format!(
                "unknown magic {:?}",
                String::from_utf8_lossy(&buf[..MAGIC.len()])
            )));
        }

        let mut reader = BitReader::new(&buf[PREAMBLE_SIZE..]);
        let header = DemoHeader::parse(&mut reader)
            .map_err(|e| DemoError::InvalidHeader(e.to_string()))?;

        let inner_offset = PREAMBLE_SIZE + reader.byte_position();
        tracing::debug!(?header, "Parsed demo header");

        Ok(Self {
            header,
            inner: &buf[inner_offset..],
            inner_offset,
        })
    }

    /// A fresh iterator over all frames, starting at the first one.
    pub fn frames(&self) -> FrameIterator<'b> {
        FrameIterator::parse(self.inner).with_base_offset(self.inner_offset)
    }
}

/// Lazily walks the frames of a demo.
///
/// Stops at the first `Stop` frame, at the end of the buffer or after the
/// first error.
pub struct FrameIterator<'b> {
    reader: BitReader<'b>,
    base_offset: usize,
    done: bool,
}

impl<'b> FrameIterator<'b> {
    pub fn parse(data: &'b [u8]) -> Self {
        Self {
            reader: BitReader::new(data),
            base_offset: 0,
            done: false,
        }
    }

    /// Offsets in errors are reported relative to the whole file.
    pub fn with_base_offset(mut self, offset: usize) -> Self {
        self.base_offset = offset;
        self
    }

    fn next_frame(&mut self) -> Result<Option<Frame<'b>>, DemoError> {
        loop {
            if self.reader.is_empty() {
                return Ok(None);
            }

            let offset = self.base_offset + self.reader.byte_position();
            let malformed = move |e: DemoError| DemoError::MalformedFrame {
                offset,
                reason: e.to_string(),
            };

            let command = self.reader.read_varint32().map_err(malformed)?;
            let tick = self.reader.read_varint32().map_err(malformed)?;
            let size = self.reader.read_varint32().map_err(malformed)? as usize;

            if size > self.reader.remaining_bytes() {
                return Err(DemoError::MalformedFrame {
                    offset,
                    reason: format!(
                        "payload of {} bytes exceeds the {} remaining bytes",
                        size,
                        self.reader.remaining_bytes()
                    ),
                });
            }
            let payload = self.reader.read_bytes(size).map_err(malformed)?;

            let compression_tag = command >> COMPRESSION_SHIFT;
            let compression = Compression::from_tag(compression_tag).ok_or(
                DemoError::UnsupportedCompression {
                    offset,
                    tag: compression_tag,
                },
            )?;

            let kind = match FrameKind::from_command(command & KIND_MASK) {
                Some(k) => k,
                None => {
                    tracing::warn!(
                        command = command & KIND_MASK,
                        offset,
                        "Skipping frame of unknown kind"
                    );
                    continue;
                }
            };

            // Signon frames are stamped with tick -1
            let tick = if tick == u32::MAX { 0 } else { tick };

            if kind == FrameKind::Stop {
                return Ok(None);
            }

            let data = match compression {
                Compression::None => payload,
                Compression::Snappy => Cow::Owned(
                    snap::raw::Decoder::new()
                        .decompress_vec(&payload)
                        .map_err(|e| DemoError::MalformedFrame {
                            offset,
                            reason: e.to_string(),
                        })?,
                ),
            };

            tracing::trace!(?kind, tick, size = data.len(), "Frame");

            return Ok(Some(Frame { kind, tick, data }));
        }
    }
}

impl<'b> Iterator for FrameIterator<'b> {
    type Item = Result<Frame<'b>, DemoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
