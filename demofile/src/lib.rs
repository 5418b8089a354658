//! Decoder for CS2 style `PBDEMS2` demos.
//!
//! The decode runs in stages that each only consume the previous one:
//! [`bitreader`] → [`container`] → [`message`] → [`entities`] → [`events`].
//! [`parser`] wires them together.

mod error;
pub use error::DemoError;

pub mod bitreader;
pub mod container;
pub mod entities;
pub mod events;
pub mod message;
pub mod parser;
pub mod sendtables;
pub mod synthetic;
pub mod types;
pub mod writer;

pub use container::{Container, DemoHeader, Frame, FrameIterator, FrameKind};
pub use events::DomainEvent;
pub use parser::{parse, EventStream, Output, Player};
pub use types::{Team, UserId, Vector3};
