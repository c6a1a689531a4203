//! Wire message kinds.
//!
//! Uses proper enums with `TryFrom`; unknown values are errors, not panics.

use crate::error::VdispError;
use std::fmt;

/// What a frame on the wire carries.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Client → service request; payload is a bincode [`Call`](crate::protocol::Call).
    Call = 0x1,
    /// Service → client successful answer; payload is a bincode [`Reply`](crate::protocol::Reply).
    Reply = 0x2,
    /// Service → client failed answer; payload is a UTF-8 message.
    Error = 0x3,
    /// Service → client one-way video frame; payload is the raw frame.
    VideoFrame = 0x4,
    /// Service → target one-shot advertisement of the service address.
    Announce = 0x5,
}

impl TryFrom<u32> for MessageKind {
    type Error = VdispError;

    fn try_from(value: u32) -> Result<Self, VdispError> {
        match value {
            0x1 => Ok(MessageKind::Call),
            0x2 => Ok(MessageKind::Reply),
            0x3 => Ok(MessageKind::Error),
            0x4 => Ok(MessageKind::VideoFrame),
            0x5 => Ok(MessageKind::Announce),
            _ => Err(VdispError::UnknownVariant {
                type_name: "MessageKind",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Call => write!(f, "Call"),
            MessageKind::Reply => write!(f, "Reply"),
            MessageKind::Error => write!(f, "Error"),
            MessageKind::VideoFrame => write!(f, "VideoFrame"),
            MessageKind::Announce => write!(f, "Announce"),
        }
    }
}
