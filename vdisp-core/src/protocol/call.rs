//! Remote call protocol: requests, replies and the bootstrap announcement.
//!
//! # Wire Protocol
//!
//! ```text
//! Client ──[Call]─────────────► Server
//!   Payload: Call (bincode), request_id chosen by the client
//!
//! Server ──[Reply]────────────► Client
//!   Payload: Reply (bincode), same request_id
//!
//! Server ──[Error]────────────► Client
//!   Payload: UTF-8 error message, same request_id
//!
//! Server ──[VideoFrame]───────► Client   (one-way, repeated)
//!   Payload: raw encoded chunk, request_id 0
//!
//! Server ──[Announce]─────────► Target   (once per target at startup)
//!   Payload: Announcement (bincode)
//! ```
//!
//! A `SetVideoSink { attach: true }` call makes the calling connection the
//! sink of that display; frames then arrive on the same connection.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::display::types::DisplayId;
use crate::error::VdispError;
use crate::message::MessageKind;
use crate::packet::Packet;
use crate::protocol::input::TouchEventSpec;

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, VdispError> {
    bincode::serialize(value).map_err(|e| VdispError::Encoding(e.to_string()))
}

fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, VdispError> {
    bincode::deserialize(bytes).map_err(|e| VdispError::Encoding(e.to_string()))
}

// ── Call ─────────────────────────────────────────────────────────

/// One remote operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Call {
    /// Create a display. `bitrate_kbps <= 0` selects the default bitrate.
    EnsureDisplay {
        width: i32,
        height: i32,
        dpi: i32,
        bitrate_kbps: i32,
    },
    DestroyDisplay {
        display_id: DisplayId,
    },
    LaunchApp {
        package: String,
        display_id: DisplayId,
    },
    Tap {
        display_id: DisplayId,
        x: f32,
        y: f32,
    },
    Swipe {
        display_id: DisplayId,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        duration_ms: i64,
    },
    TouchDown {
        display_id: DisplayId,
        x: f32,
        y: f32,
    },
    TouchMove {
        display_id: DisplayId,
        x: f32,
        y: f32,
    },
    TouchUp {
        display_id: DisplayId,
        x: f32,
        y: f32,
    },
    InjectTouchEvent {
        display_id: DisplayId,
        event: TouchEventSpec,
    },
    InjectKey {
        display_id: DisplayId,
        key_code: i32,
    },
    InjectKeyWithMeta {
        display_id: DisplayId,
        key_code: i32,
        meta_state: i32,
    },
    RequestScreenshot {
        display_id: DisplayId,
    },
    /// Attach the calling endpoint as sink (`attach`), or clear the sink.
    SetVideoSink {
        display_id: DisplayId,
        attach: bool,
    },
}

impl Call {
    /// Short operation name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Call::EnsureDisplay { .. } => "ensure_display",
            Call::DestroyDisplay { .. } => "destroy_display",
            Call::LaunchApp { .. } => "launch_app",
            Call::Tap { .. } => "tap",
            Call::Swipe { .. } => "swipe",
            Call::TouchDown { .. } => "touch_down",
            Call::TouchMove { .. } => "touch_move",
            Call::TouchUp { .. } => "touch_up",
            Call::InjectTouchEvent { .. } => "inject_touch_event",
            Call::InjectKey { .. } => "inject_key",
            Call::InjectKeyWithMeta { .. } => "inject_key_with_meta",
            Call::RequestScreenshot { .. } => "request_screenshot",
            Call::SetVideoSink { .. } => "set_video_sink",
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, VdispError> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VdispError> {
        decode(bytes)
    }

    pub fn into_packet(self, request_id: u64) -> Result<Packet, VdispError> {
        Packet::new(MessageKind::Call, request_id, Bytes::from(self.to_bytes()?))
    }
}

// ── Reply ────────────────────────────────────────────────────────

/// Successful result of a [`Call`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Reply {
    Unit,
    DisplayId(DisplayId),
    /// PNG bytes, or `None` when the capture produced nothing.
    Screenshot(Option<Vec<u8>>),
}

impl Reply {
    pub fn to_bytes(&self) -> Result<Vec<u8>, VdispError> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VdispError> {
        decode(bytes)
    }

    pub fn into_packet(self, request_id: u64) -> Result<Packet, VdispError> {
        Packet::new(MessageKind::Reply, request_id, Bytes::from(self.to_bytes()?))
    }
}

/// Error reply carrying the failure's message.
pub fn error_packet(request_id: u64, error: &VdispError) -> Result<Packet, VdispError> {
    Packet::new(
        MessageKind::Error,
        request_id,
        Bytes::from(error.to_string().into_bytes()),
    )
}

// ── Announcement ─────────────────────────────────────────────────

/// Sent once to each bootstrap target so it can connect back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Announcement {
    /// `host:port` the call service listens on.
    pub service_addr: String,
    pub pid: u32,
}

impl Announcement {
    pub fn new(service_addr: impl Into<String>) -> Self {
        Self {
            service_addr: service_addr.into(),
            pid: std::process::id(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, VdispError> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VdispError> {
        decode(bytes)
    }

    pub fn into_packet(self) -> Result<Packet, VdispError> {
        Packet::new(MessageKind::Announce, 0, Bytes::from(self.to_bytes()?))
    }
}
