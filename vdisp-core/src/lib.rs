//! # vdisp-core
//!
//! Core library of the vdisp virtual-display streaming server.
//!
//! This crate contains:
//! - **Display**: `SessionManager`, `DisplaySession`, `EncoderPipeline`,
//!   `SinkRegistry`, `InputController` and the platform traits they drive
//! - **Service**: `DisplayService` facade, `ActivityClock`, `IdleWatchdog`
//! - **Protocol types**: `FrameHeader`, `Packet`, `MessageKind`, `Call`, `Reply`
//! - **Codec**: `WireCodec` for framed TCP I/O via `tokio_util`
//! - **Network**: `ServiceListener`, `RemoteEndpoint`, `ServiceClient`
//! - **Error**: `VdispError`, a `thiserror`-based error hierarchy

pub mod codec;
pub mod display;
pub mod error;
pub mod flags;
pub mod header;
pub mod message;
pub mod network;
pub mod packet;
pub mod protocol;
pub mod service;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::WireCodec;
pub use display::{
    DEFAULT_DISPLAY, DisplayId, DisplayPlatform, DisplayRequest, DisplaySession, DisplaySize,
    EncoderPipeline, INVALID_DISPLAY, InputBackend, InputController, SessionManager,
    SinkRegistry, StreamSettings, VideoEncoder, VideoSink,
};
pub use error::VdispError;
pub use flags::{BufferFlags, DisplayFlags};
pub use header::{FrameHeader, HEADER_LENGTH, MAGIC};
pub use message::MessageKind;
pub use network::{RemoteEndpoint, ServiceClient, ServiceListener};
pub use packet::{MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, Packet};
pub use protocol::{Announcement, Call, Reply};
pub use service::{ActivityClock, DisplayService, IdleWatchdog};
