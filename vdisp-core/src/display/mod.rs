//! Virtual display lifecycle and streaming.
//!
//! | Module | Role |
//! |---|---|
//! | `types` | Sizes, requests, encoder config and output events |
//! | `platform` | Traits the privileged platform adapter implements |
//! | `input` | [`InputController`] gesture and key synthesis |
//! | `sink` | [`SinkRegistry`] single-slot sink with liveness tracking |
//! | `pipeline` | [`EncoderPipeline`] capture thread |
//! | `session` | [`DisplaySession`] one display and its resources |
//! | `manager` | [`SessionManager`] table of live sessions |

pub mod input;
pub mod manager;
pub mod pipeline;
pub mod platform;
pub mod session;
pub mod sink;
pub mod types;

pub use input::InputController;
pub use manager::SessionManager;
pub use pipeline::{ConfigCallback, EncoderPipeline, FrameCallback};
pub use platform::{DisplayPlatform, InputBackend, RenderSurface, VideoEncoder, VirtualDisplay};
pub use session::DisplaySession;
pub use sink::{DeathCallback, LivenessToken, SinkRegistry, VideoSink};
pub use types::{
    BufferInfo, DEFAULT_BITRATE, DEFAULT_DISPLAY, DisplayId, DisplayRequest, DisplaySize,
    EncoderConfig, EncoderOutput, INVALID_DISPLAY, StreamSettings, VirtualDisplayRequest,
};
