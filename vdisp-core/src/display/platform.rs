//! Seams to the privileged platform adapter.
//!
//! The session manager never touches OS APIs directly. Everything it needs
//! from the device — a hardware encoder, the surface it renders into, the
//! virtual display bound to that surface, raw input injection, app launch
//! and screenshots — arrives through these traits.
//!
//! Handles use `&self` methods: an encoder is polled from its capture
//! thread while teardown calls into it from a request thread, so
//! implementations synchronise internally.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::display::types::{
    DisplayId, EncoderConfig, EncoderOutput, VirtualDisplayRequest,
};
use crate::error::VdispError;
use crate::protocol::input::InputEvent;

/// A configured hardware video encoder fed from its own input surface.
pub trait VideoEncoder: Send + Sync {
    /// Create the surface the virtual display will render into.
    fn create_input_surface(&self) -> Result<Arc<dyn RenderSurface>, VdispError>;

    fn start(&self) -> Result<(), VdispError>;

    /// Wait at most `timeout` for the next output event.
    ///
    /// Returns [`VdispError::EncoderState`] when the encoder is no longer
    /// executing (stopped or being released).
    fn dequeue_output(&self, timeout: Duration) -> Result<EncoderOutput, VdispError>;

    /// Codec configuration blobs of the current output format, in order.
    fn codec_config(&self) -> Result<Vec<Bytes>, VdispError>;

    /// Full contents of a dequeued output buffer; `BufferInfo` selects the
    /// valid range.
    fn output_buffer(&self, index: usize) -> Option<Bytes>;

    fn release_output_buffer(&self, index: usize) -> Result<(), VdispError>;

    fn signal_end_of_input(&self) -> Result<(), VdispError>;

    fn stop(&self) -> Result<(), VdispError>;

    fn release(&self) -> Result<(), VdispError>;
}

/// Render target produced by an encoder.
pub trait RenderSurface: Send + Sync {
    fn release(&self) -> Result<(), VdispError>;
}

/// An off-screen display created by the platform.
pub trait VirtualDisplay: Send + Sync {
    /// Id assigned by the platform, if the display came up.
    fn display_id(&self) -> Option<DisplayId>;

    fn release(&self) -> Result<(), VdispError>;
}

/// Delivers fully formed input events to the platform input service.
pub trait InputBackend: Send + Sync {
    fn inject(&self, event: &InputEvent) -> Result<(), VdispError>;

    /// Timestamp base for synthesized events, in milliseconds.
    fn now_ms(&self) -> i64 {
        static ORIGIN: OnceLock<Instant> = OnceLock::new();
        ORIGIN.get_or_init(Instant::now).elapsed().as_millis() as i64
    }
}

/// Factory for every platform resource the core uses.
pub trait DisplayPlatform: Send + Sync {
    /// Platform API level, used to select display flags.
    fn api_level(&self) -> u32 {
        0
    }

    fn create_encoder(&self, config: &EncoderConfig) -> Result<Arc<dyn VideoEncoder>, VdispError>;

    fn create_virtual_display(
        &self,
        request: &VirtualDisplayRequest,
        surface: &Arc<dyn RenderSurface>,
    ) -> Result<Box<dyn VirtualDisplay>, VdispError>;

    fn create_input_backend(&self) -> Result<Arc<dyn InputBackend>, VdispError>;

    /// Keep the soft keyboard on the virtual display itself.
    fn set_local_ime_policy(&self, _display_id: DisplayId) -> Result<(), VdispError> {
        Err(VdispError::Unsupported("ime policy"))
    }

    fn launch_app(&self, package: &str, display_id: DisplayId) -> Result<(), VdispError>;

    /// PNG bytes of the display, or `None` when nothing could be captured.
    fn capture_screenshot(&self, display_id: DisplayId) -> Result<Option<Vec<u8>>, VdispError>;
}
