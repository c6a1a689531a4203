//! Shared types for the display/encoder pipeline.
//!
//! These are **internal** representations exchanged with the platform
//! adapter. They are distinct from [`crate::protocol::Call`], which is the
//! serialisable *wire* type.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::flags::{BufferFlags, DisplayFlags};

/// Platform-assigned virtual display identifier.
pub type DisplayId = i32;

/// The always-present primary display; never created or destroyed here.
pub const DEFAULT_DISPLAY: DisplayId = 0;

/// Returned by `ensure_display` when no display could be created.
pub const INVALID_DISPLAY: DisplayId = -1;

/// Bitrate used when the caller does not ask for one.
pub const DEFAULT_BITRATE: u32 = 4_000_000;

/// Encoder frame rate target.
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Seconds between forced keyframes.
pub const DEFAULT_KEYFRAME_INTERVAL_SECS: u32 = 1;

/// Upper bound on a single encoder output poll.
pub const OUTPUT_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Upper bound on waiting for a capture thread during teardown.
pub const CAPTURE_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

// ── DisplaySize ──────────────────────────────────────────────────

/// Width × height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: i32,
    pub height: i32,
}

impl DisplaySize {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Round both dimensions down to a multiple of 8 for the encoder.
    ///
    /// When rounding collapses either side to zero or below, both sides fall
    /// back to the requested values clamped to at least 2.
    pub fn aligned(self) -> Self {
        let width = self.width & !7;
        let height = self.height & !7;
        if width <= 0 || height <= 0 {
            return Self {
                width: self.width.max(2),
                height: self.height.max(2),
            };
        }
        Self { width, height }
    }
}

impl std::fmt::Display for DisplaySize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── Requests ─────────────────────────────────────────────────────

/// Parameters of an `ensure_display` request, before alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayRequest {
    pub size: DisplaySize,
    pub dpi: i32,
    /// Bits per second; non-positive selects the configured default.
    pub bitrate: i32,
}

impl DisplayRequest {
    pub fn new(width: i32, height: i32, dpi: i32, bitrate: i32) -> Self {
        Self {
            size: DisplaySize::new(width, height),
            dpi,
            bitrate,
        }
    }
}

/// Encoder tuning applied to every new display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub mime_type: String,
    pub default_bitrate: u32,
    pub frame_rate: u32,
    pub keyframe_interval_secs: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            mime_type: "video/avc".into(),
            default_bitrate: DEFAULT_BITRATE,
            frame_rate: DEFAULT_FRAME_RATE,
            keyframe_interval_secs: DEFAULT_KEYFRAME_INTERVAL_SECS,
        }
    }
}

impl StreamSettings {
    /// Encoder configuration for an aligned size and a requested bitrate.
    pub fn encoder_config(&self, size: DisplaySize, bitrate: i32) -> EncoderConfig {
        let bitrate = if bitrate > 0 {
            bitrate as u32
        } else {
            self.default_bitrate
        };
        EncoderConfig {
            mime_type: self.mime_type.clone(),
            size,
            bitrate,
            frame_rate: self.frame_rate,
            keyframe_interval_secs: self.keyframe_interval_secs,
        }
    }
}

/// What the platform must configure a hardware encoder with.
///
/// Input always comes from a surface the encoder creates itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub mime_type: String,
    pub size: DisplaySize,
    pub bitrate: u32,
    pub frame_rate: u32,
    pub keyframe_interval_secs: u32,
}

/// What the platform must create a virtual display with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDisplayRequest {
    pub name: String,
    pub size: DisplaySize,
    pub dpi: i32,
    pub flags: DisplayFlags,
}

// ── Encoder output ───────────────────────────────────────────────

/// Metadata for a dequeued encoder output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferInfo {
    /// Start of valid data within the buffer.
    pub offset: usize,
    /// Length of valid data; may be zero for flag-only buffers.
    pub size: usize,
    pub presentation_time_us: i64,
    pub flags: BufferFlags,
}

impl BufferInfo {
    pub fn is_end_of_stream(&self) -> bool {
        self.flags.contains(BufferFlags::END_OF_STREAM)
    }
}

/// Result of one bounded poll of the encoder's output queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderOutput {
    /// Nothing became available within the poll timeout.
    TryAgainLater,
    /// The output format was (re)negotiated; codec config is now readable.
    FormatChanged,
    /// A buffer is ready; it must be released exactly once.
    Buffer { index: usize, info: BufferInfo },
}
