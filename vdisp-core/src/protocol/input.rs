//! Input event payloads.
//!
//! [`MotionEvent`] and [`KeyEvent`] are fully formed events handed to the
//! platform's [`InputBackend`](crate::display::platform::InputBackend).
//! [`TouchEventSpec`] is the caller-supplied shape of a raw touch event
//! before it is bound to a display.

use serde::{Deserialize, Serialize};

use crate::display::types::DisplayId;

/// Motion event action codes.
pub mod motion_action {
    pub const DOWN: i32 = 0;
    pub const UP: i32 = 1;
    pub const MOVE: i32 = 2;
    pub const CANCEL: i32 = 3;
}

/// Key event action codes.
pub mod key_action {
    pub const DOWN: i32 = 0;
    pub const UP: i32 = 1;
}

/// Event source codes.
pub mod source {
    pub const KEYBOARD: i32 = 0x0000_0101;
    pub const TOUCHSCREEN: i32 = 0x0000_1002;
}

// ── Touch ─────────────────────────────────────────────────────────

/// A raw touch event as sent by the client, not yet bound to a display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TouchEventSpec {
    pub action: i32,
    pub x: f32,
    pub y: f32,
    pub down_time_ms: i64,
    pub event_time_ms: i64,
    pub pressure: f32,
    pub size: f32,
    pub meta_state: i32,
    pub x_precision: f32,
    pub y_precision: f32,
    pub device_id: i32,
    pub edge_flags: i32,
}

/// A single-pointer touchscreen event targeted at one display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MotionEvent {
    pub display_id: DisplayId,
    pub source: i32,
    pub action: i32,
    pub x: f32,
    pub y: f32,
    pub down_time_ms: i64,
    pub event_time_ms: i64,
    pub pressure: f32,
    pub size: f32,
    pub meta_state: i32,
    pub x_precision: f32,
    pub y_precision: f32,
    pub device_id: i32,
    pub edge_flags: i32,
}

impl MotionEvent {
    /// A plain finger contact with default pressure and precision.
    pub fn touch(
        display_id: DisplayId,
        action: i32,
        x: f32,
        y: f32,
        down_time_ms: i64,
        event_time_ms: i64,
    ) -> Self {
        Self {
            display_id,
            source: source::TOUCHSCREEN,
            action,
            x,
            y,
            down_time_ms,
            event_time_ms,
            pressure: 1.0,
            size: 1.0,
            meta_state: 0,
            x_precision: 1.0,
            y_precision: 1.0,
            device_id: 0,
            edge_flags: 0,
        }
    }

    /// Bind a client-supplied raw touch event to a display.
    pub fn from_spec(display_id: DisplayId, spec: &TouchEventSpec) -> Self {
        Self {
            display_id,
            source: source::TOUCHSCREEN,
            action: spec.action,
            x: spec.x,
            y: spec.y,
            down_time_ms: spec.down_time_ms,
            event_time_ms: spec.event_time_ms,
            pressure: spec.pressure,
            size: spec.size,
            meta_state: spec.meta_state,
            x_precision: spec.x_precision,
            y_precision: spec.y_precision,
            device_id: spec.device_id,
            edge_flags: spec.edge_flags,
        }
    }

    /// Action code with the pointer index bits masked off.
    pub fn action_masked(&self) -> i32 {
        self.action & 0xFF
    }
}

// ── Keyboard ──────────────────────────────────────────────────────

/// A key event targeted at one display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyEvent {
    pub display_id: DisplayId,
    pub action: i32,
    pub key_code: i32,
    pub meta_state: i32,
    pub down_time_ms: i64,
    pub event_time_ms: i64,
    pub repeat: i32,
}

impl KeyEvent {
    pub fn new(display_id: DisplayId, action: i32, key_code: i32, meta_state: i32, at_ms: i64) -> Self {
        Self {
            display_id,
            action,
            key_code,
            meta_state,
            down_time_ms: at_ms,
            event_time_ms: at_ms,
            repeat: 0,
        }
    }

    pub fn is_down(&self) -> bool {
        self.action == key_action::DOWN
    }
}

// ── InputEvent ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum InputEvent {
    Motion(MotionEvent),
    Key(KeyEvent),
}

impl InputEvent {
    pub fn display_id(&self) -> DisplayId {
        match self {
            InputEvent::Motion(m) => m.display_id,
            InputEvent::Key(k) => k.display_id,
        }
    }
}
