//! Touch and key synthesis against a single display.
//!
//! An [`InputController`] turns high-level gestures (tap, swipe, key press)
//! into the individual down/move/up events the platform understands, and
//! stamps every event with the display it currently targets.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::display::platform::InputBackend;
use crate::display::types::{DEFAULT_DISPLAY, DisplayId};
use crate::error::VdispError;
use crate::protocol::input::{
    InputEvent, KeyEvent, MotionEvent, TouchEventSpec, key_action, motion_action,
};

/// Interval between interpolated swipe moves (≈ one 60 Hz frame).
const SWIPE_STEP_MS: i64 = 16;

/// Longest swipe performed; longer requests are shortened to this.
pub const MAX_SWIPE_DURATION_MS: i64 = 10_000;

// ── InputController ──────────────────────────────────────────────

/// Injects gestures into one display through an [`InputBackend`].
pub struct InputController {
    backend: Arc<dyn InputBackend>,
    display_id: AtomicI32,
    /// Down time of the gesture opened by `touch_down`, if any.
    gesture_down_ms: Mutex<Option<i64>>,
}

impl InputController {
    pub fn new(backend: Arc<dyn InputBackend>, display_id: DisplayId) -> Self {
        Self {
            backend,
            display_id: AtomicI32::new(display_id),
            gesture_down_ms: Mutex::new(None),
        }
    }

    /// Display that subsequent events are stamped with.
    pub fn display_id(&self) -> DisplayId {
        self.display_id.load(Ordering::Acquire)
    }

    pub fn set_display_id(&self, display_id: DisplayId) {
        self.display_id.store(display_id, Ordering::Release);
    }

    /// Retarget to the primary display. Used when the owning display is
    /// torn down.
    pub fn reset_target(&self) {
        self.set_display_id(DEFAULT_DISPLAY);
        *self.gesture_down_ms.lock() = None;
    }

    // ── Gestures ─────────────────────────────────────────────────

    /// Down immediately followed by up at the same point.
    pub fn tap(&self, x: f32, y: f32) -> Result<(), VdispError> {
        check_point(x, y)?;
        let now = self.backend.now_ms();
        self.motion(motion_action::DOWN, x, y, now, now)?;
        self.motion(motion_action::UP, x, y, now, now)
    }

    /// Straight-line drag from `(x1, y1)` to `(x2, y2)` over `duration_ms`.
    ///
    /// Blocks the caller for the duration of the gesture, at most
    /// [`MAX_SWIPE_DURATION_MS`].
    pub fn swipe(
        &self,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        duration_ms: i64,
    ) -> Result<(), VdispError> {
        check_point(x1, y1)?;
        check_point(x2, y2)?;
        let (steps, step_delay) = swipe_plan(duration_ms);

        let down = self.backend.now_ms();
        self.motion(motion_action::DOWN, x1, y1, down, down)?;

        for i in 1..=steps {
            if !step_delay.is_zero() {
                std::thread::sleep(step_delay);
            }
            let t = i as f32 / steps as f32;
            let x = x1 + (x2 - x1) * t;
            let y = y1 + (y2 - y1) * t;
            self.motion(motion_action::MOVE, x, y, down, self.backend.now_ms())?;
        }

        self.motion(motion_action::UP, x2, y2, down, self.backend.now_ms())
    }

    pub fn touch_down(&self, x: f32, y: f32) -> Result<(), VdispError> {
        check_point(x, y)?;
        let now = self.backend.now_ms();
        *self.gesture_down_ms.lock() = Some(now);
        self.motion(motion_action::DOWN, x, y, now, now)
    }

    pub fn touch_move(&self, x: f32, y: f32) -> Result<(), VdispError> {
        check_point(x, y)?;
        let now = self.backend.now_ms();
        let down = self.gesture_down_ms.lock().unwrap_or(now);
        self.motion(motion_action::MOVE, x, y, down, now)
    }

    pub fn touch_up(&self, x: f32, y: f32) -> Result<(), VdispError> {
        check_point(x, y)?;
        let now = self.backend.now_ms();
        let down = self.gesture_down_ms.lock().take().unwrap_or(now);
        self.motion(motion_action::UP, x, y, down, now)
    }

    /// Forward a fully specified touch event unchanged apart from the
    /// display binding.
    pub fn inject_touch_event(&self, spec: &TouchEventSpec) -> Result<(), VdispError> {
        check_point(spec.x, spec.y)?;
        let event = MotionEvent::from_spec(self.display_id(), spec);
        self.backend.inject(&InputEvent::Motion(event))
    }

    pub fn inject_key(&self, key_code: i32) -> Result<(), VdispError> {
        self.inject_key_with_meta(key_code, 0)
    }

    /// Key down then key up, both carrying `meta_state`.
    pub fn inject_key_with_meta(&self, key_code: i32, meta_state: i32) -> Result<(), VdispError> {
        if key_code < 0 {
            return Err(VdispError::InvalidArgument(format!(
                "negative key code {key_code}"
            )));
        }
        let display_id = self.display_id();
        let now = self.backend.now_ms();
        for action in [key_action::DOWN, key_action::UP] {
            let event = KeyEvent::new(display_id, action, key_code, meta_state, now);
            self.backend.inject(&InputEvent::Key(event))?;
        }
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    fn motion(
        &self,
        action: i32,
        x: f32,
        y: f32,
        down_ms: i64,
        event_ms: i64,
    ) -> Result<(), VdispError> {
        let event = MotionEvent::touch(self.display_id(), action, x, y, down_ms, event_ms);
        debug!(display_id = event.display_id, action, x, y, "inject motion");
        self.backend.inject(&InputEvent::Motion(event))
    }
}

/// Number of interpolated moves and the pause before each.
fn swipe_plan(duration_ms: i64) -> (i64, Duration) {
    let duration_ms = duration_ms.clamp(0, MAX_SWIPE_DURATION_MS);
    let steps = (duration_ms / SWIPE_STEP_MS).max(1);
    (steps, Duration::from_millis((duration_ms / steps) as u64))
}

fn check_point(x: f32, y: f32) -> Result<(), VdispError> {
    if x.is_finite() && y.is_finite() {
        Ok(())
    } else {
        Err(VdispError::InvalidArgument(format!(
            "non-finite coordinate ({x}, {y})"
        )))
    }
}

// ── Tests ────────────────────────────────────────────────────────
