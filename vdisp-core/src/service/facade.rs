//! Remote-facing service surface.
//!
//! [`DisplayService`] is what the transport calls into. Every entry point
//! marks the activity clock first, then validates the display id and
//! dispatches to the session manager or the matching input controller.

use std::sync::Arc;

use tracing::{debug, info};

use crate::display::manager::SessionManager;
use crate::display::sink::VideoSink;
use crate::display::types::{DisplayId, DisplayRequest, INVALID_DISPLAY};
use crate::error::VdispError;
use crate::protocol::call::{Call, Reply};
use crate::protocol::input::TouchEventSpec;
use crate::service::activity::ActivityClock;

pub struct DisplayService {
    manager: Arc<SessionManager>,
    clock: Arc<ActivityClock>,
}

impl DisplayService {
    pub fn new(manager: Arc<SessionManager>, clock: Arc<ActivityClock>) -> Self {
        Self { manager, clock }
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    pub fn clock(&self) -> &Arc<ActivityClock> {
        &self.clock
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Create a display. A positive `bitrate_kbps` is converted to bits per
    /// second; anything else selects the default bitrate.
    pub fn ensure_display(&self, width: i32, height: i32, dpi: i32, bitrate_kbps: i32) -> DisplayId {
        self.clock.mark_active();
        let bitrate = if bitrate_kbps > 0 {
            bitrate_kbps.saturating_mul(1000)
        } else {
            0
        };
        self.manager
            .ensure_display(DisplayRequest::new(width, height, dpi, bitrate))
    }

    pub fn destroy_display(&self, display_id: DisplayId) {
        self.clock.mark_active();
        self.manager.destroy_display(display_id);
    }

    /// Start `package` on `display_id`. An empty package name is ignored.
    pub fn launch_app(&self, package: &str, display_id: DisplayId) -> Result<(), VdispError> {
        self.clock.mark_active();
        let package = package.trim();
        if package.is_empty() {
            debug!(display_id, "launch_app with empty package ignored");
            return Ok(());
        }
        self.require_known(display_id)?;
        info!(display_id, package, "launching app");
        self.manager.platform().launch_app(package, display_id)
    }

    // ── Input ────────────────────────────────────────────────────

    pub fn tap(&self, display_id: DisplayId, x: f32, y: f32) -> Result<(), VdispError> {
        self.clock.mark_active();
        self.manager.require_input_controller(display_id)?.tap(x, y)
    }

    pub fn swipe(
        &self,
        display_id: DisplayId,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        duration_ms: i64,
    ) -> Result<(), VdispError> {
        self.clock.mark_active();
        self.manager
            .require_input_controller(display_id)?
            .swipe(x1, y1, x2, y2, duration_ms)
    }

    pub fn touch_down(&self, display_id: DisplayId, x: f32, y: f32) -> Result<(), VdispError> {
        self.clock.mark_active();
        self.manager.require_input_controller(display_id)?.touch_down(x, y)
    }

    pub fn touch_move(&self, display_id: DisplayId, x: f32, y: f32) -> Result<(), VdispError> {
        self.clock.mark_active();
        self.manager.require_input_controller(display_id)?.touch_move(x, y)
    }

    pub fn touch_up(&self, display_id: DisplayId, x: f32, y: f32) -> Result<(), VdispError> {
        self.clock.mark_active();
        self.manager.require_input_controller(display_id)?.touch_up(x, y)
    }

    pub fn inject_touch_event(
        &self,
        display_id: DisplayId,
        event: &TouchEventSpec,
    ) -> Result<(), VdispError> {
        self.clock.mark_active();
        self.manager
            .require_input_controller(display_id)?
            .inject_touch_event(event)
    }

    pub fn inject_key(&self, display_id: DisplayId, key_code: i32) -> Result<(), VdispError> {
        self.clock.mark_active();
        self.manager.require_input_controller(display_id)?.inject_key(key_code)
    }

    pub fn inject_key_with_meta(
        &self,
        display_id: DisplayId,
        key_code: i32,
        meta_state: i32,
    ) -> Result<(), VdispError> {
        self.clock.mark_active();
        self.manager
            .require_input_controller(display_id)?
            .inject_key_with_meta(key_code, meta_state)
    }

    // ── Capture ──────────────────────────────────────────────────

    /// PNG screenshot of a display, `None` when the capture came back empty.
    pub fn request_screenshot(&self, display_id: DisplayId) -> Result<Option<Vec<u8>>, VdispError> {
        self.clock.mark_active();
        self.require_known(display_id)?;
        self.manager.platform().capture_screenshot(display_id)
    }

    /// Attach (`Some`) or clear (`None`) the sink of a display. Unknown ids
    /// are ignored.
    pub fn set_video_sink(&self, display_id: DisplayId, sink: Option<Arc<dyn VideoSink>>) {
        self.clock.mark_active();
        if !self.manager.set_video_sink(display_id, sink) {
            debug!(display_id, "set_video_sink: unknown display");
        }
    }

    // ── Dispatch ─────────────────────────────────────────────────

    /// Execute a decoded call on behalf of `caller`, the endpoint the call
    /// arrived on. `caller` becomes the sink for `SetVideoSink { attach }`.
    pub fn dispatch(&self, call: Call, caller: Arc<dyn VideoSink>) -> Result<Reply, VdispError> {
        match call {
            Call::EnsureDisplay {
                width,
                height,
                dpi,
                bitrate_kbps,
            } => Ok(Reply::DisplayId(
                self.ensure_display(width, height, dpi, bitrate_kbps),
            )),
            Call::DestroyDisplay { display_id } => {
                self.destroy_display(display_id);
                Ok(Reply::Unit)
            }
            Call::LaunchApp {
                package,
                display_id,
            } => self.launch_app(&package, display_id).map(|_| Reply::Unit),
            Call::Tap { display_id, x, y } => self.tap(display_id, x, y).map(|_| Reply::Unit),
            Call::Swipe {
                display_id,
                x1,
                y1,
                x2,
                y2,
                duration_ms,
            } => self
                .swipe(display_id, x1, y1, x2, y2, duration_ms)
                .map(|_| Reply::Unit),
            Call::TouchDown { display_id, x, y } => {
                self.touch_down(display_id, x, y).map(|_| Reply::Unit)
            }
            Call::TouchMove { display_id, x, y } => {
                self.touch_move(display_id, x, y).map(|_| Reply::Unit)
            }
            Call::TouchUp { display_id, x, y } => {
                self.touch_up(display_id, x, y).map(|_| Reply::Unit)
            }
            Call::InjectTouchEvent { display_id, event } => self
                .inject_touch_event(display_id, &event)
                .map(|_| Reply::Unit),
            Call::InjectKey {
                display_id,
                key_code,
            } => self.inject_key(display_id, key_code).map(|_| Reply::Unit),
            Call::InjectKeyWithMeta {
                display_id,
                key_code,
                meta_state,
            } => self
                .inject_key_with_meta(display_id, key_code, meta_state)
                .map(|_| Reply::Unit),
            Call::RequestScreenshot { display_id } => {
                self.request_screenshot(display_id).map(Reply::Screenshot)
            }
            Call::SetVideoSink { display_id, attach } => {
                self.set_video_sink(display_id, attach.then_some(caller));
                Ok(Reply::Unit)
            }
        }
    }

    fn require_known(&self, display_id: DisplayId) -> Result<(), VdispError> {
        if display_id == INVALID_DISPLAY || !self.manager.is_known(display_id) {
            return Err(VdispError::UnknownDisplay(display_id));
        }
        Ok(())
    }
}
