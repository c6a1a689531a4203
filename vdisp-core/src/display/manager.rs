//! Session table: creation, lookup and teardown of virtual displays.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, info, warn};

use crate::display::input::InputController;
use crate::display::pipeline::EncoderPipeline;
use crate::display::platform::{DisplayPlatform, RenderSurface, VideoEncoder, VirtualDisplay};
use crate::display::session::DisplaySession;
use crate::display::sink::VideoSink;
use crate::display::types::{
    DEFAULT_DISPLAY, DisplayId, DisplayRequest, EncoderConfig, INVALID_DISPLAY, StreamSettings,
    VirtualDisplayRequest,
};
use crate::error::VdispError;
use crate::flags::DisplayFlags;

// ── Pending resources ────────────────────────────────────────────

/// Resources acquired so far by a display creation that has not been
/// committed to the table yet.
#[derive(Default)]
struct Pending {
    encoder: Option<Arc<dyn VideoEncoder>>,
    encoder_started: bool,
    surface: Option<Arc<dyn RenderSurface>>,
    display: Option<Box<dyn VirtualDisplay>>,
}

impl Pending {
    /// Release in reverse acquisition order.
    fn rollback(self) {
        if let Some(display) = self.display {
            if let Err(e) = display.release() {
                warn!("rollback: virtual display release failed: {e}");
            }
        }
        if let Some(surface) = self.surface {
            if let Err(e) = surface.release() {
                warn!("rollback: surface release failed: {e}");
            }
        }
        if let Some(encoder) = self.encoder {
            if self.encoder_started {
                if let Err(e) = encoder.stop() {
                    warn!("rollback: encoder stop failed: {e}");
                }
            }
            if let Err(e) = encoder.release() {
                warn!("rollback: encoder release failed: {e}");
            }
        }
    }
}

// ── SessionManager ───────────────────────────────────────────────

/// Owns every live [`DisplaySession`] and the input controllers keyed by
/// display id.
pub struct SessionManager {
    platform: Arc<dyn DisplayPlatform>,
    settings: StreamSettings,
    sessions: DashMap<DisplayId, Arc<DisplaySession>>,
    controllers: DashMap<DisplayId, Arc<InputController>>,
    created: AtomicU64,
}

impl SessionManager {
    /// Create an empty table. The primary display gets an input controller
    /// if the platform can provide one.
    pub fn new(platform: Arc<dyn DisplayPlatform>, settings: StreamSettings) -> Self {
        let controllers = DashMap::new();
        match platform.create_input_backend() {
            Ok(backend) => {
                controllers.insert(
                    DEFAULT_DISPLAY,
                    Arc::new(InputController::new(backend, DEFAULT_DISPLAY)),
                );
            }
            Err(e) => warn!("no input controller for the primary display: {e}"),
        }

        Self {
            platform,
            settings,
            sessions: DashMap::new(),
            controllers,
            created: AtomicU64::new(0),
        }
    }

    pub fn platform(&self) -> &Arc<dyn DisplayPlatform> {
        &self.platform
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Create a display, start streaming it and return its id.
    ///
    /// Returns [`INVALID_DISPLAY`] on any failure, after releasing whatever
    /// had been acquired.
    pub fn ensure_display(&self, request: DisplayRequest) -> DisplayId {
        match self.create_session(request) {
            Ok(display_id) => display_id,
            Err(e) => {
                warn!(
                    "ensure_display {} @ {}dpi failed: {e}",
                    request.size, request.dpi
                );
                INVALID_DISPLAY
            }
        }
    }

    fn create_session(&self, request: DisplayRequest) -> Result<DisplayId, VdispError> {
        let size = request.size.aligned();
        let config = self.settings.encoder_config(size, request.bitrate);
        let mut pending = Pending::default();

        if let Err(e) = self.acquire(&config, request.dpi, &mut pending) {
            pending.rollback();
            return Err(e);
        }

        let display_id = pending
            .display
            .as_ref()
            .and_then(|d| d.display_id())
            .unwrap_or(INVALID_DISPLAY);
        if display_id <= DEFAULT_DISPLAY {
            pending.rollback();
            return Err(VdispError::acquisition(
                "virtual display",
                format!("platform returned display id {display_id}"),
            ));
        }

        let input = match self.platform.create_input_backend() {
            Ok(backend) => Some(Arc::new(InputController::new(backend, display_id))),
            Err(e) => {
                warn!(display_id, "no input controller: {e}");
                None
            }
        };

        if let Err(e) = self.platform.set_local_ime_policy(display_id) {
            debug!(display_id, "local ime policy not applied: {e}");
        }

        let session = match self.sessions.entry(display_id) {
            Entry::Occupied(_) => {
                pending.rollback();
                return Err(VdispError::DuplicateDisplay(display_id));
            }
            Entry::Vacant(entry) => {
                let (Some(encoder), Some(surface), Some(display)) =
                    (pending.encoder, pending.surface, pending.display)
                else {
                    return Err(VdispError::Other("incomplete display resources".into()));
                };
                let pipeline = EncoderPipeline::new(display_id, encoder, surface);
                let session = Arc::new(DisplaySession::new(
                    display_id,
                    size,
                    display,
                    pipeline,
                    input.clone(),
                ));
                entry.insert(session.clone());
                session
            }
        };
        if let Some(input) = input {
            self.controllers.insert(display_id, input);
        }

        if let Err(e) = session.start() {
            self.remove(display_id);
            return Err(e);
        }

        info!(
            display_id,
            size = %size,
            bitrate = config.bitrate,
            "display created"
        );
        Ok(display_id)
    }

    /// Encoder, surface, encoder start, virtual display, in that order.
    fn acquire(
        &self,
        config: &EncoderConfig,
        dpi: i32,
        pending: &mut Pending,
    ) -> Result<(), VdispError> {
        let encoder = self.platform.create_encoder(config)?;
        pending.encoder = Some(encoder.clone());

        let surface = encoder.create_input_surface()?;
        pending.surface = Some(surface.clone());

        encoder.start()?;
        pending.encoder_started = true;

        let n = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        let request = VirtualDisplayRequest {
            name: format!("vdisp-{n}"),
            size: config.size,
            dpi,
            flags: DisplayFlags::for_api_level(self.platform.api_level()),
        };
        let display = self.platform.create_virtual_display(&request, &surface)?;
        pending.display = Some(display);
        Ok(())
    }

    /// Tear down a display. Unknown ids and the primary display are ignored.
    pub fn destroy_display(&self, display_id: DisplayId) {
        if display_id == DEFAULT_DISPLAY {
            debug!("destroy_display on the primary display ignored");
            return;
        }
        if !self.remove(display_id) {
            debug!(display_id, "destroy_display: unknown display");
        }
    }

    fn remove(&self, display_id: DisplayId) -> bool {
        let Some((_, session)) = self.sessions.remove(&display_id) else {
            return false;
        };
        if let Some(input) = session.input() {
            self.controllers
                .remove_if(&display_id, |_, c| Arc::ptr_eq(c, input));
        }
        session.release();
        info!(display_id, "display destroyed");
        true
    }

    /// Release every session. Used on process shutdown.
    pub fn shutdown(&self) {
        let ids = self.display_ids();
        for display_id in ids {
            self.remove(display_id);
        }
    }

    // ── Lookup ───────────────────────────────────────────────────

    pub fn session(&self, display_id: DisplayId) -> Option<Arc<DisplaySession>> {
        self.sessions.get(&display_id).map(|s| Arc::clone(s.value()))
    }

    /// Whether `display_id` is the primary display or a live session.
    pub fn is_known(&self, display_id: DisplayId) -> bool {
        display_id == DEFAULT_DISPLAY || self.sessions.contains_key(&display_id)
    }

    /// Ids of all live sessions, ascending.
    pub fn display_ids(&self) -> Vec<DisplayId> {
        let mut ids: Vec<DisplayId> = self.sessions.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn resolve_input_controller(&self, display_id: DisplayId) -> Option<Arc<InputController>> {
        self.controllers
            .get(&display_id)
            .map(|c| Arc::clone(c.value()))
    }

    pub fn require_input_controller(
        &self,
        display_id: DisplayId,
    ) -> Result<Arc<InputController>, VdispError> {
        if let Some(controller) = self.resolve_input_controller(display_id) {
            return Ok(controller);
        }
        if self.is_known(display_id) {
            Err(VdispError::NoInputController(display_id))
        } else {
            Err(VdispError::UnknownDisplay(display_id))
        }
    }

    // ── Sinks ────────────────────────────────────────────────────

    /// Attach or clear the sink of a display. Returns `false` for unknown
    /// ids.
    pub fn set_video_sink(&self, display_id: DisplayId, sink: Option<Arc<dyn VideoSink>>) -> bool {
        match self.session(display_id) {
            Some(session) => {
                session.set_video_sink(sink);
                true
            }
            None => false,
        }
    }

    /// Whether any session currently streams to a sink.
    pub fn any_sink_attached(&self) -> bool {
        self.sessions.iter().any(|s| s.value().has_sink())
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
