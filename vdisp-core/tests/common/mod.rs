//! Scripted in-memory platform shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;

use vdisp_core::display::platform::{RenderSurface, VirtualDisplay};
use vdisp_core::display::sink::{DeathCallback, LivenessToken};
use vdisp_core::display::types::{
    BufferInfo, EncoderConfig, EncoderOutput, VirtualDisplayRequest,
};
use vdisp_core::protocol::InputEvent;
use vdisp_core::{
    BufferFlags, DisplayId, DisplayPlatform, InputBackend, VdispError, VideoEncoder, VideoSink,
};

pub type Journal = Arc<Mutex<Vec<String>>>;

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

// ── FakeEncoder ──────────────────────────────────────────────────

#[derive(Default)]
struct EncoderState {
    script: VecDeque<EncoderOutput>,
    buffers: HashMap<usize, Bytes>,
    next_index: usize,
    format_sent: bool,
    executing: bool,
}

/// Emits nothing until [`FakeEncoder::feed`] queues output.
pub struct FakeEncoder {
    pub config: EncoderConfig,
    codec_config: Vec<Bytes>,
    state: Mutex<EncoderState>,
    journal: Journal,
    fail_start: bool,
}

impl FakeEncoder {
    /// Queue a format change (first call only) followed by one buffer per
    /// chunk.
    pub fn feed(&self, chunks: &[&'static [u8]]) {
        let mut state = self.state.lock();
        if !state.format_sent {
            state.format_sent = true;
            state.script.push_back(EncoderOutput::FormatChanged);
        }
        for chunk in chunks {
            let index = state.next_index;
            state.next_index += 1;
            state.buffers.insert(index, Bytes::from_static(*chunk));
            state.script.push_back(EncoderOutput::Buffer {
                index,
                info: BufferInfo {
                    offset: 0,
                    size: chunk.len(),
                    presentation_time_us: index as i64 * 33_333,
                    flags: BufferFlags::empty(),
                },
            });
        }
    }

    /// Queue a format change on its own, as an encoder does once its
    /// surface starts rendering.
    pub fn announce_format(&self) {
        let mut state = self.state.lock();
        if !state.format_sent {
            state.format_sent = true;
            state.script.push_back(EncoderOutput::FormatChanged);
        }
    }

    /// Outputs queued but not yet dequeued by the capture loop.
    pub fn pending_outputs(&self) -> usize {
        self.state.lock().script.len()
    }

    pub fn outstanding_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    fn log(&self, what: &str) {
        self.journal.lock().push(what.to_string());
    }
}

impl VideoEncoder for FakeEncoder {
    fn create_input_surface(&self) -> Result<Arc<dyn RenderSurface>, VdispError> {
        self.log("surface.create");
        Ok(Arc::new(FakeSurface {
            journal: self.journal.clone(),
        }))
    }

    fn start(&self) -> Result<(), VdispError> {
        if self.fail_start {
            return Err(VdispError::Encoder("start refused".into()));
        }
        self.log("encoder.start");
        self.state.lock().executing = true;
        Ok(())
    }

    fn dequeue_output(&self, timeout: Duration) -> Result<EncoderOutput, VdispError> {
        {
            let mut state = self.state.lock();
            if !state.executing {
                return Err(VdispError::EncoderState("not executing".into()));
            }
            if let Some(output) = state.script.pop_front() {
                return Ok(output);
            }
        }
        std::thread::sleep(timeout);
        Ok(EncoderOutput::TryAgainLater)
    }

    fn codec_config(&self) -> Result<Vec<Bytes>, VdispError> {
        Ok(self.codec_config.clone())
    }

    fn output_buffer(&self, index: usize) -> Option<Bytes> {
        self.state.lock().buffers.get(&index).cloned()
    }

    fn release_output_buffer(&self, index: usize) -> Result<(), VdispError> {
        self.state.lock().buffers.remove(&index);
        Ok(())
    }

    fn signal_end_of_input(&self) -> Result<(), VdispError> {
        self.log("encoder.eos");
        let mut state = self.state.lock();
        let index = state.next_index;
        state.next_index += 1;
        state.buffers.insert(index, Bytes::new());
        state.script.push_back(EncoderOutput::Buffer {
            index,
            info: BufferInfo {
                flags: BufferFlags::END_OF_STREAM,
                ..Default::default()
            },
        });
        Ok(())
    }

    fn stop(&self) -> Result<(), VdispError> {
        self.log("encoder.stop");
        self.state.lock().executing = false;
        Ok(())
    }

    fn release(&self) -> Result<(), VdispError> {
        self.log("encoder.release");
        self.state.lock().executing = false;
        Ok(())
    }
}

struct FakeSurface {
    journal: Journal,
}

impl RenderSurface for FakeSurface {
    fn release(&self) -> Result<(), VdispError> {
        self.journal.lock().push("surface.release".into());
        Ok(())
    }
}

struct FakeDisplay {
    id: Option<DisplayId>,
    journal: Journal,
}

impl VirtualDisplay for FakeDisplay {
    fn display_id(&self) -> Option<DisplayId> {
        self.id
    }

    fn release(&self) -> Result<(), VdispError> {
        self.journal.lock().push("display.release".into());
        Ok(())
    }
}

struct FakeInput {
    events: Arc<Mutex<Vec<InputEvent>>>,
}

impl InputBackend for FakeInput {
    fn inject(&self, event: &InputEvent) -> Result<(), VdispError> {
        self.events.lock().push(*event);
        Ok(())
    }
}

// ── FakePlatform ─────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePlatform {
    pub journal: Journal,
    pub input_events: Arc<Mutex<Vec<InputEvent>>>,
    pub launches: Mutex<Vec<(String, DisplayId)>>,
    pub display_requests: Mutex<Vec<VirtualDisplayRequest>>,
    pub ime_requests: Mutex<Vec<DisplayId>>,
    encoders: Mutex<HashMap<DisplayId, Arc<FakeEncoder>>>,
    last_encoder: Mutex<Option<Arc<FakeEncoder>>>,
    next_display_id: AtomicI32,
    pub fail_encoder: AtomicBool,
    pub fail_start: AtomicBool,
    pub fail_display: AtomicBool,
    /// Forces the next display id instead of counting up.
    pub forced_display_id: Mutex<Option<DisplayId>>,
    pub api_level: AtomicU64,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        let platform = Self::default();
        platform.next_display_id.store(2, Ordering::SeqCst);
        platform.api_level.store(34, Ordering::SeqCst);
        Arc::new(platform)
    }

    pub fn encoder(&self, display_id: DisplayId) -> Arc<FakeEncoder> {
        self.encoders
            .lock()
            .get(&display_id)
            .cloned()
            .unwrap_or_else(|| panic!("no encoder for display {display_id}"))
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }
}

impl DisplayPlatform for FakePlatform {
    fn api_level(&self) -> u32 {
        self.api_level.load(Ordering::SeqCst) as u32
    }

    fn create_encoder(&self, config: &EncoderConfig) -> Result<Arc<dyn VideoEncoder>, VdispError> {
        if self.fail_encoder.load(Ordering::SeqCst) {
            return Err(VdispError::acquisition("encoder", "no hardware codec"));
        }
        self.journal.lock().push("encoder.create".into());
        let encoder = Arc::new(FakeEncoder {
            config: config.clone(),
            codec_config: vec![Bytes::from_static(b"csd-0"), Bytes::from_static(b"csd-1")],
            state: Mutex::new(EncoderState::default()),
            journal: self.journal.clone(),
            fail_start: self.fail_start.load(Ordering::SeqCst),
        });
        *self.last_encoder.lock() = Some(encoder.clone());
        Ok(encoder)
    }

    fn create_virtual_display(
        &self,
        request: &VirtualDisplayRequest,
        _surface: &Arc<dyn RenderSurface>,
    ) -> Result<Box<dyn VirtualDisplay>, VdispError> {
        if self.fail_display.load(Ordering::SeqCst) {
            return Err(VdispError::acquisition("virtual display", "denied"));
        }
        self.journal.lock().push("display.create".into());
        self.display_requests.lock().push(request.clone());

        let id = match self.forced_display_id.lock().take() {
            Some(id) => id,
            None => self.next_display_id.fetch_add(1, Ordering::SeqCst),
        };
        if let Some(encoder) = self.last_encoder.lock().take() {
            self.encoders.lock().insert(id, encoder);
        }
        Ok(Box::new(FakeDisplay {
            id: Some(id),
            journal: self.journal.clone(),
        }))
    }

    fn create_input_backend(&self) -> Result<Arc<dyn InputBackend>, VdispError> {
        Ok(Arc::new(FakeInput {
            events: self.input_events.clone(),
        }))
    }

    fn set_local_ime_policy(&self, display_id: DisplayId) -> Result<(), VdispError> {
        self.ime_requests.lock().push(display_id);
        Ok(())
    }

    fn launch_app(&self, package: &str, display_id: DisplayId) -> Result<(), VdispError> {
        self.launches.lock().push((package.to_string(), display_id));
        Ok(())
    }

    fn capture_screenshot(&self, display_id: DisplayId) -> Result<Option<Vec<u8>>, VdispError> {
        if display_id == 0 {
            return Ok(None);
        }
        Ok(Some(b"\x89PNG\r\n\x1a\n".to_vec()))
    }
}

// ── FakeSink ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Watch(u64),
    Unwatch(u64),
}

/// Records every frame and liveness (un)registration it sees.
#[derive(Default)]
pub struct FakeSink {
    pub frames: Mutex<Vec<Bytes>>,
    pub events: Mutex<Vec<SinkEvent>>,
    watchers: Mutex<HashMap<u64, DeathCallback>>,
    next: AtomicU64,
    dead: AtomicBool,
    pub delivery_attempts: AtomicU64,
    /// Shared journal for ordering checks across sinks.
    shared: Option<(&'static str, Journal)>,
}

impl FakeSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A sink that also records `watch <label>` / `unwatch <label>` in a
    /// journal shared with other sinks.
    pub fn labelled(label: &'static str, journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            shared: Some((label, journal)),
            ..Self::default()
        })
    }

    fn record(&self, event: SinkEvent) {
        if let Some((label, journal)) = &self.shared {
            let line = match event {
                SinkEvent::Watch(_) => format!("watch {label}"),
                SinkEvent::Unwatch(_) => format!("unwatch {label}"),
            };
            journal.lock().push(line);
        }
        self.events.lock().push(event);
    }

    /// Simulate the remote process dying.
    pub fn kill(&self) {
        self.dead.store(true, Ordering::SeqCst);
        let watchers: Vec<DeathCallback> = self.watchers.lock().drain().map(|(_, cb)| cb).collect();
        for cb in watchers {
            cb();
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().clone()
    }

    pub fn watch_count(&self) -> usize {
        self.watchers.lock().len()
    }
}

impl VideoSink for FakeSink {
    fn on_video_frame(&self, frame: Bytes) -> Result<(), VdispError> {
        self.delivery_attempts.fetch_add(1, Ordering::SeqCst);
        if self.dead.load(Ordering::SeqCst) {
            return Err(VdispError::RemoteDead);
        }
        self.frames.lock().push(frame);
        Ok(())
    }

    fn watch_liveness(&self, on_death: DeathCallback) -> Result<LivenessToken, VdispError> {
        if self.dead.load(Ordering::SeqCst) {
            return Err(VdispError::RemoteDead);
        }
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        self.record(SinkEvent::Watch(id));
        self.watchers.lock().insert(id, on_death);
        Ok(LivenessToken(id))
    }

    fn unwatch_liveness(&self, token: LivenessToken) {
        self.record(SinkEvent::Unwatch(token.0));
        self.watchers.lock().remove(&token.0);
    }
}
