//! One live virtual display and everything bound to it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tracing::{info, warn};

use crate::display::input::InputController;
use crate::display::pipeline::EncoderPipeline;
use crate::display::platform::VirtualDisplay;
use crate::display::sink::{SinkRegistry, VideoSink};
use crate::display::types::{DisplayId, DisplaySize};
use crate::error::VdispError;

/// A virtual display, its encoder pipeline, input target and sink slot.
pub struct DisplaySession {
    display_id: DisplayId,
    size: DisplaySize,
    display: Box<dyn VirtualDisplay>,
    pipeline: EncoderPipeline,
    input: Option<Arc<InputController>>,
    sink: Arc<SinkRegistry>,
    released: AtomicBool,
}

impl DisplaySession {
    pub(crate) fn new(
        display_id: DisplayId,
        size: DisplaySize,
        display: Box<dyn VirtualDisplay>,
        pipeline: EncoderPipeline,
        input: Option<Arc<InputController>>,
    ) -> Self {
        Self {
            display_id,
            size,
            display,
            pipeline,
            input,
            sink: Arc::new(SinkRegistry::new(display_id)),
            released: AtomicBool::new(false),
        }
    }

    pub fn display_id(&self) -> DisplayId {
        self.display_id
    }

    /// Aligned size the encoder was configured with.
    pub fn size(&self) -> DisplaySize {
        self.size
    }

    pub fn input(&self) -> Option<&Arc<InputController>> {
        self.input.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.is_running()
    }

    /// Start the capture thread. Codec config is kept by the sink slot for
    /// later sinks; media chunks go to whichever sink is current.
    pub(crate) fn start(&self) -> Result<(), VdispError> {
        let config_sink = self.sink.clone();
        let media_sink = self.sink.clone();
        self.pipeline.start_capture(
            Box::new(move |blobs| config_sink.set_codec_config(blobs)),
            Box::new(move |frame| {
                media_sink.deliver(frame);
            }),
        )
    }

    // ── Sink ─────────────────────────────────────────────────────

    pub fn set_video_sink(&self, sink: Option<Arc<dyn VideoSink>>) {
        self.sink.set(sink);
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_attached()
    }

    /// Forward one encoded chunk to the attached sink, if any.
    pub fn send_video_frame(&self, frame: Bytes) -> bool {
        self.sink.deliver(frame)
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Tear everything down. Safe to call more than once; only the first
    /// call does any work.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let display_id = self.display_id;

        self.pipeline.shutdown();

        if let Err(e) = self.display.release() {
            warn!(display_id, "virtual display release failed: {e}");
        }
        if let Some(input) = &self.input {
            input.reset_target();
        }
        self.sink.set(None);

        info!(display_id, "display session released");
    }
}

impl Drop for DisplaySession {
    fn drop(&mut self) {
        self.release();
    }
}
