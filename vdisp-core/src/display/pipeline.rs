//! Encoder capture loop.
//!
//! Each display owns one [`EncoderPipeline`]: a dedicated thread that polls
//! the hardware encoder and forwards every encoded chunk, in order, to a
//! frame callback. Stopping is cooperative through a shared `running` flag
//! plus end-of-input, with a bounded wait on the thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::display::platform::{RenderSurface, VideoEncoder};
use crate::display::types::{
    CAPTURE_JOIN_TIMEOUT, DisplayId, EncoderOutput, OUTPUT_POLL_TIMEOUT,
};
use crate::error::VdispError;

/// Receives each encoded media chunk produced by the loop.
pub type FrameCallback = Box<dyn Fn(Bytes) + Send + 'static>;

/// Receives the non-empty codec configuration blobs after every format
/// change.
pub type ConfigCallback = Box<dyn Fn(Vec<Bytes>) + Send + 'static>;

struct Worker {
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

/// Encoder + input surface + capture thread for one display.
pub struct EncoderPipeline {
    display_id: DisplayId,
    encoder: Arc<dyn VideoEncoder>,
    surface: Arc<dyn RenderSurface>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<Worker>>,
}

impl EncoderPipeline {
    /// Wrap an already started encoder and its surface. No thread runs
    /// until [`start_capture`](Self::start_capture).
    pub fn new(
        display_id: DisplayId,
        encoder: Arc<dyn VideoEncoder>,
        surface: Arc<dyn RenderSurface>,
    ) -> Self {
        Self {
            display_id,
            encoder,
            surface,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawn the capture thread. Calling it again while running is a no-op.
    pub fn start_capture(
        &self,
        on_config: ConfigCallback,
        on_frame: FrameCallback,
    ) -> Result<(), VdispError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        self.running.store(true, Ordering::Release);
        let (done_tx, done_rx) = bounded::<()>(1);
        let encoder = self.encoder.clone();
        let running = self.running.clone();
        let display_id = self.display_id;

        let spawned = std::thread::Builder::new()
            .name(format!("vdisp-encoder-{display_id}"))
            .spawn(move || {
                capture_loop(display_id, encoder.as_ref(), &running, &on_config, &on_frame);
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(Worker {
                    handle,
                    done: done_rx,
                });
                info!(display_id, "capture loop started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(VdispError::acquisition("capture thread", e))
            }
        }
    }

    /// Stop the loop and release encoder and surface.
    ///
    /// Each step is attempted even if an earlier one failed. Waits at most
    /// [`CAPTURE_JOIN_TIMEOUT`] for the thread.
    pub fn shutdown(&self) {
        let display_id = self.display_id;
        self.running.store(false, Ordering::Release);

        if let Err(e) = self.encoder.signal_end_of_input() {
            debug!(display_id, "signal end of input: {e}");
        }

        if let Some(worker) = self.worker.lock().take() {
            match worker.done.recv_timeout(CAPTURE_JOIN_TIMEOUT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.handle.join().is_err() {
                        warn!(display_id, "capture thread panicked");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        display_id,
                        "capture thread did not exit within {:?}, detaching",
                        CAPTURE_JOIN_TIMEOUT
                    );
                }
            }
        }

        if let Err(e) = self.encoder.stop() {
            warn!(display_id, "encoder stop failed: {e}");
        }
        if let Err(e) = self.encoder.release() {
            warn!(display_id, "encoder release failed: {e}");
        }
        if let Err(e) = self.surface.release() {
            warn!(display_id, "surface release failed: {e}");
        }
    }
}

// ── Capture loop ─────────────────────────────────────────────────

fn capture_loop(
    display_id: DisplayId,
    encoder: &dyn VideoEncoder,
    running: &AtomicBool,
    on_config: &ConfigCallback,
    on_frame: &FrameCallback,
) {
    let mut frames: u64 = 0;

    while running.load(Ordering::Acquire) {
        let output = match encoder.dequeue_output(OUTPUT_POLL_TIMEOUT) {
            Ok(output) => output,
            Err(VdispError::EncoderState(reason)) => {
                debug!(display_id, "encoder no longer executing: {reason}");
                break;
            }
            Err(e) => {
                warn!(display_id, "dequeue failed, ending capture: {e}");
                break;
            }
        };

        match output {
            EncoderOutput::TryAgainLater => continue,
            EncoderOutput::FormatChanged => match encoder.codec_config() {
                Ok(blobs) => {
                    let blobs: Vec<Bytes> = blobs.into_iter().filter(|b| !b.is_empty()).collect();
                    if !blobs.is_empty() && running.load(Ordering::Acquire) {
                        on_config(blobs);
                    }
                }
                Err(e) => warn!(display_id, "codec config unavailable: {e}"),
            },
            EncoderOutput::Buffer { index, info } => {
                if info.size > 0 {
                    let chunk = encoder.output_buffer(index).and_then(|buf| {
                        let end = info.offset.checked_add(info.size)?;
                        (end <= buf.len())
                            .then(|| Bytes::copy_from_slice(&buf[info.offset..end]))
                    });
                    match chunk {
                        Some(chunk) if running.load(Ordering::Acquire) => {
                            frames += 1;
                            on_frame(chunk);
                        }
                        Some(_) => {}
                        None => warn!(display_id, index, "output buffer out of range"),
                    }
                }
                if let Err(e) = encoder.release_output_buffer(index) {
                    debug!(display_id, index, "release output buffer: {e}");
                }
                if info.is_end_of_stream() {
                    debug!(display_id, "end of stream");
                    break;
                }
            }
        }
    }

    info!(display_id, frames, "capture loop exited");
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::types::BufferInfo;
    use crate::flags::BufferFlags;
    use std::collections::VecDeque;
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedEncoder {
        script: Mutex<VecDeque<Result<EncoderOutput, VdispError>>>,
        buffers: Mutex<Vec<Bytes>>,
        config: Vec<Bytes>,
        released: Mutex<Vec<usize>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedEncoder {
        fn with_buffer(self, data: &'static [u8], flags: BufferFlags) -> Self {
            let index = {
                let mut buffers = self.buffers.lock();
                buffers.push(Bytes::from_static(data));
                buffers.len() - 1
            };
            self.script.lock().push_back(Ok(EncoderOutput::Buffer {
                index,
                info: BufferInfo {
                    offset: 0,
                    size: data.len(),
                    presentation_time_us: 0,
                    flags,
                },
            }));
            self
        }

        fn then(self, item: Result<EncoderOutput, VdispError>) -> Self {
            self.script.lock().push_back(item);
            self
        }
    }

    impl VideoEncoder for ScriptedEncoder {
        fn create_input_surface(&self) -> Result<Arc<dyn RenderSurface>, VdispError> {
            Ok(Arc::new(NullSurface))
        }
        fn start(&self) -> Result<(), VdispError> {
            Ok(())
        }
        fn dequeue_output(&self, timeout: Duration) -> Result<EncoderOutput, VdispError> {
            if let Some(item) = self.script.lock().pop_front() {
                return item;
            }
            std::thread::sleep(timeout);
            Ok(EncoderOutput::TryAgainLater)
        }
        fn codec_config(&self) -> Result<Vec<Bytes>, VdispError> {
            Ok(self.config.clone())
        }
        fn output_buffer(&self, index: usize) -> Option<Bytes> {
            self.buffers.lock().get(index).cloned()
        }
        fn release_output_buffer(&self, index: usize) -> Result<(), VdispError> {
            self.released.lock().push(index);
            Ok(())
        }
        fn signal_end_of_input(&self) -> Result<(), VdispError> {
            self.calls.lock().push("eos");
            Ok(())
        }
        fn stop(&self) -> Result<(), VdispError> {
            self.calls.lock().push("stop");
            Ok(())
        }
        fn release(&self) -> Result<(), VdispError> {
            self.calls.lock().push("release");
            Err(VdispError::Encoder("already released".into()))
        }
    }

    struct NullSurface;

    impl RenderSurface for NullSurface {
        fn release(&self) -> Result<(), VdispError> {
            Ok(())
        }
    }

    /// Config blobs and media chunks funnelled into one ordered channel.
    fn collect() -> (ConfigCallback, FrameCallback, crossbeam_channel::Receiver<Bytes>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let config_tx = tx.clone();
        let on_config: ConfigCallback = Box::new(move |blobs| {
            for b in blobs {
                let _ = config_tx.send(b);
            }
        });
        let on_frame: FrameCallback = Box::new(move |b| {
            let _ = tx.send(b);
        });
        (on_config, on_frame, rx)
    }

    fn pipeline(enc: Arc<ScriptedEncoder>) -> EncoderPipeline {
        EncoderPipeline::new(5, enc, Arc::new(NullSurface))
    }

    #[test]
    fn config_blobs_precede_media_and_empty_blobs_skip() {
        let enc = ScriptedEncoder {
            config: vec![
                Bytes::from_static(b"sps"),
                Bytes::new(),
                Bytes::from_static(b"pps"),
            ],
            ..Default::default()
        }
        .then(Ok(EncoderOutput::TryAgainLater))
        .then(Ok(EncoderOutput::FormatChanged))
        .with_buffer(b"frame-1", BufferFlags::KEY_FRAME)
        .with_buffer(b"frame-2", BufferFlags::empty());
        let enc = Arc::new(enc);
        let p = pipeline(enc.clone());
        let (on_config, on_frame, rx) = collect();
        p.start_capture(on_config, on_frame).unwrap();

        let got: Vec<Bytes> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(got, vec![
            Bytes::from_static(b"sps"),
            Bytes::from_static(b"pps"),
            Bytes::from_static(b"frame-1"),
            Bytes::from_static(b"frame-2"),
        ]);
        p.shutdown();
        assert_eq!(*enc.released.lock(), vec![0, 1]);
    }

    #[test]
    fn empty_buffer_is_released_but_not_forwarded() {
        let enc = Arc::new(
            ScriptedEncoder::default()
                .with_buffer(b"", BufferFlags::empty())
                .with_buffer(b"data", BufferFlags::END_OF_STREAM),
        );
        let p = pipeline(enc.clone());
        let (on_config, on_frame, rx) = collect();
        p.start_capture(on_config, on_frame).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            Bytes::from_static(b"data")
        );
        p.shutdown();
        assert_eq!(*enc.released.lock(), vec![0, 1]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn illegal_state_ends_loop() {
        let enc = Arc::new(
            ScriptedEncoder::default()
                .then(Err(VdispError::EncoderState("released".into())))
                .with_buffer(b"never", BufferFlags::empty()),
        );
        let p = pipeline(enc.clone());
        let (on_config, on_frame, rx) = collect();
        p.start_capture(on_config, on_frame).unwrap();
        p.shutdown();
        assert!(rx.try_recv().is_err());
        assert!(enc.released.lock().is_empty());
    }

    #[test]
    fn shutdown_runs_every_step_in_order() {
        let enc = Arc::new(ScriptedEncoder::default());
        let p = pipeline(enc.clone());
        let (on_config, on_frame, _rx) = collect();
        p.start_capture(on_config, on_frame).unwrap();
        assert!(p.is_running());
        p.shutdown();
        assert!(!p.is_running());
        assert_eq!(*enc.calls.lock(), vec!["eos", "stop", "release"]);
    }

    #[test]
    fn shutdown_without_start_still_releases() {
        let enc = Arc::new(ScriptedEncoder::default());
        let p = pipeline(enc.clone());
        p.shutdown();
        assert_eq!(*enc.calls.lock(), vec!["eos", "stop", "release"]);
    }
}
