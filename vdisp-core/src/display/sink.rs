//! Per-display video sink registry.
//!
//! A [`SinkRegistry`] holds at most one remote [`VideoSink`] for a display.
//! While a sink is attached the registry watches its liveness; when the
//! remote side dies the sink is cleared automatically so frames stop being
//! produced for nobody.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::display::types::DisplayId;
use crate::error::VdispError;

/// Invoked at most once when the remote endpoint behind a sink dies.
pub type DeathCallback = Box<dyn FnOnce() + Send + 'static>;

/// Opaque handle returned by [`VideoSink::watch_liveness`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LivenessToken(pub u64);

/// A remote consumer of encoded video.
pub trait VideoSink: Send + Sync {
    /// One-way delivery of a single encoded chunk. Called with the
    /// display's sink slot locked; must not block or re-enter the registry.
    fn on_video_frame(&self, frame: Bytes) -> Result<(), VdispError>;

    /// Register `on_death` to run when the remote endpoint goes away.
    ///
    /// Implementations must not invoke the callback from inside this call;
    /// an already dead endpoint returns [`VdispError::RemoteDead`] instead.
    fn watch_liveness(&self, on_death: DeathCallback) -> Result<LivenessToken, VdispError>;

    /// Drop a registration. Unknown tokens are ignored.
    fn unwatch_liveness(&self, token: LivenessToken);
}

/// Identity of a sink handle: the address of the shared object.
fn same_sink(a: &Arc<dyn VideoSink>, b: &Arc<dyn VideoSink>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

// ── SinkRegistry ─────────────────────────────────────────────────

struct Attached {
    sink: Arc<dyn VideoSink>,
    token: Option<LivenessToken>,
}

#[derive(Default)]
struct SinkState {
    current: Option<Attached>,
    /// Codec config from the latest format change, replayed to each newly
    /// attached sink before it sees any media.
    codec_config: Vec<Bytes>,
}

impl SinkState {
    /// Push one chunk to the current sink. A failure detaches it.
    fn push(&mut self, display_id: DisplayId, frame: Bytes) -> bool {
        let Some(cur) = self.current.as_ref() else {
            return false;
        };
        match cur.sink.on_video_frame(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!(display_id, "video delivery failed, dropping sink: {e}");
                self.detach();
                false
            }
        }
    }

    fn detach(&mut self) {
        if let Some(prev) = self.current.take() {
            if let Some(token) = prev.token {
                prev.sink.unwatch_liveness(token);
            }
        }
    }
}

/// Single-slot sink holder for one display.
///
/// Deliveries happen under the slot lock, so a sink never observes media
/// from before its codec config replay.
pub struct SinkRegistry {
    display_id: DisplayId,
    state: Arc<Mutex<SinkState>>,
}

impl SinkRegistry {
    pub fn new(display_id: DisplayId) -> Self {
        Self {
            display_id,
            state: Arc::new(Mutex::new(SinkState::default())),
        }
    }

    /// Replace the current sink, or clear it with `None`.
    ///
    /// Re-attaching the handle that is already current is a no-op. A
    /// previous different sink has its liveness watch dropped before the
    /// new one is registered. A new sink first receives the stored codec
    /// config.
    pub fn set(&self, sink: Option<Arc<dyn VideoSink>>) {
        let display_id = self.display_id;
        let mut state = self.state.lock();

        if let (Some(cur), Some(new)) = (state.current.as_ref(), sink.as_ref()) {
            if same_sink(&cur.sink, new) {
                return;
            }
        }

        state.detach();

        let Some(sink) = sink else {
            debug!(display_id, "video sink cleared");
            return;
        };

        let weak = Arc::downgrade(&self.state);
        let watched = Arc::downgrade(&sink);
        let on_death: DeathCallback =
            Box::new(move || clear_if_current(&weak, &watched, display_id));

        let token = match sink.watch_liveness(on_death) {
            Ok(token) => Some(token),
            Err(e) => {
                // Frames are still attempted; the first failed delivery
                // clears the slot.
                warn!(display_id, "failed to watch sink liveness: {e}");
                None
            }
        };
        debug!(display_id, "video sink attached");
        state.current = Some(Attached { sink, token });

        let replay = state.codec_config.clone();
        for blob in replay {
            if !state.push(display_id, blob) {
                break;
            }
        }
    }

    /// Store the codec config of a format change and forward it to the
    /// current sink, if any. Empty blobs are dropped.
    pub fn set_codec_config(&self, blobs: Vec<Bytes>) {
        let display_id = self.display_id;
        let blobs: Vec<Bytes> = blobs.into_iter().filter(|b| !b.is_empty()).collect();
        let mut state = self.state.lock();
        state.codec_config = blobs.clone();
        for blob in blobs {
            if !state.push(display_id, blob) {
                break;
            }
        }
    }

    /// The current sink, if any.
    pub fn get(&self) -> Option<Arc<dyn VideoSink>> {
        self.state.lock().current.as_ref().map(|a| a.sink.clone())
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().current.is_some()
    }

    /// Deliver one media chunk to the current sink.
    ///
    /// Returns `false` when no sink is attached or the delivery failed; a
    /// failed delivery clears the slot.
    pub fn deliver(&self, frame: Bytes) -> bool {
        self.state.lock().push(self.display_id, frame)
    }
}

fn clear_if_current(
    state: &Weak<Mutex<SinkState>>,
    sink: &Weak<dyn VideoSink>,
    display_id: DisplayId,
) {
    let (Some(state), Some(sink)) = (state.upgrade(), sink.upgrade()) else {
        return;
    };
    let mut state = state.lock();
    if state
        .current
        .as_ref()
        .is_some_and(|cur| same_sink(&cur.sink, &sink))
    {
        state.current = None;
        debug!(display_id, "video sink died, cleared");
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Watch(u64),
        Unwatch(u64),
        Frame(usize),
    }

    #[derive(Default)]
    struct TestSink {
        events: Mutex<Vec<Event>>,
        callbacks: Mutex<Vec<(u64, DeathCallback)>>,
        next: AtomicU64,
        fail: AtomicBool,
        dead: AtomicBool,
    }

    impl TestSink {
        fn kill(&self) {
            self.dead.store(true, Ordering::SeqCst);
            let callbacks: Vec<_> = self.callbacks.lock().drain(..).collect();
            for (_, cb) in callbacks {
                cb();
            }
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }
    }

    impl VideoSink for TestSink {
        fn on_video_frame(&self, frame: Bytes) -> Result<(), VdispError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(VdispError::Remote("broken pipe".into()));
            }
            self.events.lock().push(Event::Frame(frame.len()));
            Ok(())
        }

        fn watch_liveness(&self, on_death: DeathCallback) -> Result<LivenessToken, VdispError> {
            if self.dead.load(Ordering::SeqCst) {
                return Err(VdispError::RemoteDead);
            }
            let id = self.next.fetch_add(1, Ordering::SeqCst);
            self.events.lock().push(Event::Watch(id));
            self.callbacks.lock().push((id, on_death));
            Ok(LivenessToken(id))
        }

        fn unwatch_liveness(&self, token: LivenessToken) {
            self.events.lock().push(Event::Unwatch(token.0));
            self.callbacks.lock().retain(|(id, _)| *id != token.0);
        }
    }

    fn as_sink(s: &Arc<TestSink>) -> Arc<dyn VideoSink> {
        s.clone()
    }

    #[test]
    fn attach_and_deliver() {
        let reg = SinkRegistry::new(3);
        let a = Arc::new(TestSink::default());
        assert!(!reg.deliver(Bytes::from_static(b"x")));
        reg.set(Some(as_sink(&a)));
        assert!(reg.is_attached());
        assert!(reg.deliver(Bytes::from_static(b"abc")));
        assert_eq!(a.events(), vec![Event::Watch(0), Event::Frame(3)]);
    }

    #[test]
    fn replacing_sink_unwatches_old_first() {
        let reg = SinkRegistry::new(3);
        let a = Arc::new(TestSink::default());
        let b = Arc::new(TestSink::default());
        reg.set(Some(as_sink(&a)));
        reg.set(Some(as_sink(&b)));
        assert_eq!(a.events(), vec![Event::Watch(0), Event::Unwatch(0)]);
        assert_eq!(b.events(), vec![Event::Watch(0)]);
        assert!(same_sink(&reg.get().unwrap(), &as_sink(&b)));
    }

    #[test]
    fn same_handle_reattach_is_noop() {
        let reg = SinkRegistry::new(3);
        let a = Arc::new(TestSink::default());
        reg.set(Some(as_sink(&a)));
        reg.set(Some(as_sink(&a)));
        assert_eq!(a.events(), vec![Event::Watch(0)]);
        assert!(reg.is_attached());
    }

    #[test]
    fn clearing_unwatches() {
        let reg = SinkRegistry::new(3);
        let a = Arc::new(TestSink::default());
        reg.set(Some(as_sink(&a)));
        reg.set(None);
        assert!(!reg.is_attached());
        assert_eq!(a.events(), vec![Event::Watch(0), Event::Unwatch(0)]);
    }

    #[test]
    fn death_clears_current_sink() {
        let reg = SinkRegistry::new(3);
        let a = Arc::new(TestSink::default());
        reg.set(Some(as_sink(&a)));
        a.kill();
        assert!(!reg.is_attached());
    }

    #[test]
    fn stale_death_does_not_clear_replacement() {
        let reg = SinkRegistry::new(3);
        let a = Arc::new(TestSink::default());
        let b = Arc::new(TestSink::default());
        reg.set(Some(as_sink(&a)));
        // Capture A's callback before it is unwatched.
        let (_, cb) = a.callbacks.lock().pop().unwrap();
        reg.set(Some(as_sink(&b)));
        cb();
        assert!(same_sink(&reg.get().unwrap(), &as_sink(&b)));
    }

    #[test]
    fn failed_delivery_clears_sink() {
        let reg = SinkRegistry::new(3);
        let a = Arc::new(TestSink::default());
        reg.set(Some(as_sink(&a)));
        a.fail.store(true, Ordering::SeqCst);
        assert!(!reg.deliver(Bytes::from_static(b"abc")));
        assert!(!reg.is_attached());
        assert_eq!(a.events(), vec![Event::Watch(0), Event::Unwatch(0)]);
    }

    #[test]
    fn late_sink_gets_codec_config_before_media() {
        let reg = SinkRegistry::new(3);
        reg.set_codec_config(vec![
            Bytes::from_static(b"sps"),
            Bytes::new(),
            Bytes::from_static(b"pps!"),
        ]);
        assert!(!reg.deliver(Bytes::from_static(b"lost")));

        let a = Arc::new(TestSink::default());
        reg.set(Some(as_sink(&a)));
        assert!(reg.deliver(Bytes::from_static(b"frame")));
        assert_eq!(
            a.events(),
            vec![Event::Watch(0), Event::Frame(3), Event::Frame(4), Event::Frame(5)]
        );
    }

    #[test]
    fn format_change_replaces_stored_config() {
        let reg = SinkRegistry::new(3);
        let a = Arc::new(TestSink::default());
        reg.set(Some(as_sink(&a)));
        reg.set_codec_config(vec![Bytes::from_static(b"old")]);
        reg.set_codec_config(vec![Bytes::from_static(b"newer")]);

        let b = Arc::new(TestSink::default());
        reg.set(Some(as_sink(&b)));
        assert_eq!(a.events(), vec![
            Event::Watch(0),
            Event::Frame(3),
            Event::Frame(5),
            Event::Unwatch(0),
        ]);
        assert_eq!(b.events(), vec![Event::Watch(0), Event::Frame(5)]);
    }

    #[test]
    fn failed_replay_detaches_new_sink() {
        let reg = SinkRegistry::new(3);
        reg.set_codec_config(vec![Bytes::from_static(b"sps")]);
        let a = Arc::new(TestSink::default());
        a.fail.store(true, Ordering::SeqCst);
        reg.set(Some(as_sink(&a)));
        assert!(!reg.is_attached());
        assert_eq!(a.events(), vec![Event::Watch(0), Event::Unwatch(0)]);
    }

    #[test]
    fn dead_sink_still_attaches_without_watch() {
        let reg = SinkRegistry::new(3);
        let a = Arc::new(TestSink::default());
        a.dead.store(true, Ordering::SeqCst);
        reg.set(Some(as_sink(&a)));
        assert!(reg.is_attached());
        a.fail.store(true, Ordering::SeqCst);
        reg.deliver(Bytes::from_static(b"z"));
        assert!(!reg.is_attached());
    }
}
