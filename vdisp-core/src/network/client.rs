//! Client side of the call protocol.
//!
//! [`ServiceClient`] multiplexes calls over one connection by request id.
//! Video frames streamed to the connection arrive on the receiver returned
//! from [`ServiceClient::connect`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{Framed, FramedRead};
use tracing::{debug, warn};

use crate::codec::WireCodec;
use crate::display::types::DisplayId;
use crate::error::VdispError;
use crate::message::MessageKind;
use crate::packet::Packet;
use crate::protocol::call::{Announcement, Call, Reply};
use crate::protocol::input::TouchEventSpec;

/// Default upper bound on waiting for a reply.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

const FRAME_QUEUE_DEPTH: usize = 1024;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Reply, VdispError>>>>>;

pub struct ServiceClient {
    outbound: mpsc::Sender<Packet>,
    pending: PendingMap,
    next_id: AtomicU64,
    call_timeout: Duration,
}

impl ServiceClient {
    /// Connect and start the reader/writer tasks. The receiver yields every
    /// video frame streamed to this connection, in order.
    pub async fn connect(
        addr: impl ToSocketAddrs,
    ) -> Result<(Self, mpsc::Receiver<Bytes>), VdispError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (mut net_writer, mut net_reader) = Framed::new(stream, WireCodec).split();

        let (out_tx, mut out_rx) = mpsc::channel::<Packet>(64);
        let (frame_tx, frame_rx) = mpsc::channel::<Bytes>(FRAME_QUEUE_DEPTH);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            while let Some(packet) = out_rx.recv().await {
                if let Err(e) = net_writer.send(packet).await {
                    debug!("client write error: {e}");
                    break;
                }
            }
            // Client dropped: half-close so the server sees end of stream.
            let _ = net_writer.close().await;
        });

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            while let Some(item) = net_reader.next().await {
                let packet = match item {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("client read error: {e}");
                        break;
                    }
                };
                match packet.kind() {
                    MessageKind::VideoFrame => {
                        // A dropped receiver just discards frames.
                        let _ = frame_tx.send(packet.into_payload()).await;
                    }
                    MessageKind::Reply => {
                        let result = Reply::from_bytes(packet.payload());
                        complete(&reader_pending, packet.request_id(), result);
                    }
                    MessageKind::Error => {
                        let message = String::from_utf8_lossy(packet.payload()).into_owned();
                        complete(
                            &reader_pending,
                            packet.request_id(),
                            Err(VdispError::RequestFailed(message)),
                        );
                    }
                    other => debug!(kind = %other, "client ignoring packet"),
                }
            }
            // Dropping the senders fails every outstanding call.
            reader_pending.lock().clear();
        });

        Ok((
            Self {
                outbound: out_tx,
                pending,
                next_id: AtomicU64::new(1),
                call_timeout: DEFAULT_CALL_TIMEOUT,
            },
            frame_rx,
        ))
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Send a call and wait for its reply.
    pub async fn call(&self, call: Call) -> Result<Reply, VdispError> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id, tx);

        let packet = match call.into_packet(request_id) {
            Ok(packet) => packet,
            Err(e) => {
                self.pending.lock().remove(&request_id);
                return Err(e);
            }
        };
        if let Err(e) = self.outbound.send(packet).await {
            self.pending.lock().remove(&request_id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(VdispError::ChannelClosed),
            Err(_) => {
                self.pending.lock().remove(&request_id);
                Err(VdispError::Timeout(self.call_timeout))
            }
        }
    }

    async fn call_unit(&self, call: Call) -> Result<(), VdispError> {
        match self.call(call).await? {
            Reply::Unit => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    // ── Typed helpers ────────────────────────────────────────────

    pub async fn ensure_display(
        &self,
        width: i32,
        height: i32,
        dpi: i32,
        bitrate_kbps: i32,
    ) -> Result<DisplayId, VdispError> {
        let call = Call::EnsureDisplay {
            width,
            height,
            dpi,
            bitrate_kbps,
        };
        match self.call(call).await? {
            Reply::DisplayId(id) => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    pub async fn destroy_display(&self, display_id: DisplayId) -> Result<(), VdispError> {
        self.call_unit(Call::DestroyDisplay { display_id }).await
    }

    pub async fn launch_app(&self, package: &str, display_id: DisplayId) -> Result<(), VdispError> {
        self.call_unit(Call::LaunchApp {
            package: package.to_string(),
            display_id,
        })
        .await
    }

    pub async fn tap(&self, display_id: DisplayId, x: f32, y: f32) -> Result<(), VdispError> {
        self.call_unit(Call::Tap { display_id, x, y }).await
    }

    pub async fn swipe(
        &self,
        display_id: DisplayId,
        from: (f32, f32),
        to: (f32, f32),
        duration_ms: i64,
    ) -> Result<(), VdispError> {
        self.call_unit(Call::Swipe {
            display_id,
            x1: from.0,
            y1: from.1,
            x2: to.0,
            y2: to.1,
            duration_ms,
        })
        .await
    }

    pub async fn touch_down(&self, display_id: DisplayId, x: f32, y: f32) -> Result<(), VdispError> {
        self.call_unit(Call::TouchDown { display_id, x, y }).await
    }

    pub async fn touch_move(&self, display_id: DisplayId, x: f32, y: f32) -> Result<(), VdispError> {
        self.call_unit(Call::TouchMove { display_id, x, y }).await
    }

    pub async fn touch_up(&self, display_id: DisplayId, x: f32, y: f32) -> Result<(), VdispError> {
        self.call_unit(Call::TouchUp { display_id, x, y }).await
    }

    pub async fn inject_touch_event(
        &self,
        display_id: DisplayId,
        event: TouchEventSpec,
    ) -> Result<(), VdispError> {
        self.call_unit(Call::InjectTouchEvent { display_id, event })
            .await
    }

    pub async fn inject_key(&self, display_id: DisplayId, key_code: i32) -> Result<(), VdispError> {
        self.call_unit(Call::InjectKey {
            display_id,
            key_code,
        })
        .await
    }

    pub async fn inject_key_with_meta(
        &self,
        display_id: DisplayId,
        key_code: i32,
        meta_state: i32,
    ) -> Result<(), VdispError> {
        self.call_unit(Call::InjectKeyWithMeta {
            display_id,
            key_code,
            meta_state,
        })
        .await
    }

    pub async fn request_screenshot(
        &self,
        display_id: DisplayId,
    ) -> Result<Option<Vec<u8>>, VdispError> {
        match self.call(Call::RequestScreenshot { display_id }).await? {
            Reply::Screenshot(png) => Ok(png),
            other => Err(unexpected(other)),
        }
    }

    /// Make this connection the sink of `display_id`, or detach it.
    pub async fn set_video_sink(&self, display_id: DisplayId, attach: bool) -> Result<(), VdispError> {
        self.call_unit(Call::SetVideoSink { display_id, attach })
            .await
    }
}

fn complete(pending: &PendingMap, request_id: u64, result: Result<Reply, VdispError>) {
    match pending.lock().remove(&request_id) {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => debug!(request_id, "reply for unknown request"),
    }
}

fn unexpected(reply: Reply) -> VdispError {
    VdispError::Other(format!("unexpected reply: {reply:?}"))
}

/// Read the single announcement a bootstrap target receives.
pub async fn read_announcement(stream: TcpStream) -> Result<Announcement, VdispError> {
    let mut reader = FramedRead::new(stream, WireCodec);
    loop {
        match reader.next().await {
            Some(Ok(packet)) if packet.kind() == MessageKind::Announce => {
                return Announcement::from_bytes(packet.payload());
            }
            Some(Ok(packet)) => debug!(kind = %packet.kind(), "skipping packet"),
            Some(Err(e)) => return Err(e),
            None => return Err(VdispError::ChannelClosed),
        }
    }
}
