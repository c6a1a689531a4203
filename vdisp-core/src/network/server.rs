//! TCP call listener.
//!
//! Each accepted connection becomes a [`RemoteEndpoint`]. Calls on a
//! connection are executed one at a time on the blocking pool, and their
//! replies share the connection's outbound queue with any video frames
//! streamed to it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::codec::WireCodec;
use crate::display::sink::VideoSink;
use crate::error::VdispError;
use crate::message::MessageKind;
use crate::network::endpoint::RemoteEndpoint;
use crate::network::wait_for_stop;
use crate::packet::Packet;
use crate::protocol::call::{Call, Reply, error_packet};
use crate::service::facade::DisplayService;

/// Outbound packets buffered per connection before frames start failing.
pub const DEFAULT_QUEUE_DEPTH: usize = 512;

pub struct ServiceListener {
    listener: TcpListener,
    service: Arc<DisplayService>,
    queue_depth: usize,
}

impl ServiceListener {
    pub async fn bind(
        addr: impl ToSocketAddrs,
        service: Arc<DisplayService>,
    ) -> Result<Self, VdispError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            service,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        })
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, VdispError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `running` turns false.
    pub async fn run(self, running: Arc<AtomicBool>) -> Result<(), VdispError> {
        info!("call service listening on {}", self.local_addr()?);

        loop {
            let accept = tokio::select! {
                result = self.listener.accept() => result,
                _ = wait_for_stop(&running) => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            info!("client connected from {peer}");
            let service = self.service.clone();
            let running = running.clone();
            let depth = self.queue_depth;
            tokio::spawn(async move {
                handle_connection(stream, peer, service, depth, running).await;
            });
        }

        info!("call service stopped");
        Ok(())
    }
}

// ── Per-connection ───────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    service: Arc<DisplayService>,
    queue_depth: usize,
    running: Arc<AtomicBool>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, "set_nodelay: {e}");
    }
    let (mut net_writer, mut net_reader) = Framed::new(stream, WireCodec).split();
    let (tx, mut rx) = mpsc::channel::<Packet>(queue_depth);
    let endpoint = Arc::new(RemoteEndpoint::new(peer, tx));

    let writer = tokio::spawn(async move {
        while let Some(packet) = rx.recv().await {
            if let Err(e) = net_writer.send(packet).await {
                debug!(%peer, "write error: {e}");
                break;
            }
        }
    });

    loop {
        let next = tokio::select! {
            item = net_reader.next() => item,
            _ = wait_for_stop(&running) => break,
        };

        let packet = match next {
            Some(Ok(packet)) => packet,
            Some(Err(e)) => {
                warn!(%peer, "read error: {e}");
                break;
            }
            None => break,
        };

        if packet.kind() != MessageKind::Call {
            debug!(%peer, kind = %packet.kind(), "ignoring non-call packet");
            continue;
        }

        let request_id = packet.request_id();
        let result = execute(&service, &endpoint, packet.payload()).await;
        let reply = match result {
            Ok(reply) => reply.into_packet(request_id),
            Err(e) => {
                debug!(%peer, request_id, "call failed: {e}");
                error_packet(request_id, &e)
            }
        };
        match reply {
            Ok(packet) => {
                if endpoint.send(packet).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(%peer, request_id, "failed to encode reply: {e}"),
        }
    }

    endpoint.mark_dead();
    writer.abort();
    info!("client {peer} disconnected");
}

async fn execute(
    service: &Arc<DisplayService>,
    endpoint: &Arc<RemoteEndpoint>,
    payload: &[u8],
) -> Result<Reply, VdispError> {
    let call = Call::from_bytes(payload)?;
    debug!(peer = %endpoint.peer(), call = call.name(), "dispatch");

    let service = service.clone();
    let caller: Arc<dyn VideoSink> = endpoint.clone();
    tokio::task::spawn_blocking(move || service.dispatch(call, caller))
        .await
        .map_err(|e| VdispError::Other(format!("call handler failed: {e}")))?
}
