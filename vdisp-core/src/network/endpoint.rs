//! A connected client as seen by the server.
//!
//! A [`RemoteEndpoint`] is both the outbound half of a connection and the
//! sink handle a display streams into. When the connection ends the
//! endpoint is marked dead and every liveness watcher runs once.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::display::sink::{DeathCallback, LivenessToken, VideoSink};
use crate::error::VdispError;
use crate::packet::Packet;

struct Liveness {
    alive: bool,
    watchers: HashMap<u64, DeathCallback>,
}

pub struct RemoteEndpoint {
    peer: SocketAddr,
    outbound: mpsc::Sender<Packet>,
    liveness: Mutex<Liveness>,
    next_token: AtomicU64,
}

impl RemoteEndpoint {
    /// `outbound` feeds the connection's writer task.
    pub fn new(peer: SocketAddr, outbound: mpsc::Sender<Packet>) -> Self {
        Self {
            peer,
            outbound,
            liveness: Mutex::new(Liveness {
                alive: true,
                watchers: HashMap::new(),
            }),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.lock().alive
    }

    /// Queue a reply or error packet, waiting for room.
    pub async fn send(&self, packet: Packet) -> Result<(), VdispError> {
        self.outbound.send(packet).await?;
        Ok(())
    }

    /// Mark the endpoint dead and run every registered watcher. Only the
    /// first call has any effect.
    pub fn mark_dead(&self) {
        let watchers: Vec<DeathCallback> = {
            let mut liveness = self.liveness.lock();
            if !liveness.alive {
                return;
            }
            liveness.alive = false;
            liveness.watchers.drain().map(|(_, cb)| cb).collect()
        };
        debug!(peer = %self.peer, watchers = watchers.len(), "endpoint dead");
        for cb in watchers {
            cb();
        }
    }
}

impl VideoSink for RemoteEndpoint {
    fn on_video_frame(&self, frame: Bytes) -> Result<(), VdispError> {
        if !self.is_alive() {
            return Err(VdispError::RemoteDead);
        }
        let packet = Packet::video_frame(frame)?;
        self.outbound.try_send(packet).map_err(|e| match e {
            TrySendError::Full(_) => VdispError::Remote("callback queue full".into()),
            TrySendError::Closed(_) => VdispError::RemoteDead,
        })
    }

    fn watch_liveness(&self, on_death: DeathCallback) -> Result<LivenessToken, VdispError> {
        let mut liveness = self.liveness.lock();
        if !liveness.alive {
            return Err(VdispError::RemoteDead);
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        liveness.watchers.insert(token, on_death);
        Ok(LivenessToken(token))
    }

    fn unwatch_liveness(&self, token: LivenessToken) {
        self.liveness.lock().watchers.remove(&token.0);
    }
}
