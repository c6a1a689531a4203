//! Localhost TCP transport for the call service.

pub mod client;
pub mod endpoint;
pub mod server;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub use client::{DEFAULT_CALL_TIMEOUT, ServiceClient, read_announcement};
pub use endpoint::RemoteEndpoint;
pub use server::{DEFAULT_QUEUE_DEPTH, ServiceListener};

/// Resolves when `running` becomes false.
pub(crate) async fn wait_for_stop(running: &Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
