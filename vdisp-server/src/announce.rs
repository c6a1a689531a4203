//! One-shot bootstrap announcement.
//!
//! At startup the server tells each configured target where its call
//! service listens. Each target gets a single attempt; failures are logged
//! and never retried.

use std::time::Duration;

use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_util::codec::FramedWrite;
use tracing::{info, warn};

use vdisp_core::{Announcement, VdispError, WireCodec};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Announce `service_addr` to every target. Returns how many succeeded.
pub async fn announce_all(targets: &[String], service_addr: &str) -> usize {
    let mut delivered = 0;
    for target in targets {
        match announce_one(target, service_addr).await {
            Ok(()) => {
                info!("announced service to {target}");
                delivered += 1;
            }
            Err(e) => warn!("announcement to {target} failed: {e}"),
        }
    }
    delivered
}

async fn announce_one(target: &str, service_addr: &str) -> Result<(), VdispError> {
    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(target))
        .await
        .map_err(|_| VdispError::Timeout(CONNECT_TIMEOUT))??;

    let mut writer = FramedWrite::new(stream, WireCodec);
    writer
        .send(Announcement::new(service_addr).into_packet()?)
        .await?;
    writer.close().await?;
    Ok(())
}
