//! Server runtime wiring.
//!
//! Builds the session manager, facade, call listener and idle watchdog from
//! a [`ServerConfig`], announces the service, and runs until stopped by
//! Ctrl-C or by the watchdog.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use vdisp_core::service::SinkProbe;
use vdisp_core::{
    ActivityClock, DisplayPlatform, DisplayService, IdleWatchdog, ServiceListener, SessionManager,
};

use crate::announce::announce_all;
use crate::config::ServerConfig;
use crate::shell::ShellPlatform;

// ── VdispServer ──────────────────────────────────────────────────

pub struct VdispServer {
    config: ServerConfig,
    running: Arc<AtomicBool>,
}

impl VdispServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the server from another
    /// task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run on the shell-backed platform until stopped.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        // Probing the platform shells out.
        let platform = tokio::task::spawn_blocking(ShellPlatform::new).await?;
        self.run_with_platform(Arc::new(platform)).await
    }

    /// Run until stopped.
    ///
    /// 1. Binds the call listener.
    /// 2. Announces the listen address to every configured target.
    /// 3. Starts the idle watchdog; going idle stops the server.
    /// 4. Serves calls until `running` becomes `false`.
    /// 5. Releases every display on the blocking pool.
    pub async fn run_with_platform(
        &self,
        platform: Arc<dyn DisplayPlatform>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.running.store(true, Ordering::SeqCst);

        let manager = Arc::new(SessionManager::new(platform, self.config.stream_settings()));
        let clock = Arc::new(ActivityClock::new());
        let service = Arc::new(DisplayService::new(manager.clone(), clock.clone()));

        let listener = ServiceListener::bind(self.config.network.listen_addr.as_str(), service)
            .await?
            .with_queue_depth(self.config.network.callback_queue_depth);
        let addr: SocketAddr = listener.local_addr()?;

        let targets = self.config.announce_targets();
        if !targets.is_empty() {
            let service_addr = addr.to_string();
            tokio::spawn(async move {
                let delivered = announce_all(&targets, &service_addr).await;
                info!("announced to {delivered}/{} targets", targets.len());
            });
        }

        let probe_manager = manager.clone();
        let probe: SinkProbe = Arc::new(move || probe_manager.any_sink_attached());
        let idle_stop = self.stop_handle();
        let watchdog = IdleWatchdog::new(clock, probe)
            .with_idle_timeout(self.config.idle_timeout())
            .with_poll_interval(self.config.poll_interval())
            .spawn(Box::new(move || {
                idle_stop.store(false, Ordering::SeqCst);
            }));

        listener.run(self.stop_handle()).await?;

        watchdog.abort();
        let remaining = manager.len();
        // Teardown joins capture threads.
        tokio::task::spawn_blocking(move || manager.shutdown()).await?;
        self.running.store(false, Ordering::SeqCst);
        info!("vdisp server stopped ({remaining} displays released)");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
