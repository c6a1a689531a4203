//! vdisp server — entry point.
//!
//! ```text
//! vdisp-server                       Run in the foreground
//! vdisp-server <host:port,...>       Announce to these targets instead of the configured ones
//! vdisp-server --listen <addr>       Override the call listener address
//! vdisp-server --config <path>       Load a custom config TOML
//! vdisp-server --gen-config          Write the default config to the --config path
//! ```

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vdisp_server::config::ServerConfig;
use vdisp_server::service::VdispServer;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vdisp-server", about = "Virtual display streaming service")]
struct Cli {
    /// Comma-separated `host:port` announcement targets.
    targets: Option<String>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "vdisp-server.toml")]
    config: PathBuf,

    /// Address the call listener binds to.
    #[arg(short, long)]
    listen: Option<String>,

    /// Write the default configuration to the --config path and exit.
    #[arg(long)]
    gen_config: bool,
}

fn open_log_file(path: &str) -> Option<File> {
    if path.is_empty() {
        return None;
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("cannot open log file {path}: {e}; logging to stderr");
            None
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        ServerConfig::write_default(&cli.config)?;
        println!("Wrote default config to {}", cli.config.display());
        return Ok(());
    }

    let mut config = ServerConfig::load(&cli.config);
    if let Some(targets) = cli.targets {
        config.announce.targets = targets;
    }
    if let Some(listen) = cli.listen {
        config.network.listen_addr = listen;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match open_log_file(&config.logging.file) {
        Some(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
        None => builder.init(),
    }

    info!("vdisp-server v{}", env!("CARGO_PKG_VERSION"));
    info!("listen: {}", config.network.listen_addr);
    info!("idle timeout: {:?}", config.idle_timeout());
    info!("announce targets: {:?}", config.announce_targets());

    let server = VdispServer::new(config);
    let stop = server.stop_handle();

    // Ctrl-C handler.
    let stop_clone = stop.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop_clone.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    server.run().await?;

    Ok(())
}
