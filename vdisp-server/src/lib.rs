//! # vdisp-server — Virtual Display Streaming Service
//!
//! Long-running process that serves display-management calls from local
//! clients over loopback TCP, streams each display's encoded video back to
//! the client that attached to it, and exits on its own once nobody has
//! used it for a while.
//!
//! ## Startup
//!
//! - Loads `ServerConfig` from TOML.
//! - Binds the call listener and announces its address to each configured
//!   bootstrap target.
//! - Starts the idle watchdog.

pub mod announce;
pub mod config;
pub mod service;
pub mod shell;
