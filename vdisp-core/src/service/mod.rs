//! Call-facing service layer: activity tracking, idle shutdown and the
//! facade the transport dispatches into.

pub mod activity;
pub mod facade;
pub mod watchdog;

pub use activity::ActivityClock;
pub use facade::DisplayService;
pub use watchdog::{DEFAULT_IDLE_TIMEOUT, DEFAULT_POLL_INTERVAL, IdleHook, IdleWatchdog, SinkProbe};
