//! Payload definitions carried inside [`Packet`] bodies.
//!
//! Payloads are serialized with `serde` + `bincode`. Video frames are the
//! exception: they travel as raw encoder output.
//!
//! [`Packet`]: crate::packet::Packet

pub mod call;
pub mod input;

pub use call::{Announcement, Call, Reply, error_packet};
pub use input::{InputEvent, KeyEvent, MotionEvent, TouchEventSpec};
