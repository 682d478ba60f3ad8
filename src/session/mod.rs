//! Network sessions
//!
//! This module handles:
//! - Accepting controller connections
//! - Framing, decoding and acknowledging commands per connection
//! - Keeping per-message errors local to their session

mod connection;
mod listener;

pub use connection::{CommandSession, SessionStats};
pub use listener::serve;
