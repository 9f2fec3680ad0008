//! # parley-state
//!
//! In-memory mirror of what the gateway has told us: the connected user,
//! servers with their members, roles and channels, private channels, and a
//! bounded history of recent messages.
//!
//! The store is a plain value. The client wraps it in a lock and mutates it
//! from the receive loop only, one frame at a time, in arrival order.

#![deny(unsafe_code)]

pub mod errors;
pub mod history;
pub mod state;

pub use errors::{Result, StateError};
pub use history::{DEFAULT_CAPACITY, MIN_CAPACITY, MessageHistory, effective_capacity};
pub use state::{AnyChannel, ConnectionState};
