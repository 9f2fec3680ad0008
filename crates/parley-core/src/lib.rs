//! # parley-core
//!
//! Foundation types shared by every Parley crate:
//!
//! - [`models`]: wire-level data holders (users, channels, servers, messages)
//! - [`events`]: the closed set of gateway events and their handler identifiers
//! - [`endpoints`]: REST endpoint construction from a configurable API base
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod endpoints;
pub mod events;
pub mod logging;
pub mod models;

pub use endpoints::{DEFAULT_API_BASE, Endpoints};
pub use events::{EventKind, UnknownEvent};
pub use models::{
    Channel, ChannelType, Member, Message, PrivateChannel, Role, Server, Status, User, VoiceState,
};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
