//! # parley-client
//!
//! Connection lifecycle and event dispatch for the Parley chat client.
//!
//! - [`client`]: the [`Client`] handle: login, connect, close, REST actions
//!   and state queries
//! - [`codec`]: gateway frame decoding and ASCII-only JSON encoding
//! - [`dispatch`]: state mutation followed by fault-isolated callbacks
//! - [`heartbeat`]: the periodic `op: 1` keep-alive task
//! - [`transport`]: the stream abstraction, over WebSocket or in memory
//! - [`destination`]: message targets and mention lists
//! - [`http`]: REST calls and response verification
//! - [`session`]: lifecycle phases
//! - [`errors`]: the error taxonomy

#![deny(unsafe_code)]

pub mod client;
pub mod codec;
pub mod destination;
pub mod dispatch;
pub mod errors;
pub mod heartbeat;
pub mod http;
pub mod session;
pub mod transport;

pub use client::{Client, ClientConfig, FileSource, MessageOptions};
pub use destination::{Destination, Mentions};
pub use dispatch::{
    DefaultErrorHook, DispatchReport, Dispatcher, ErrorHook, Event, EventHandler, HandlerFailure,
};
pub use errors::{ClientError, CodecError, Result, TransportError};
pub use http::HistoryQuery;
pub use parley_core::EventKind;
pub use session::Phase;
