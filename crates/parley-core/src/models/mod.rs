//! Wire-level data holders.
//!
//! Field names follow the gateway JSON; unknown fields are ignored and most
//! fields default so partial objects (presence, member updates) still parse.

pub mod channel;
pub mod message;
pub mod server;
pub mod user;

pub use channel::{Channel, ChannelType, PrivateChannel};
pub use message::Message;
pub use server::{Member, Role, Server, Status, VoiceState};
pub use user::User;
