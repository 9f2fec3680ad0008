//! Gateway event identifiers.
//!
//! The gateway names events in `SCREAMING_SNAKE_CASE` (`MESSAGE_CREATE`).
//! Handlers are registered against the lowercase identifier
//! (`message_create`). [`EventKind`] is the closed mapping between the two;
//! wire names outside the table are not dispatched.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Every event a handler can be registered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Session established; carries the initial state snapshot.
    Ready,
    /// A message was posted.
    MessageCreate,
    /// A message was deleted.
    MessageDelete,
    /// A message was edited or gained embeds.
    MessageUpdate,
    /// A member's status or game changed.
    PresenceUpdate,
    /// The connected user's own profile changed.
    UserUpdate,
    /// A channel was deleted.
    ChannelDelete,
    /// A channel was modified.
    ChannelUpdate,
    /// A channel (server or private) was created.
    ChannelCreate,
    /// A member joined a server.
    GuildMemberAdd,
    /// A member left or was removed from a server.
    GuildMemberRemove,
    /// A member's roles changed.
    GuildMemberUpdate,
    /// A server became available or was joined.
    GuildCreate,
    /// A server became unavailable or was left.
    GuildDelete,
    /// A role was created.
    GuildRoleCreate,
    /// A role was deleted.
    GuildRoleDelete,
    /// A user started typing.
    TypingStart,
    /// A role was modified.
    GuildRoleUpdate,
    /// A member's voice state changed.
    VoiceStateUpdate,
    /// Raw hook: fires for every decoded frame, whatever its op or name.
    SocketResponse,
}

/// `(kind, wire name, handler identifier)` for every dispatched event.
const DISPATCH_TABLE: [(EventKind, &str, &str); 19] = [
    (EventKind::Ready, "READY", "ready"),
    (EventKind::MessageCreate, "MESSAGE_CREATE", "message_create"),
    (EventKind::MessageDelete, "MESSAGE_DELETE", "message_delete"),
    (EventKind::MessageUpdate, "MESSAGE_UPDATE", "message_update"),
    (EventKind::PresenceUpdate, "PRESENCE_UPDATE", "presence_update"),
    (EventKind::UserUpdate, "USER_UPDATE", "user_update"),
    (EventKind::ChannelDelete, "CHANNEL_DELETE", "channel_delete"),
    (EventKind::ChannelUpdate, "CHANNEL_UPDATE", "channel_update"),
    (EventKind::ChannelCreate, "CHANNEL_CREATE", "channel_create"),
    (EventKind::GuildMemberAdd, "GUILD_MEMBER_ADD", "guild_member_add"),
    (EventKind::GuildMemberRemove, "GUILD_MEMBER_REMOVE", "guild_member_remove"),
    (EventKind::GuildMemberUpdate, "GUILD_MEMBER_UPDATE", "guild_member_update"),
    (EventKind::GuildCreate, "GUILD_CREATE", "guild_create"),
    (EventKind::GuildDelete, "GUILD_DELETE", "guild_delete"),
    (EventKind::GuildRoleCreate, "GUILD_ROLE_CREATE", "guild_role_create"),
    (EventKind::GuildRoleDelete, "GUILD_ROLE_DELETE", "guild_role_delete"),
    (EventKind::TypingStart, "TYPING_START", "typing_start"),
    (EventKind::GuildRoleUpdate, "GUILD_ROLE_UPDATE", "guild_role_update"),
    (EventKind::VoiceStateUpdate, "VOICE_STATE_UPDATE", "voice_state_update"),
];

const SOCKET_RESPONSE: &str = "socket_response";

impl EventKind {
    /// Look up a gateway event name. Matching is case-sensitive.
    pub fn from_wire(name: &str) -> Option<Self> {
        DISPATCH_TABLE
            .iter()
            .find(|(_, wire, _)| *wire == name)
            .map(|(kind, _, _)| *kind)
    }

    /// Gateway name of this event, `None` for the raw hook.
    pub fn wire_name(self) -> Option<&'static str> {
        DISPATCH_TABLE
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map(|(_, wire, _)| *wire)
    }

    /// Lowercase identifier used for handler registration.
    pub fn as_str(self) -> &'static str {
        DISPATCH_TABLE
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map_or(SOCKET_RESPONSE, |(_, _, ident)| *ident)
    }

    /// Conventional handler name, e.g. `on_message_create`.
    pub fn handler_name(self) -> String {
        format!("on_{}", self.as_str())
    }

    /// Whether this event arrives as an `op: 0` dispatch frame.
    pub fn is_dispatched(self) -> bool {
        self != Self::SocketResponse
    }

    /// All dispatched events in gateway order.
    pub fn dispatched() -> impl Iterator<Item = Self> {
        DISPATCH_TABLE.iter().map(|(kind, _, _)| *kind)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handler identifier that names no known event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event identifier: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for EventKind {
    type Err = UnknownEvent;

    /// Parse a lowercase handler identifier (`"message_create"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == SOCKET_RESPONSE {
            return Ok(Self::SocketResponse);
        }
        DISPATCH_TABLE
            .iter()
            .find(|(_, _, ident)| *ident == s)
            .map(|(kind, _, _)| *kind)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}
