//! Message targets and mention lists.

use std::sync::LazyLock;

use parley_core::{Channel, Message, PrivateChannel, Server, User};
use parley_state::{AnyChannel, ConnectionState};
use regex::Regex;

use crate::errors::{ClientError, Result};

/// `<@id>` markup in message content.
const MENTION_PATTERN: &str = r"<@(\d+)>";

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MENTION_PATTERN).expect("mention pattern compiles"));

/// Where a message, typing indicator or file goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// A server channel, by id.
    Channel(String),
    /// A private channel, by id.
    PrivateChannel(String),
    /// A server's default channel, which shares the server's id.
    Server(String),
    /// A user; messages go to the private channel with them, opening one
    /// if needed.
    User(User),
    /// A bare channel id.
    Id(String),
}

/// Outcome of resolving a destination against the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Resolved {
    /// The channel id to use.
    Channel(String),
    /// No private channel with this user exists yet.
    OpenPrivate(User),
}

impl Destination {
    pub(crate) fn resolve(&self, store: &ConnectionState) -> Result<Resolved> {
        let id = match self {
            Self::Channel(id) | Self::PrivateChannel(id) | Self::Server(id) | Self::Id(id) => id,
            Self::User(user) => {
                if user.id.is_empty() {
                    return Err(ClientError::InvalidDestination("user has no id".into()));
                }
                if store.user().is_none() {
                    return Err(ClientError::InvalidDestination(
                        "private messages need a READY session".into(),
                    ));
                }
                return Ok(match store.private_channel_with(&user.id) {
                    Some(pm) => Resolved::Channel(pm.id.clone()),
                    None => Resolved::OpenPrivate(user.clone()),
                });
            }
        };
        if id.is_empty() {
            return Err(ClientError::InvalidDestination("empty channel id".into()));
        }
        Ok(Resolved::Channel(id.clone()))
    }
}

impl From<&Channel> for Destination {
    fn from(channel: &Channel) -> Self {
        Self::Channel(channel.id.clone())
    }
}

impl From<&PrivateChannel> for Destination {
    fn from(channel: &PrivateChannel) -> Self {
        Self::PrivateChannel(channel.id.clone())
    }
}

impl From<&AnyChannel> for Destination {
    fn from(channel: &AnyChannel) -> Self {
        match channel {
            AnyChannel::Server(c) => c.into(),
            AnyChannel::Private(p) => p.into(),
        }
    }
}

impl From<&Server> for Destination {
    fn from(server: &Server) -> Self {
        Self::Server(server.id.clone())
    }
}

impl From<&User> for Destination {
    fn from(user: &User) -> Self {
        Self::User(user.clone())
    }
}

impl From<&Message> for Destination {
    fn from(message: &Message) -> Self {
        Self::Channel(message.channel_id.clone())
    }
}

impl From<&str> for Destination {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for Destination {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

/// Who a message should notify.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Mentions {
    /// Everyone mentioned in the content with `<@id>` markup.
    #[default]
    All,
    /// Nobody.
    None,
    /// Exactly these user ids.
    Users(Vec<String>),
}

impl Mentions {
    /// Mention exactly these users.
    pub fn users<'a>(users: impl IntoIterator<Item = &'a User>) -> Self {
        Self::Users(users.into_iter().map(|u| u.id.clone()).collect())
    }

    /// User ids to send alongside `content`.
    pub fn resolve(&self, content: &str) -> Vec<String> {
        match self {
            Self::All => MENTION
                .captures_iter(content)
                .map(|c| c[1].to_string())
                .collect(),
            Self::None => Vec::new(),
            Self::Users(ids) => ids.clone(),
        }
    }
}

impl From<bool> for Mentions {
    fn from(all: bool) -> Self {
        if all { Self::All } else { Self::None }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
