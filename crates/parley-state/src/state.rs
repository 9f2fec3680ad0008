//! The connection state store and its per-event mutations.

use parley_core::{
    Channel, EventKind, Member, Message, PrivateChannel, Role, Server, Status, User, VoiceState,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, StateError};
use crate::history::MessageHistory;

/// A channel of either kind, as returned by id lookups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnyChannel {
    /// A channel belonging to a server.
    Server(Channel),
    /// A private channel with another user.
    Private(PrivateChannel),
}

impl AnyChannel {
    /// The channel id.
    pub fn id(&self) -> &str {
        match self {
            Self::Server(c) => &c.id,
            Self::Private(p) => &p.id,
        }
    }

    /// Whether this is a private channel.
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private(_))
    }
}

/// Everything the client knows about the remote side.
///
/// Mutated only by [`ConnectionState::apply`] from the receive loop, plus
/// [`ConnectionState::add_private_channel`] when a REST call opens one.
#[derive(Clone, Debug, Default)]
pub struct ConnectionState {
    user: Option<User>,
    servers: Vec<Server>,
    private_channels: Vec<PrivateChannel>,
    messages: MessageHistory,
}

impl ConnectionState {
    /// Create an empty store with the given message history capacity.
    pub fn new(max_messages: Option<usize>) -> Self {
        Self {
            messages: MessageHistory::new(max_messages),
            ..Self::default()
        }
    }

    // ── queries ─────────────────────────────────────────────────────

    /// The connected user, known once READY arrived.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Servers the user belongs to.
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    /// Open private channels.
    pub fn private_channels(&self) -> &[PrivateChannel] {
        &self.private_channels
    }

    /// Recently seen messages.
    pub fn messages(&self) -> &MessageHistory {
        &self.messages
    }

    /// Find a server by id.
    pub fn get_server(&self, server_id: &str) -> Option<&Server> {
        self.servers.iter().find(|s| s.id == server_id)
    }

    /// Find a server or private channel by id.
    pub fn get_channel(&self, channel_id: &str) -> Option<AnyChannel> {
        self.all_channels()
            .find(|c| c.id == channel_id)
            .cloned()
            .map(AnyChannel::Server)
            .or_else(|| {
                self.private_channels
                    .iter()
                    .find(|p| p.id == channel_id)
                    .cloned()
                    .map(AnyChannel::Private)
            })
    }

    /// Every server channel.
    pub fn all_channels(&self) -> impl Iterator<Item = &Channel> {
        self.servers.iter().flat_map(|s| s.channels.iter())
    }

    /// Every member of every server. A user in several servers appears once
    /// per server.
    pub fn all_members(&self) -> impl Iterator<Item = &Member> {
        self.servers.iter().flat_map(|s| s.members.iter())
    }

    /// The private channel with `user_id`, if one is open.
    pub fn private_channel_with(&self, user_id: &str) -> Option<&PrivateChannel> {
        self.private_channels.iter().find(|p| p.user.id == user_id)
    }

    /// Record a private channel opened outside the gateway.
    pub fn add_private_channel(&mut self, channel: PrivateChannel) {
        if let Some(existing) = self.private_channels.iter_mut().find(|p| p.id == channel.id) {
            *existing = channel;
        } else {
            self.private_channels.push(channel);
        }
    }

    // ── mutation ────────────────────────────────────────────────────

    /// Apply one dispatched event payload.
    pub fn apply(&mut self, kind: EventKind, data: &Value) -> Result<()> {
        debug!(event = %kind, "applying state mutation");
        match kind {
            EventKind::Ready => self.parse_ready(data),
            EventKind::MessageCreate => self.parse_message_create(data),
            EventKind::MessageDelete => self.parse_message_delete(data),
            EventKind::MessageUpdate => self.parse_message_update(data),
            EventKind::PresenceUpdate => self.parse_presence_update(data),
            EventKind::UserUpdate => self.parse_user_update(data),
            EventKind::ChannelDelete => self.parse_channel_delete(data),
            EventKind::ChannelUpdate => self.parse_channel_update(data),
            EventKind::ChannelCreate => self.parse_channel_create(data),
            EventKind::GuildMemberAdd => self.parse_guild_member_add(data),
            EventKind::GuildMemberRemove => self.parse_guild_member_remove(data),
            EventKind::GuildMemberUpdate => self.parse_guild_member_update(data),
            EventKind::GuildCreate => self.parse_guild_create(data),
            EventKind::GuildDelete => self.parse_guild_delete(data),
            EventKind::GuildRoleCreate => self.parse_guild_role_create(data),
            EventKind::GuildRoleDelete => self.parse_guild_role_delete(data),
            EventKind::TypingStart => self.parse_typing_start(data),
            EventKind::GuildRoleUpdate => self.parse_guild_role_update(data),
            EventKind::VoiceStateUpdate => self.parse_voice_state_update(data),
            EventKind::SocketResponse => Err(StateError::NotApplicable(kind.as_str())),
        }
    }

    fn parse_ready(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "ready";
        let user: User = decode(EVENT, field(EVENT, data, "user")?)?;

        let mut servers = Vec::new();
        for guild in array(data, "guilds") {
            servers.push(build_server(EVENT, guild)?);
        }

        let mut private_channels = Vec::new();
        for pm in array(data, "private_channels") {
            private_channels.push(decode::<PrivateChannel>(EVENT, pm)?);
        }

        self.user = Some(user);
        self.servers = servers;
        self.private_channels = private_channels;
        Ok(())
    }

    fn parse_message_create(&mut self, data: &Value) -> Result<()> {
        let message: Message = decode("message_create", data)?;
        self.touch_channel(&message.channel_id, &message.id);
        let _ = self.messages.push(message);
        Ok(())
    }

    fn parse_message_delete(&mut self, data: &Value) -> Result<()> {
        let id = str_field("message_delete", data, "id")?;
        // Messages older than the history are not tracked.
        let _ = self.messages.remove(id);
        Ok(())
    }

    fn parse_message_update(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "message_update";
        let id = str_field(EVENT, data, "id")?;
        if let Some(message) = self.messages.find_mut(id) {
            message
                .apply_update(data)
                .map_err(|source| StateError::Malformed {
                    event: EVENT,
                    source,
                })?;
        }
        Ok(())
    }

    fn parse_presence_update(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "presence_update";
        let server_id = str_field(EVENT, data, "guild_id")?;
        let user = field(EVENT, data, "user")?;
        let user_id = str_field(EVENT, user, "id")?;
        let status: Option<Status> = optional(EVENT, data, "status")?;
        let game_id: Option<u64> = data.get("game_id").and_then(Value::as_u64);

        let member = self.member_mut(server_id, user_id)?;
        if let Some(status) = status {
            member.status = status;
        }
        member.game_id = game_id;
        member.user.apply_partial(user);
        Ok(())
    }

    fn parse_user_update(&mut self, data: &Value) -> Result<()> {
        match self.user.as_mut() {
            Some(user) => user.apply_partial(data),
            None => self.user = Some(decode("user_update", data)?),
        }
        Ok(())
    }

    fn parse_channel_delete(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "channel_delete";
        let id = str_field(EVENT, data, "id")?;
        match server_ref(data) {
            Some(server_id) => {
                let server = self.server_mut(server_id)?;
                server.channels.retain(|c| c.id != id);
            }
            None => self.private_channels.retain(|p| p.id != id),
        }
        Ok(())
    }

    fn parse_channel_update(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "channel_update";
        match server_ref(data) {
            Some(server_id) => {
                let channel: Channel = decode(EVENT, data)?;
                let server = self.server_mut(server_id)?;
                let slot = server
                    .channels
                    .iter_mut()
                    .find(|c| c.id == channel.id)
                    .ok_or_else(|| StateError::UnknownChannel(channel.id.clone()))?;
                *slot = channel;
            }
            None => {
                let channel: PrivateChannel = decode(EVENT, data)?;
                let slot = self
                    .private_channels
                    .iter_mut()
                    .find(|p| p.id == channel.id)
                    .ok_or_else(|| StateError::UnknownChannel(channel.id.clone()))?;
                *slot = channel;
            }
        }
        Ok(())
    }

    fn parse_channel_create(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "channel_create";
        match server_ref(data) {
            Some(server_id) => {
                let channel: Channel = decode(EVENT, data)?;
                let server = self.server_mut(server_id)?;
                server.channels.retain(|c| c.id != channel.id);
                server.channels.push(channel);
            }
            None => self.add_private_channel(decode(EVENT, data)?),
        }
        Ok(())
    }

    fn parse_guild_member_add(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "guild_member_add";
        let server_id = str_field(EVENT, data, "guild_id")?;
        let member: Member = decode(EVENT, data)?;
        let server = self.server_mut(server_id)?;
        server.members.retain(|m| m.id() != member.id());
        server.members.push(member);
        Ok(())
    }

    fn parse_guild_member_remove(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "guild_member_remove";
        let server_id = str_field(EVENT, data, "guild_id")?;
        let user_id = str_field(EVENT, field(EVENT, data, "user")?, "id")?;
        let server = self.server_mut(server_id)?;
        server.members.retain(|m| m.id() != user_id);
        Ok(())
    }

    fn parse_guild_member_update(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "guild_member_update";
        let server_id = str_field(EVENT, data, "guild_id")?;
        let user = field(EVENT, data, "user")?;
        let user_id = str_field(EVENT, user, "id")?;
        let roles: Option<Vec<String>> = optional(EVENT, data, "roles")?;

        let member = self.member_mut(server_id, user_id)?;
        if let Some(roles) = roles {
            member.roles = roles;
        }
        member.user.apply_partial(user);
        Ok(())
    }

    fn parse_guild_create(&mut self, data: &Value) -> Result<()> {
        let server = build_server("guild_create", data)?;
        if let Some(existing) = self.servers.iter_mut().find(|s| s.id == server.id) {
            *existing = server;
        } else {
            self.servers.push(server);
        }
        Ok(())
    }

    fn parse_guild_delete(&mut self, data: &Value) -> Result<()> {
        let id = str_field("guild_delete", data, "id")?;
        let unavailable = data
            .get("unavailable")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if unavailable {
            self.server_mut(id)?.unavailable = true;
        } else {
            let before = self.servers.len();
            self.servers.retain(|s| s.id != id);
            if self.servers.len() == before {
                return Err(StateError::UnknownServer(id.to_string()));
            }
        }
        Ok(())
    }

    fn parse_guild_role_create(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "guild_role_create";
        let server_id = str_field(EVENT, data, "guild_id")?;
        let role: Role = decode(EVENT, field(EVENT, data, "role")?)?;
        let server = self.server_mut(server_id)?;
        server.roles.retain(|r| r.id != role.id);
        server.roles.push(role);
        Ok(())
    }

    fn parse_guild_role_delete(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "guild_role_delete";
        let server_id = str_field(EVENT, data, "guild_id")?;
        let role_id = str_field(EVENT, data, "role_id")?;
        let server = self.server_mut(server_id)?;
        server.roles.retain(|r| r.id != role_id);
        for member in &mut server.members {
            member.roles.retain(|r| r != role_id);
        }
        Ok(())
    }

    fn parse_typing_start(&mut self, data: &Value) -> Result<()> {
        let channel_id = str_field("typing_start", data, "channel_id")?;
        if self.get_channel(channel_id).is_none() {
            return Err(StateError::UnknownChannel(channel_id.to_string()));
        }
        Ok(())
    }

    fn parse_guild_role_update(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "guild_role_update";
        let server_id = str_field(EVENT, data, "guild_id")?;
        let role: Role = decode(EVENT, field(EVENT, data, "role")?)?;
        let server = self.server_mut(server_id)?;
        let slot = server
            .roles
            .iter_mut()
            .find(|r| r.id == role.id)
            .ok_or_else(|| StateError::UnknownRole(role.id.clone()))?;
        *slot = role;
        Ok(())
    }

    fn parse_voice_state_update(&mut self, data: &Value) -> Result<()> {
        const EVENT: &str = "voice_state_update";
        let server_id = str_field(EVENT, data, "guild_id")?;
        let user_id = str_field(EVENT, data, "user_id")?;
        let voice: VoiceState = decode(EVENT, data)?;
        self.member_mut(server_id, user_id)?.voice = voice;
        Ok(())
    }

    // ── helpers ─────────────────────────────────────────────────────

    fn server_mut(&mut self, server_id: &str) -> Result<&mut Server> {
        self.servers
            .iter_mut()
            .find(|s| s.id == server_id)
            .ok_or_else(|| StateError::UnknownServer(server_id.to_string()))
    }

    fn member_mut(&mut self, server_id: &str, user_id: &str) -> Result<&mut Member> {
        self.server_mut(server_id)?
            .get_member_mut(user_id)
            .ok_or_else(|| StateError::UnknownMember {
                server_id: server_id.to_string(),
                user_id: user_id.to_string(),
            })
    }

    fn touch_channel(&mut self, channel_id: &str, message_id: &str) {
        let server_channel = self
            .servers
            .iter_mut()
            .flat_map(|s| s.channels.iter_mut())
            .find(|c| c.id == channel_id);
        if let Some(channel) = server_channel {
            channel.last_message_id = Some(message_id.to_string());
        } else if let Some(pm) = self.private_channels.iter_mut().find(|p| p.id == channel_id) {
            pm.last_message_id = Some(message_id.to_string());
        }
    }
}

/// Build a server from a READY guild entry or a GUILD_CREATE payload,
/// folding in presences and voice states.
fn build_server(event: &'static str, data: &Value) -> Result<Server> {
    let mut server: Server = decode(event, data)?;

    for channel in &mut server.channels {
        channel.server_id = Some(server.id.clone());
    }

    for presence in array(data, "presences") {
        let Some(user) = presence.get("user") else {
            continue;
        };
        let Some(user_id) = user.get("id").and_then(Value::as_str) else {
            continue;
        };
        if let Some(member) = server.get_member_mut(user_id) {
            if let Some(status) = optional::<Status>(event, presence, "status")? {
                member.status = status;
            }
            member.game_id = presence.get("game_id").and_then(Value::as_u64);
        }
    }

    for state in array(data, "voice_states") {
        let Some(user_id) = state.get("user_id").and_then(Value::as_str) else {
            continue;
        };
        let voice: VoiceState = decode(event, state)?;
        if let Some(member) = server.get_member_mut(user_id) {
            member.voice = voice;
        }
    }

    Ok(server)
}

fn decode<T: DeserializeOwned>(event: &'static str, value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|source| StateError::Malformed { event, source })
}

fn field<'a>(event: &'static str, data: &'a Value, name: &'static str) -> Result<&'a Value> {
    data.get(name)
        .filter(|v| !v.is_null())
        .ok_or(StateError::MissingField { event, field: name })
}

fn str_field<'a>(event: &'static str, data: &'a Value, name: &'static str) -> Result<&'a str> {
    field(event, data, name)?
        .as_str()
        .ok_or(StateError::MissingField { event, field: name })
}

fn optional<T: DeserializeOwned>(
    event: &'static str,
    data: &Value,
    name: &'static str,
) -> Result<Option<T>> {
    match data.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => decode(event, v).map(Some),
    }
}

fn array<'a>(data: &'a Value, name: &'static str) -> impl Iterator<Item = &'a Value> {
    data.get(name)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Server id of a channel payload; private channels carry none.
fn server_ref(data: &Value) -> Option<&str> {
    if data.get("is_private").and_then(Value::as_bool) == Some(true) {
        return None;
    }
    data.get("guild_id").and_then(Value::as_str)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
