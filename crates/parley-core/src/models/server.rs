//! Servers (guilds) with their roles, members and channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::Channel;
use super::user::User;
use crate::endpoints::Endpoints;

/// Online status of a member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Connected and active.
    Online,
    /// Connected but away.
    Idle,
    /// Not connected.
    #[default]
    Offline,
}

/// A permission-bearing role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Snowflake id. The `@everyone` role shares its id with the server.
    pub id: String,
    /// Role name.
    #[serde(default)]
    pub name: String,
    /// Permission bit set.
    #[serde(default)]
    pub permissions: u64,
    /// RGB colour, 0 for none.
    #[serde(default)]
    pub color: u32,
    /// Whether members are listed separately.
    #[serde(default)]
    pub hoist: bool,
    /// Sort position.
    #[serde(default)]
    pub position: i64,
    /// Whether an integration manages the role.
    #[serde(default)]
    pub managed: bool,
}

/// Voice connection state of a member.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceState {
    /// Voice channel the member is in, `None` when disconnected.
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Voice session id.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Server-muted.
    #[serde(default)]
    pub mute: bool,
    /// Server-deafened.
    #[serde(default)]
    pub deaf: bool,
    /// Self-muted.
    #[serde(default)]
    pub self_mute: bool,
    /// Self-deafened.
    #[serde(default)]
    pub self_deaf: bool,
    /// Suppressed by the server.
    #[serde(default)]
    pub suppress: bool,
}

/// A user's membership in a server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// The user behind the membership.
    pub user: User,
    /// Role ids held by the member.
    #[serde(default)]
    pub roles: Vec<String>,
    /// When the user joined.
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    /// Server-deafened.
    #[serde(default)]
    pub deaf: bool,
    /// Server-muted.
    #[serde(default)]
    pub mute: bool,
    /// Presence status.
    #[serde(default)]
    pub status: Status,
    /// Game being played, if any.
    #[serde(default)]
    pub game_id: Option<u64>,
    /// Voice state, delivered separately from the member object.
    #[serde(skip)]
    pub voice: VoiceState,
}

impl Member {
    /// The member's user id.
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

/// A server the connected user belongs to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Snowflake id.
    pub id: String,
    /// Server name.
    #[serde(default)]
    pub name: String,
    /// Voice region.
    #[serde(default)]
    pub region: Option<String>,
    /// Icon hash.
    #[serde(default)]
    pub icon: Option<String>,
    /// User id of the owner.
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Seconds before idle members move to the AFK channel.
    #[serde(default)]
    pub afk_timeout: u64,
    /// AFK voice channel.
    #[serde(default)]
    pub afk_channel_id: Option<String>,
    /// Set while an outage keeps the server from being served.
    #[serde(default)]
    pub unavailable: bool,
    /// Roles defined on the server.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Known members.
    #[serde(default)]
    pub members: Vec<Member>,
    /// Channels of the server.
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl Server {
    /// Find a member by user id.
    pub fn get_member(&self, user_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id() == user_id)
    }

    /// Find a member by user id for mutation.
    pub fn get_member_mut(&mut self, user_id: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.id() == user_id)
    }

    /// Find a channel by id.
    pub fn get_channel(&self, channel_id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == channel_id)
    }

    /// The channel sharing the server's id.
    pub fn default_channel(&self) -> Option<&Channel> {
        self.get_channel(&self.id)
    }

    /// The `@everyone` role.
    pub fn default_role(&self) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == self.id)
    }

    /// The owning member, if loaded.
    pub fn owner(&self) -> Option<&Member> {
        self.owner_id.as_deref().and_then(|id| self.get_member(id))
    }

    /// Icon image URL, `None` without an icon.
    pub fn icon_url(&self, endpoints: &Endpoints) -> Option<String> {
        self.icon
            .as_deref()
            .map(|hash| endpoints.server_icon(&self.id, hash))
    }
}
