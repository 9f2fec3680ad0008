//! Server channels and private (direct message) channels.

use serde::{Deserialize, Serialize};

use super::user::User;

/// Kind of server channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    /// Text chat.
    #[default]
    Text,
    /// Voice chat.
    Voice,
}

/// A channel belonging to a server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Snowflake id.
    pub id: String,
    /// Channel name without the leading `#`.
    #[serde(default)]
    pub name: String,
    /// Owning server. Absent in the channel lists embedded in server
    /// payloads; the store fills it in.
    #[serde(rename = "guild_id", default)]
    pub server_id: Option<String>,
    /// Channel topic.
    #[serde(default)]
    pub topic: Option<String>,
    /// Sort position in the channel list.
    #[serde(default)]
    pub position: i64,
    /// Text or voice.
    #[serde(rename = "type", default)]
    pub kind: ChannelType,
    /// Id of the most recent message.
    #[serde(default)]
    pub last_message_id: Option<String>,
}

impl Channel {
    /// Mention markup (`<#id>`).
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }

    /// The default channel shares its id with the server.
    pub fn is_default(&self) -> bool {
        self.server_id.as_deref() == Some(self.id.as_str())
    }
}

/// A one-to-one channel with another user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateChannel {
    /// Snowflake id.
    pub id: String,
    /// The other participant.
    #[serde(rename = "recipient")]
    pub user: User,
    /// Id of the most recent message.
    #[serde(default)]
    pub last_message_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_server_channel() {
        let channel: Channel = serde_json::from_value(json!({
            "id": "100",
            "guild_id": "100",
            "name": "general",
            "type": "text",
            "position": 0,
            "topic": null
        }))
        .unwrap();
        assert_eq!(channel.kind, ChannelType::Text);
        assert!(channel.is_default());
        assert_eq!(channel.mention(), "<#100>");
    }

    #[test]
    fn voice_channel_is_not_default_without_server() {
        let channel: Channel = serde_json::from_value(json!({
            "id": "5",
            "name": "lounge",
            "type": "voice"
        }))
        .unwrap();
        assert_eq!(channel.kind, ChannelType::Voice);
        assert!(!channel.is_default());
    }

    #[test]
    fn deserialize_private_channel() {
        let pm: PrivateChannel = serde_json::from_value(json!({
            "id": "9",
            "is_private": true,
            "recipient": {"id": "3", "username": "bob", "discriminator": "0002", "avatar": null}
        }))
        .unwrap();
        assert_eq!(pm.user.name, "bob");
        assert_eq!(pm.last_message_id, None);
    }
}
