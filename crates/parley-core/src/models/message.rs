//! Chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::user::User;

/// A message posted to a server or private channel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Snowflake id.
    pub id: String,
    /// Channel the message was posted in.
    pub channel_id: String,
    /// Who posted it.
    pub author: User,
    /// Raw text content.
    #[serde(default)]
    pub content: String,
    /// When it was posted.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// When it was last edited.
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    /// Text-to-speech message.
    #[serde(default)]
    pub tts: bool,
    /// Whether `@everyone` was mentioned.
    #[serde(default)]
    pub mention_everyone: bool,
    /// Users mentioned in the content.
    #[serde(default)]
    pub mentions: Vec<User>,
    /// Attachment descriptors.
    #[serde(default)]
    pub attachments: Vec<Value>,
    /// Embed descriptors.
    #[serde(default)]
    pub embeds: Vec<Value>,
}

impl Message {
    /// Apply the fields present in a `MESSAGE_UPDATE` payload.
    ///
    /// Edits carry the full message; embed-only updates carry just `id`,
    /// `channel_id` and `embeds`.
    pub fn apply_update(&mut self, data: &Value) -> Result<(), serde_json::Error> {
        if let Some(content) = data.get("content").and_then(Value::as_str) {
            self.content = content.to_string();
        }
        if let Some(edited) = data.get("edited_timestamp") {
            self.edited_timestamp = serde_json::from_value(edited.clone())?;
        }
        if let Some(mentions) = data.get("mentions") {
            self.mentions = serde_json::from_value(mentions.clone())?;
        }
        if let Some(everyone) = data.get("mention_everyone").and_then(Value::as_bool) {
            self.mention_everyone = everyone;
        }
        if let Some(tts) = data.get("tts").and_then(Value::as_bool) {
            self.tts = tts;
        }
        if let Some(Value::Array(embeds)) = data.get("embeds") {
            self.embeds.clone_from(embeds);
        }
        if let Some(Value::Array(attachments)) = data.get("attachments") {
            self.attachments.clone_from(attachments);
        }
        Ok(())
    }

    /// Whether `user_id` is mentioned explicitly.
    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|u| u.id == user_id)
    }
}
