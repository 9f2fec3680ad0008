//! Users.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::endpoints::Endpoints;

/// A chat user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Snowflake id.
    pub id: String,
    /// Display name.
    #[serde(rename = "username", default)]
    pub name: String,
    /// Four-digit tag disambiguating equal names.
    #[serde(default)]
    pub discriminator: String,
    /// Avatar hash, if one is set.
    #[serde(default)]
    pub avatar: Option<String>,
}

impl User {
    /// Mention markup (`<@id>`).
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    /// Avatar image URL, `None` without an avatar.
    pub fn avatar_url(&self, endpoints: &Endpoints) -> Option<String> {
        self.avatar
            .as_deref()
            .map(|hash| endpoints.user_avatar(&self.id, hash))
    }

    /// Overwrite the fields present in a partial user object.
    ///
    /// Presence and profile updates only carry the fields that changed.
    pub fn apply_partial(&mut self, data: &Value) {
        if let Some(name) = data.get("username").and_then(Value::as_str) {
            self.name = name.to_string();
        }
        if let Some(disc) = data.get("discriminator").and_then(Value::as_str) {
            self.discriminator = disc.to_string();
        }
        if let Some(avatar) = data.get("avatar") {
            self.avatar = avatar.as_str().map(String::from);
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_wire_user() {
        let user: User = serde_json::from_value(json!({
            "id": "80351110224678912",
            "username": "Nelly",
            "discriminator": "1337",
            "avatar": "8342729096ea3675442027381ff50dfe",
            "verified": true
        }))
        .unwrap();
        assert_eq!(user.id, "80351110224678912");
        assert_eq!(user.name, "Nelly");
        assert_eq!(user.to_string(), "Nelly");
    }

    #[test]
    fn mention_markup() {
        let user = User {
            id: "42".into(),
            ..User::default()
        };
        assert_eq!(user.mention(), "<@42>");
    }

    #[test]
    fn avatar_url_requires_hash() {
        let endpoints = Endpoints::new("http://api");
        let mut user = User {
            id: "1".into(),
            ..User::default()
        };
        assert_eq!(user.avatar_url(&endpoints), None);
        user.avatar = Some("abc".into());
        assert_eq!(
            user.avatar_url(&endpoints).as_deref(),
            Some("http://api/users/1/avatars/abc.jpg")
        );
    }

    #[test]
    fn apply_partial_only_touches_present_fields() {
        let mut user = User {
            id: "1".into(),
            name: "old".into(),
            discriminator: "0001".into(),
            avatar: Some("hash".into()),
        };
        user.apply_partial(&json!({"id": "1", "username": "new"}));
        assert_eq!(user.name, "new");
        assert_eq!(user.discriminator, "0001");
        assert_eq!(user.avatar.as_deref(), Some("hash"));

        user.apply_partial(&json!({"avatar": null}));
        assert_eq!(user.avatar, None);
    }
}
