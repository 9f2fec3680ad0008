//! REST endpoint construction.

/// Default API base used when no override is configured.
pub const DEFAULT_API_BASE: &str = "https://discordapp.com/api";

/// REST endpoints rooted at a configurable API base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    /// Build endpoints for `base` (trailing slashes are ignored).
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            let _ = base.pop();
        }
        Self { base }
    }

    /// API base URL.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// `POST` credentials, receive a token.
    pub fn login(&self) -> String {
        format!("{}/auth/login", self.base)
    }

    /// `POST` to invalidate the token.
    pub fn logout(&self) -> String {
        format!("{}/auth/logout", self.base)
    }

    /// `GET` the streaming endpoint.
    pub fn gateway(&self) -> String {
        format!("{}/gateway", self.base)
    }

    /// Private channels owned by `user_id`.
    pub fn user_channels(&self, user_id: &str) -> String {
        format!("{}/users/{user_id}/channels", self.base)
    }

    /// Avatar image for a user.
    pub fn user_avatar(&self, user_id: &str, avatar: &str) -> String {
        format!("{}/users/{user_id}/avatars/{avatar}.jpg", self.base)
    }

    /// Messages of a channel (send, history).
    pub fn channel_messages(&self, channel_id: &str) -> String {
        format!("{}/channels/{channel_id}/messages", self.base)
    }

    /// A single message (edit, delete).
    pub fn channel_message(&self, channel_id: &str, message_id: &str) -> String {
        format!("{}/channels/{channel_id}/messages/{message_id}", self.base)
    }

    /// Typing indicator of a channel.
    pub fn channel_typing(&self, channel_id: &str) -> String {
        format!("{}/channels/{channel_id}/typing", self.base)
    }

    /// Icon image for a server.
    pub fn server_icon(&self, server_id: &str, icon: &str) -> String {
        format!("{}/guilds/{server_id}/icons/{icon}.jpg", self.base)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base() {
        let e = Endpoints::default();
        assert_eq!(e.login(), "https://discordapp.com/api/auth/login");
        assert_eq!(e.gateway(), "https://discordapp.com/api/gateway");
    }

    #[test]
    fn trailing_slash_trimmed() {
        let e = Endpoints::new("http://127.0.0.1:9000/api//");
        assert_eq!(e.base(), "http://127.0.0.1:9000/api");
        assert_eq!(e.logout(), "http://127.0.0.1:9000/api/auth/logout");
    }

    #[test]
    fn channel_paths() {
        let e = Endpoints::new("http://x");
        assert_eq!(e.channel_messages("10"), "http://x/channels/10/messages");
        assert_eq!(e.channel_message("10", "20"), "http://x/channels/10/messages/20");
        assert_eq!(e.channel_typing("10"), "http://x/channels/10/typing");
        assert_eq!(e.user_channels("7"), "http://x/users/7/channels");
    }
}
