//! REST calls against the API base.
//!
//! Every call except login carries the session token as the raw
//! `authorization` header. JSON bodies go through [`codec::encode`] so they
//! are byte-identical to what the gateway codec produces.

use parley_core::{Endpoints, Message, PrivateChannel};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::codec;
use crate::errors::{ClientError, Result};

/// Query for [`HttpApi::logs_from`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Maximum number of messages.
    pub limit: u32,
    /// Only messages older than this id.
    pub before: Option<String>,
    /// Only messages newer than this id.
    pub after: Option<String>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            limit: 100,
            before: None,
            after: None,
        }
    }
}

/// Thin REST layer. Holds no session state.
#[derive(Clone, Debug)]
pub(crate) struct HttpApi {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl HttpApi {
    pub(crate) fn new(endpoints: Endpoints) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    pub(crate) fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Exchange credentials for a token.
    pub(crate) async fn login(&self, email: &str, password: &str) -> Result<String> {
        let body = json!({"email": email, "password": password});
        let response = with_json(self.client.post(self.endpoints.login()), &body)?
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return Err(ClientError::Auth);
        }
        if status != StatusCode::OK {
            let message = error_message(response).await;
            return Err(ClientError::Protocol {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = read_json(response).await?;
        body.get("token")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ClientError::Protocol {
                status: status.as_u16(),
                message: "login response has no token".into(),
            })
    }

    pub(crate) async fn logout(&self, token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoints.logout())
            .header(AUTHORIZATION, token)
            .send()
            .await?;
        let _ = verify_response(response).await?;
        Ok(())
    }

    /// Discover the streaming endpoint.
    pub(crate) async fn gateway(&self, token: &str) -> Result<String> {
        let response = self
            .client
            .get(self.endpoints.gateway())
            .header(AUTHORIZATION, token)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::EndpointUnavailable {
                status: status.as_u16(),
            });
        }
        let body: Value = read_json(response).await?;
        body.get("url")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or(ClientError::EndpointUnavailable {
                status: status.as_u16(),
            })
    }

    pub(crate) async fn create_private_channel(
        &self,
        token: &str,
        me: &str,
        recipient_id: &str,
    ) -> Result<PrivateChannel> {
        let body = json!({"recipient_id": recipient_id});
        let request = self
            .client
            .post(self.endpoints.user_channels(me))
            .header(AUTHORIZATION, token);
        let response = with_json(request, &body)?.send().await?;
        read_json(verify_response(response).await?).await
    }

    pub(crate) async fn send_message(
        &self,
        token: &str,
        channel_id: &str,
        content: &str,
        mentions: &[String],
        tts: bool,
    ) -> Result<Message> {
        let mut body = json!({"content": content, "mentions": mentions});
        if tts {
            body["tts"] = Value::Bool(true);
        }
        let request = self
            .client
            .post(self.endpoints.channel_messages(channel_id))
            .header(AUTHORIZATION, token);
        let response = with_json(request, &body)?.send().await?;
        let value = read_json(verify_response(response).await?).await?;
        bind_message(value, channel_id)
    }

    pub(crate) async fn edit_message(
        &self,
        token: &str,
        channel_id: &str,
        message_id: &str,
        content: &str,
        mentions: &[String],
    ) -> Result<Message> {
        let body = json!({"content": content, "mentions": mentions});
        let request = self
            .client
            .patch(self.endpoints.channel_message(channel_id, message_id))
            .header(AUTHORIZATION, token);
        let response = with_json(request, &body)?.send().await?;
        let value = read_json(verify_response(response).await?).await?;
        bind_message(value, channel_id)
    }

    pub(crate) async fn delete_message(
        &self,
        token: &str,
        channel_id: &str,
        message_id: &str,
    ) -> Result<()> {
        let response = self
            .client
            .delete(self.endpoints.channel_message(channel_id, message_id))
            .header(AUTHORIZATION, token)
            .send()
            .await?;
        let _ = verify_response(response).await?;
        Ok(())
    }

    pub(crate) async fn send_typing(&self, token: &str, channel_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoints.channel_typing(channel_id))
            .header(AUTHORIZATION, token)
            .send()
            .await?;
        let _ = verify_response(response).await?;
        Ok(())
    }

    pub(crate) async fn send_file(
        &self,
        token: &str,
        channel_id: &str,
        filename: String,
        data: Vec<u8>,
    ) -> Result<Message> {
        let part = reqwest::multipart::Part::bytes(data).file_name(filename);
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .client
            .post(self.endpoints.channel_messages(channel_id))
            .header(AUTHORIZATION, token)
            .multipart(form)
            .send()
            .await?;
        let value = read_json(verify_response(response).await?).await?;
        bind_message(value, channel_id)
    }

    pub(crate) async fn logs_from(
        &self,
        token: &str,
        channel_id: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<Message>> {
        let mut params = vec![("limit", query.limit.to_string())];
        if let Some(before) = &query.before {
            params.push(("before", before.clone()));
        }
        if let Some(after) = &query.after {
            params.push(("after", after.clone()));
        }
        let response = self
            .client
            .get(self.endpoints.channel_messages(channel_id))
            .header(AUTHORIZATION, token)
            .query(&params)
            .send()
            .await?;
        let values: Vec<Value> = read_json(verify_response(response).await?).await?;
        values
            .into_iter()
            .map(|value| bind_message(value, channel_id))
            .collect()
    }
}

fn with_json(request: RequestBuilder, body: &Value) -> Result<RequestBuilder> {
    let text = codec::encode(body)?;
    Ok(request.header(CONTENT_TYPE, "application/json").body(text))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Map a non-2xx response onto the error taxonomy.
pub(crate) async fn verify_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = error_message(response).await;
    debug!(status = status.as_u16(), %message, "request rejected");
    Err(match status {
        StatusCode::FORBIDDEN => ClientError::Forbidden { message },
        StatusCode::NOT_FOUND => ClientError::NotFound { message },
        _ => ClientError::Protocol {
            status: status.as_u16(),
            message,
        },
    })
}

/// The JSON `message` field, or the status reason when there is none.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    parse_error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string())
}

fn parse_error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.get("message")?.as_str().map(String::from)
}

/// Decode a message, filling in the channel it was sent to when the
/// response leaves it out.
fn bind_message(mut value: Value, channel_id: &str) -> Result<Message> {
    if let Some(obj) = value.as_object_mut() {
        let _ = obj
            .entry("channel_id")
            .or_insert_with(|| Value::from(channel_id));
    }
    Ok(serde_json::from_value(value)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn api() -> (MockServer, HttpApi) {
        let server = MockServer::start().await;
        let http = HttpApi::new(Endpoints::new(server.uri()));
        (server, http)
    }

    fn message_json(id: &str) -> Value {
        json!({"id": id, "channel_id": "10", "author": {"id": "1", "username": "me"}, "content": "hi"})
    }

    #[tokio::test]
    async fn login_returns_token() {
        let (server, http) = api().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({"email": "a@b.c", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
            .mount(&server)
            .await;

        assert_eq!(http.login("a@b.c", "pw").await.unwrap(), "tok");
    }

    #[tokio::test]
    async fn login_400_is_auth_error() {
        let (server, http) = api().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        assert_matches!(http.login("a@b.c", "bad").await, Err(ClientError::Auth));
    }

    #[tokio::test]
    async fn login_other_status_carries_message() {
        let (server, http) = api().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({"message": "down for maintenance"})),
            )
            .mount(&server)
            .await;

        assert_matches!(
            http.login("a@b.c", "pw").await,
            Err(ClientError::Protocol { status: 503, message }) if message == "down for maintenance"
        );
    }

    #[tokio::test]
    async fn gateway_non_200_is_unavailable() {
        let (server, http) = api().await;
        Mock::given(method("GET"))
            .and(path("/gateway"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        assert_matches!(
            http.gateway("tok").await,
            Err(ClientError::EndpointUnavailable { status: 502 })
        );
    }

    #[tokio::test]
    async fn gateway_sends_token() {
        let (server, http) = api().await;
        Mock::given(method("GET"))
            .and(path("/gateway"))
            .and(header("authorization", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "wss://gw"})))
            .mount(&server)
            .await;

        assert_eq!(http.gateway("tok").await.unwrap(), "wss://gw");
    }

    #[tokio::test]
    async fn tts_flag_only_when_set() {
        let (server, http) = api().await;
        Mock::given(method("POST"))
            .and(path("/channels/10/messages"))
            .and(body_json(json!({"content": "hi", "mentions": [], "tts": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_json("1")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/channels/10/messages"))
            .and(body_json(json!({"content": "hi", "mentions": ["7"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_json("2")))
            .mount(&server)
            .await;

        let tts = http.send_message("tok", "10", "hi", &[], true).await.unwrap();
        assert_eq!(tts.id, "1");
        let plain = http
            .send_message("tok", "10", "hi", &["7".to_string()], false)
            .await
            .unwrap();
        assert_eq!(plain.id, "2");
    }

    #[tokio::test]
    async fn status_mapping() {
        let (server, http) = api().await;
        Mock::given(method("POST"))
            .and(path("/channels/1/typing"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Missing Access"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/channels/2/typing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/channels/3/typing"))
            .respond_with(ResponseTemplate::new(500).set_body_string("not json"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/channels/4/typing"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        assert_matches!(
            http.send_typing("tok", "1").await,
            Err(ClientError::Forbidden { message }) if message == "Missing Access"
        );
        assert_matches!(
            http.send_typing("tok", "2").await,
            Err(ClientError::NotFound { message }) if message == "Not Found"
        );
        assert_matches!(
            http.send_typing("tok", "3").await,
            Err(ClientError::Protocol { status: 500, .. })
        );
        http.send_typing("tok", "4").await.unwrap();
    }

    #[tokio::test]
    async fn history_query_params() {
        let (server, http) = api().await;
        Mock::given(method("GET"))
            .and(path("/channels/10/messages"))
            .and(query_param("limit", "2"))
            .and(query_param("before", "99"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([message_json("5"), message_json("4")])),
            )
            .mount(&server)
            .await;

        let query = HistoryQuery {
            limit: 2,
            before: Some("99".into()),
            after: None,
        };
        let messages = http.logs_from("tok", "10", &query).await.unwrap();
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["5", "4"]);
    }

    #[test]
    fn bind_message_fills_channel() {
        let message = bind_message(
            json!({"id": "1", "author": {"id": "2", "username": "u"}}),
            "33",
        )
        .unwrap();
        assert_eq!(message.channel_id, "33");

        let message = bind_message(message_json("1"), "33").unwrap();
        assert_eq!(message.channel_id, "10");
    }

    #[test]
    fn error_message_from_json() {
        assert_eq!(
            parse_error_message(r#"{"message": "nope"}"#).as_deref(),
            Some("nope")
        );
        assert_eq!(parse_error_message("<html>"), None);
        assert_eq!(parse_error_message(r#"{"code": 1}"#), None);
    }
}
