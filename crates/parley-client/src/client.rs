//! The public client handle.
//!
//! [`Client`] owns the session, the state store and the dispatcher, and runs
//! the connection lifecycle:
//!
//! ```text
//! Unauthenticated --authenticate--> Authenticated --connect--> HandshakeSent
//!        ^                               |                        |
//!        '------------logout-------------'                 first frame
//!                                                                 v
//!                          Closed <--stream ends / close()-- Streaming
//! ```
//!
//! `connect` runs the receive loop on the caller's task and returns when the
//! stream ends. Callbacks, the heartbeat and REST calls made from other
//! tasks run concurrently with it.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use parley_core::{Channel, Endpoints, EventKind, Member, Message, PrivateChannel, Server, User};
use parley_settings::ParleySettings;
use parley_state::{AnyChannel, ConnectionState};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{self, IdentifyProperties, OpCode};
use crate::destination::{Destination, Mentions, Resolved};
use crate::dispatch::{Dispatcher, ErrorHook, EventHandler};
use crate::errors::{ClientError, Result};
use crate::heartbeat::HeartbeatHandle;
use crate::http::{HistoryQuery, HttpApi};
use crate::session::{ActiveConnection, Phase, Session};
use crate::transport::{Connector, Transport, WsConnector};

/// Static client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST API base.
    pub api_base: String,
    /// Message history capacity; see [`parley_state::effective_capacity`].
    pub max_messages: Option<usize>,
    /// Identity sent in the handshake.
    pub identify: IdentifyProperties,
}

impl From<&ParleySettings> for ClientConfig {
    fn from(settings: &ParleySettings) -> Self {
        Self {
            api_base: settings.api.base_url.clone(),
            max_messages: settings.cache.max_messages,
            identify: IdentifyProperties::from(&settings.gateway),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&ParleySettings::default())
    }
}

/// Options for [`Client::send_message`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageOptions {
    /// Who to notify.
    pub mentions: Mentions,
    /// Read the message aloud.
    pub tts: bool,
}

/// A file to upload with [`Client::send_file`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileSource {
    /// Read from disk; the upload is named after the path's file name.
    Path(PathBuf),
    /// In-memory contents. A name is required.
    Bytes {
        /// Upload file name.
        name: Option<String>,
        /// File contents.
        data: Vec<u8>,
    },
}

/// Chat client. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    http: HttpApi,
    identify: IdentifyProperties,
    connector: Arc<dyn Connector>,
    session: Mutex<Session>,
    store: RwLock<ConnectionState>,
    dispatcher: Dispatcher,
}

impl Client {
    /// Create a client that connects over WebSocket.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// Create a client that opens its streams through `connector`.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: HttpApi::new(Endpoints::new(config.api_base)),
                identify: config.identify,
                connector,
                session: Mutex::new(Session::default()),
                store: RwLock::new(ConnectionState::new(config.max_messages)),
                dispatcher: Dispatcher::new(),
            }),
        }
    }

    // ── Registration ────────────────────────────────────────────────────

    /// Register the callback for a lowercase event identifier such as
    /// `"message_create"` or `"socket_response"`. Replaces any previous one.
    pub fn on<H: EventHandler>(&self, identifier: &str, handler: H) -> Result<()> {
        let kind: EventKind = identifier
            .parse()
            .map_err(|e: parley_core::UnknownEvent| ClientError::InvalidArgument(e.to_string()))?;
        self.on_event(kind, handler);
        Ok(())
    }

    /// Register the callback for `kind`. Replaces any previous one.
    pub fn on_event<H: EventHandler>(&self, kind: EventKind, handler: H) {
        self.inner.dispatcher.register(kind, Arc::new(handler));
    }

    /// Replace the hook that receives failing callbacks.
    pub fn set_error_handler<H: ErrorHook>(&self, hook: H) {
        self.inner.dispatcher.set_error_hook(Arc::new(hook));
    }

    /// Wait for every callback spawned so far to finish.
    pub async fn wait_for_callbacks(&self) {
        self.inner.dispatcher.wait_for_callbacks().await;
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Log in. On failure the phase is left as it was.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<()> {
        let token = self.inner.http.login(email, password).await?;
        let mut session = self.inner.session.lock();
        session.token = Some(token);
        session.email = Some(email.to_string());
        if session.phase == Phase::Unauthenticated {
            session.phase = Phase::Authenticated;
        }
        info!(email, "logged in");
        Ok(())
    }

    /// Open the stream and process frames until it ends or [`close`] is
    /// called.
    ///
    /// Fails with [`ClientError::NotAuthenticated`] before login without
    /// touching the network.
    ///
    /// [`close`]: Client::close
    #[tracing::instrument(skip_all)]
    pub async fn connect(&self) -> Result<()> {
        let (token, guard) = self.begin_connect()?;
        let result = self.run_connection(&token, &guard.shutdown).await;
        drop(guard);
        info!(ok = result.is_ok(), "connection finished");
        result
    }

    /// Stop the stream. Does nothing when no stream is open or it already
    /// closed. Waits for the receive loop to exit; running callbacks are left
    /// to finish on their own.
    pub async fn close(&self) {
        let (shutdown, closed) = {
            let mut session = self.inner.session.lock();
            if session.phase == Phase::Closed {
                return;
            }
            let Some(connection) = session.connection.as_mut() else {
                return;
            };
            let closing = (connection.shutdown.clone(), connection.closed.take());
            session.phase = Phase::Closed;
            closing
        };
        shutdown.cancel();
        if let Some(closed) = closed {
            let _ = closed.await;
        }
        info!("connection closed");
    }

    /// Invalidate the token, close the stream, and forget the credentials.
    ///
    /// The stream is closed and the session reset even when the server
    /// rejects the request; that error is returned afterwards.
    pub async fn logout(&self) -> Result<()> {
        let token = self.token()?;
        let revoked = self.inner.http.logout(&token).await;
        self.close().await;
        {
            let mut session = self.inner.session.lock();
            session.token = None;
            session.email = None;
            session.phase = Phase::Unauthenticated;
        }
        match &revoked {
            Ok(()) => info!("logged out"),
            Err(e) => warn!(error = %e, "logout request failed, session cleared anyway"),
        }
        revoked
    }

    fn begin_connect(&self) -> Result<(String, ConnectionGuard)> {
        let mut session = self.inner.session.lock();
        let token = session.token.clone().ok_or(ClientError::NotAuthenticated)?;
        if session.connection.is_some() {
            return Err(ClientError::AlreadyConnected);
        }
        // A finished stream leaves the token valid; start over from there.
        if session.phase == Phase::Closed {
            session.phase = Phase::Authenticated;
        }
        let shutdown = CancellationToken::new();
        let (done, closed) = oneshot::channel();
        session.connection = Some(ActiveConnection {
            shutdown: shutdown.clone(),
            closed: Some(closed),
        });
        let guard = ConnectionGuard {
            inner: Arc::clone(&self.inner),
            shutdown,
            done: Some(done),
        };
        Ok((token, guard))
    }

    async fn open(&self, token: &str) -> Result<Box<dyn Transport>> {
        let url = self.inner.http.gateway(token).await?;
        debug!(%url, "gateway discovered");
        self.inner.session.lock().gateway = Some(url.clone());
        Ok(self.inner.connector.connect(&url).await?)
    }

    async fn run_connection(&self, token: &str, shutdown: &CancellationToken) -> Result<()> {
        let mut transport = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            opened = self.open(token) => opened?,
        };

        let handshake = codec::encode(&codec::identify(token, &self.inner.identify))?;
        transport.send(handshake).await?;
        self.inner.session.lock().advance(Phase::HandshakeSent);

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let mut heartbeat: Option<HeartbeatHandle> = None;

        let result = loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    if let Err(e) = transport.close().await {
                        warn!(error = %e, "error while closing stream");
                    }
                    break Ok(());
                }
                Some(text) = outbound_rx.recv() => {
                    if let Err(e) = transport.send(text).await {
                        break Err(e.into());
                    }
                }
                received = transport.recv() => match received {
                    None => {
                        info!("stream ended");
                        break Ok(());
                    }
                    Some(Err(e)) => break Err(e.into()),
                    Some(Ok(text)) => {
                        self.handle_frame(&text, shutdown, &outbound_tx, &mut heartbeat);
                    }
                }
            }
        };

        if let Some(heartbeat) = heartbeat {
            let outcome = heartbeat.stop().await;
            debug!(?outcome, "heartbeat stopped");
        }
        result
    }

    fn handle_frame(
        &self,
        text: &str,
        shutdown: &CancellationToken,
        outbound: &mpsc::UnboundedSender<String>,
        heartbeat: &mut Option<HeartbeatHandle>,
    ) {
        let frame = match codec::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };
        self.inner.session.lock().advance(Phase::Streaming);

        let dispatcher = &self.inner.dispatcher;
        if dispatcher.has_handler(EventKind::SocketResponse) {
            match serde_json::to_value(&frame) {
                Ok(raw) => {
                    let _ = dispatcher.emit_raw(raw);
                }
                Err(e) => warn!(error = %e, "could not re-encode frame for socket_response"),
            }
        }

        if frame.op != OpCode::Dispatch {
            info!(op = u64::from(frame.op), "ignoring non-dispatch frame");
            return;
        }
        let Some(name) = frame.event.as_deref() else {
            info!("dispatch frame without an event name");
            return;
        };
        let Some(kind) = EventKind::from_wire(name) else {
            info!(event = name, "unhandled event");
            return;
        };

        if kind == EventKind::Ready {
            self.start_heartbeat(&frame.payload, shutdown, outbound, heartbeat);
        }
        let report = dispatcher.dispatch(&self.inner.store, kind, frame.payload);
        debug!(event = %kind, applied = report.applied, scheduled = report.scheduled, "frame handled");
    }

    fn start_heartbeat(
        &self,
        ready: &Value,
        shutdown: &CancellationToken,
        outbound: &mpsc::UnboundedSender<String>,
        heartbeat: &mut Option<HeartbeatHandle>,
    ) {
        let Some(interval) = ready_heartbeat_interval(ready) else {
            warn!("READY without a usable heartbeat_interval, not keeping alive");
            return;
        };
        let handle = HeartbeatHandle::spawn(interval, outbound.clone(), shutdown.child_token());
        if let Some(previous) = heartbeat.replace(handle) {
            previous.cancel();
        }
        self.inner.session.lock().heartbeat_interval = Some(interval);
        info!(?interval, "heartbeat started");
    }

    // ── REST actions ────────────────────────────────────────────────────

    fn token(&self) -> Result<String> {
        self.inner
            .session
            .lock()
            .token
            .clone()
            .ok_or(ClientError::NotAuthenticated)
    }

    async fn channel_id(&self, destination: &Destination) -> Result<String> {
        let resolved = destination.resolve(&self.inner.store.read())?;
        match resolved {
            Resolved::Channel(id) => Ok(id),
            Resolved::OpenPrivate(user) => Ok(self.start_private_message(&user).await?.id),
        }
    }

    /// Open a private channel with `user` and add it to the store.
    pub async fn start_private_message(&self, user: &User) -> Result<PrivateChannel> {
        let token = self.token()?;
        let me = self
            .inner
            .store
            .read()
            .user()
            .map(|u| u.id.clone())
            .ok_or_else(|| {
                ClientError::InvalidDestination("private messages need a READY session".into())
            })?;
        let channel = self
            .inner
            .http
            .create_private_channel(&token, &me, &user.id)
            .await?;
        self.inner.store.write().add_private_channel(channel.clone());
        debug!(channel = %channel.id, user = %user.id, "private channel opened");
        Ok(channel)
    }

    /// Post a message.
    pub async fn send_message(
        &self,
        destination: impl Into<Destination>,
        content: &str,
        options: MessageOptions,
    ) -> Result<Message> {
        let token = self.token()?;
        let channel_id = self.channel_id(&destination.into()).await?;
        let mentions = options.mentions.resolve(content);
        self.inner
            .http
            .send_message(&token, &channel_id, content, &mentions, options.tts)
            .await
    }

    /// Replace a message's content.
    pub async fn edit_message(
        &self,
        message: &Message,
        content: &str,
        mentions: Mentions,
    ) -> Result<Message> {
        let token = self.token()?;
        let mentions = mentions.resolve(content);
        self.inner
            .http
            .edit_message(&token, &message.channel_id, &message.id, content, &mentions)
            .await
    }

    /// Delete a message.
    pub async fn delete_message(&self, message: &Message) -> Result<()> {
        let token = self.token()?;
        self.inner
            .http
            .delete_message(&token, &message.channel_id, &message.id)
            .await
    }

    /// Show the typing indicator in a channel.
    pub async fn send_typing(&self, destination: impl Into<Destination>) -> Result<()> {
        let token = self.token()?;
        let channel_id = self.channel_id(&destination.into()).await?;
        self.inner.http.send_typing(&token, &channel_id).await
    }

    /// Upload a file as a message.
    pub async fn send_file(
        &self,
        destination: impl Into<Destination>,
        file: FileSource,
    ) -> Result<Message> {
        let token = self.token()?;
        let (name, data) = match file {
            FileSource::Path(path) => {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(String::from)
                    .ok_or_else(|| {
                        ClientError::InvalidArgument(format!(
                            "{} has no file name",
                            path.display()
                        ))
                    })?;
                (name, tokio::fs::read(&path).await?)
            }
            FileSource::Bytes { name: Some(name), data } => (name, data),
            FileSource::Bytes { name: None, .. } => {
                return Err(ClientError::InvalidArgument(
                    "in-memory files need a name".into(),
                ));
            }
        };
        let channel_id = self.channel_id(&destination.into()).await?;
        self.inner
            .http
            .send_file(&token, &channel_id, name, data)
            .await
    }

    /// Fetch past messages, newest first.
    pub async fn logs_from(
        &self,
        destination: impl Into<Destination>,
        query: &HistoryQuery,
    ) -> Result<Vec<Message>> {
        let token = self.token()?;
        let channel_id = self.channel_id(&destination.into()).await?;
        self.inner.http.logs_from(&token, &channel_id, query).await
    }

    // ── State queries ───────────────────────────────────────────────────

    /// Run `f` against the store under its read lock.
    ///
    /// Do not call back into the client from `f`.
    pub fn with_state<R>(&self, f: impl FnOnce(&ConnectionState) -> R) -> R {
        f(&self.inner.store.read())
    }

    /// The logged-in user, once READY has arrived.
    pub fn user(&self) -> Option<User> {
        self.inner.store.read().user().cloned()
    }

    /// Servers the user is in.
    pub fn servers(&self) -> Vec<Server> {
        self.inner.store.read().servers().to_vec()
    }

    /// Open private channels.
    pub fn private_channels(&self) -> Vec<PrivateChannel> {
        self.inner.store.read().private_channels().to_vec()
    }

    /// Cached messages, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.inner.store.read().messages().iter().cloned().collect()
    }

    /// A server or private channel by id.
    pub fn get_channel(&self, channel_id: &str) -> Option<AnyChannel> {
        self.inner.store.read().get_channel(channel_id)
    }

    /// Every server channel.
    pub fn all_channels(&self) -> Vec<Channel> {
        self.inner.store.read().all_channels().cloned().collect()
    }

    /// Every member of every server.
    pub fn all_members(&self) -> Vec<Member> {
        self.inner.store.read().all_members().cloned().collect()
    }

    /// Email used to log in.
    pub fn email(&self) -> Option<String> {
        self.inner.session.lock().email.clone()
    }

    /// Streaming endpoint from the last discovery.
    pub fn gateway(&self) -> Option<String> {
        self.inner.session.lock().gateway.clone()
    }

    /// Heartbeat interval from the last READY.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.inner.session.lock().heartbeat_interval
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.inner.session.lock().phase
    }

    /// A token is held.
    pub fn is_logged_in(&self) -> bool {
        self.inner.session.lock().token.is_some()
    }

    /// A stream was open and has ended.
    pub fn is_closed(&self) -> bool {
        self.phase() == Phase::Closed
    }

    /// REST endpoints in use, for building avatar and icon URLs.
    pub fn endpoints(&self) -> &Endpoints {
        self.inner.http.endpoints()
    }
}

/// Keep-alive period from a READY payload. Any positive number of
/// milliseconds is accepted, fractional ones included.
fn ready_heartbeat_interval(ready: &Value) -> Option<Duration> {
    let ms = ready.get("heartbeat_interval")?.as_f64()?;
    if ms <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(ms / 1000.0).ok()
}

/// Releases the session's connection slot when `connect` finishes or its
/// future is dropped.
struct ConnectionGuard {
    inner: Arc<Inner>,
    shutdown: CancellationToken,
    done: Option<oneshot::Sender<()>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        {
            let mut session = self.inner.session.lock();
            session.connection = None;
            if session.phase.is_open() {
                session.phase = Phase::Closed;
            }
        }
        self.shutdown.cancel();
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("phase", &self.phase())
            .field("api", &self.endpoints().base())
            .field("dispatcher", &self.inner.dispatcher)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
