//! Event dispatch: state mutation first, then the user callback.
//!
//! Each dispatched frame runs its state mutation inline, in arrival order,
//! under the store's write lock. The callback registered for the event, if
//! any, is then spawned as an independent task. Callback failures (errors
//! and panics) are routed to the error hook and never reach the receive loop.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt as _;
use parking_lot::{Mutex, RwLock};
use parley_core::EventKind;
use parley_state::ConnectionState;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, warn};

/// A dispatched event as seen by callbacks.
#[derive(Clone, Debug)]
pub struct Event {
    kind: EventKind,
    payload: Arc<Value>,
}

impl Event {
    /// Wrap a payload.
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            kind,
            payload: Arc::new(payload),
        }
    }

    /// Which event this is.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Lowercase event identifier.
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Raw payload. For `socket_response` this is the whole frame.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Deserialize the payload into a model type.
    pub fn parse<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(self.payload.as_ref())
    }
}

/// An async event callback.
///
/// Implemented for any `Fn(Event) -> impl Future<Output = anyhow::Result<()>>`.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one event.
    async fn handle(&self, event: Event) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> EventHandler for F
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: Event) -> anyhow::Result<()> {
        self(event).await
    }
}

/// Why a callback failed.
#[derive(Debug)]
pub enum HandlerFailure {
    /// The callback returned an error.
    Error(anyhow::Error),
    /// The callback panicked; the panic message, if it had one.
    Panic(String),
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e:#}"),
            Self::Panic(msg) => write!(f, "handler panicked: {msg}"),
        }
    }
}

/// Receives callback failures together with the event that triggered them.
///
/// Implemented for any `Fn(Event, HandlerFailure) -> impl Future<Output =
/// anyhow::Result<()>>`. An error returned from the hook is logged and ends
/// that callback task only.
#[async_trait]
pub trait ErrorHook: Send + Sync + 'static {
    /// Handle a failed callback.
    async fn on_error(&self, event: Event, failure: HandlerFailure) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> ErrorHook for F
where
    F: Fn(Event, HandlerFailure) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn on_error(&self, event: Event, failure: HandlerFailure) -> anyhow::Result<()> {
        self(event, failure).await
    }
}

/// Prints the failing handler's name and the failure to stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultErrorHook;

#[async_trait]
impl ErrorHook for DefaultErrorHook {
    async fn on_error(&self, event: Event, failure: HandlerFailure) -> anyhow::Result<()> {
        eprintln!("Ignoring exception in {}", event.kind().handler_name());
        match failure {
            HandlerFailure::Error(e) => eprintln!("{e:?}"),
            HandlerFailure::Panic(msg) => eprintln!("panicked: {msg}"),
        }
        Ok(())
    }
}

/// What a single [`Dispatcher::dispatch`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// The state mutation succeeded.
    pub applied: bool,
    /// A callback task was spawned.
    pub scheduled: bool,
}

/// Routes events to the store and to registered callbacks.
pub struct Dispatcher {
    handlers: RwLock<HashMap<EventKind, Arc<dyn EventHandler>>>,
    error_hook: RwLock<Arc<dyn ErrorHook>>,
    callbacks: CallbackTracker,
}

impl Dispatcher {
    /// Create a dispatcher with no callbacks and the default error hook.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            error_hook: RwLock::new(Arc::new(DefaultErrorHook)),
            callbacks: CallbackTracker::default(),
        }
    }

    /// Install the callback for `kind`, replacing any previous one.
    pub fn register(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        if self.handlers.write().insert(kind, handler).is_some() {
            debug!(event = %kind, "replaced event handler");
        }
    }

    /// Replace the error hook.
    pub fn set_error_hook(&self, hook: Arc<dyn ErrorHook>) {
        *self.error_hook.write() = hook;
    }

    /// Whether a callback is registered for `kind`.
    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.handlers.read().contains_key(&kind)
    }

    /// Apply `payload` to the store, then schedule the callback for `kind`.
    ///
    /// A failing mutation is logged and does not stop the callback.
    pub fn dispatch(
        &self,
        store: &RwLock<ConnectionState>,
        kind: EventKind,
        payload: Value,
    ) -> DispatchReport {
        debug!(event = %kind, "dispatching event");
        let applied = match store.write().apply(kind, &payload) {
            Ok(()) => true,
            Err(e) => {
                warn!(event = %kind, error = %e, "state mutation failed, continuing");
                false
            }
        };
        let scheduled = self.schedule(Event::new(kind, payload));
        DispatchReport { applied, scheduled }
    }

    /// Hand a full decoded frame to the `socket_response` callback.
    pub fn emit_raw(&self, frame: Value) -> bool {
        self.schedule(Event::new(EventKind::SocketResponse, frame))
    }

    /// Callback tasks spawned and not yet finished.
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.pending()
    }

    /// Wait until every callback spawned so far, and any they trigger, has
    /// finished.
    pub async fn wait_for_callbacks(&self) {
        self.callbacks.drain().await;
    }

    fn schedule(&self, event: Event) -> bool {
        let Some(handler) = self.handlers.read().get(&event.kind).cloned() else {
            return false;
        };
        let hook = Arc::clone(&self.error_hook.read());
        self.callbacks.spawn(run_callback(handler, hook, event));
        true
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut registered: Vec<&'static str> =
            self.handlers.read().keys().map(|k| k.as_str()).collect();
        registered.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("registered", &registered)
            .field("pending_callbacks", &self.pending_callbacks())
            .finish_non_exhaustive()
    }
}

/// Run one callback inside its fault boundary.
async fn run_callback(handler: Arc<dyn EventHandler>, hook: Arc<dyn ErrorHook>, event: Event) {
    let outcome = AssertUnwindSafe(handler.handle(event.clone()))
        .catch_unwind()
        .await;
    let failure = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => HandlerFailure::Error(e),
        Err(panic) => HandlerFailure::Panic(panic_message(panic.as_ref())),
    };
    debug!(event = %event.kind, error = %failure, "event handler failed");

    let name = event.kind.handler_name();
    if let Err(e) = hook.on_error(event, failure).await {
        error!(handler = %name, error = %e, "error hook failed");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Tracks fire-and-forget callback tasks so they can be drained.
///
/// Tasks are never aborted: dropping the tracker detaches whatever is still
/// running.
#[derive(Default)]
struct CallbackTracker {
    tasks: Mutex<JoinSet<()>>,
}

impl CallbackTracker {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        while let Some(result) = tasks.try_join_next() {
            log_join(result);
        }
        let _ = tasks.spawn(future);
    }

    fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock();
        while let Some(result) = tasks.try_join_next() {
            log_join(result);
        }
        tasks.len()
    }

    async fn drain(&self) {
        loop {
            let mut batch = Detached(std::mem::take(&mut *self.tasks.lock()));
            if batch.0.is_empty() {
                return;
            }
            while let Some(result) = batch.0.join_next().await {
                log_join(result);
            }
        }
    }
}

impl Drop for CallbackTracker {
    fn drop(&mut self) {
        self.tasks.get_mut().detach_all();
    }
}

/// A batch being drained; detaches its tasks if the drain is abandoned.
struct Detached(JoinSet<()>);

impl Drop for Detached {
    fn drop(&mut self) {
        self.0.detach_all();
    }
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "callback task panicked outside its fault boundary");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
