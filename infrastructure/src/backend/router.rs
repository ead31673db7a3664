//! Message routing on top of a [`TransportChannel`].
//!
//! A single background task consumes the channel's ordered event queue and
//! is the only place inbound frames are decoded:
//!
//! - **Responses** fulfil the `oneshot` registered by [`MessageRouter::request`].
//! - **`session.event`** notifications are decoded into [`ProtocolEvent`]s and
//!   forwarded to the current turn's sender for that session.
//! - **Requests from the backend** are answered with "method not found" so
//!   the peer never blocks waiting on us.
//! - **Reconnected**: pending requests fail (they are never resent) and
//!   `session.load` is re-sent for every known session.
//! - **Disconnected**: every open turn receives
//!   [`BackendError::Disconnected`] and the router stops.

use super::channel::{ChannelEvent, ChannelState, TransportChannel};
use super::decoder::{InboundFrame, decode_event, decode_frame};
use super::error::{Result, TransportError};
use super::protocol::{
    JsonRpcErrorOut, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, LoadSessionParams,
    METHOD_SESSION_LOAD, RequestIds,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tether_application::BackendError;
use tether_domain::ProtocolEvent;
use tether_domain::util::preview;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// Default timeout for request/response round trips.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sender half of a turn's event stream.
pub type TurnSender = mpsc::Sender<std::result::Result<ProtocolEvent, BackendError>>;

type PendingMap = HashMap<u64, oneshot::Sender<Result<JsonRpcResponse>>>;

/// State shared between the router handle and its background task.
struct RouterShared {
    channel: Arc<TransportChannel>,
    ids: RequestIds,
    pending: Mutex<PendingMap>,
    /// Current turn per session (session_id -> sender).
    routes: RwLock<HashMap<String, TurnSender>>,
    /// Known sessions and their working directory, for `session.load`.
    sessions: RwLock<HashMap<String, PathBuf>>,
    request_timeout: Duration,
    stopped: AtomicBool,
}

impl RouterShared {
    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let id = self.ids.next();
        let request = JsonRpcRequest::new(id, method, params);
        let body = serde_json::to_vec(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);

        if let Err(e) = self.channel.send(&body).await {
            self.forget(id);
            return Err(e);
        }
        trace!(id, method, "Request sent");

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response?.into_result(),
            Ok(Err(_)) => Err(TransportError::RouterStopped),
            Err(_) => {
                self.forget(id);
                Err(TransportError::Timeout(format!(
                    "{} timed out after {}s",
                    method,
                    self.request_timeout.as_secs()
                )))
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        let body = serde_json::to_vec(&notification)?;
        self.channel.send(&body).await
    }

    fn forget(&self, id: u64) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Fail every pending request.
    fn fail_pending(&self, make_error: impl Fn() -> TransportError) {
        let drained: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect();
        for (_, tx) in drained {
            let _ = tx.send(Err(make_error()));
        }
    }

    fn route_for(&self, session_id: &str) -> Option<TurnSender> {
        self.routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }
}

/// Router handle shared by the backend gateway.
pub struct MessageRouter {
    shared: Arc<RouterShared>,
}

impl MessageRouter {
    /// Start routing events from `channel`.
    pub fn spawn(
        channel: Arc<TransportChannel>,
        events: mpsc::Receiver<ChannelEvent>,
    ) -> Arc<Self> {
        Self::spawn_with_timeout(channel, events, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn spawn_with_timeout(
        channel: Arc<TransportChannel>,
        events: mpsc::Receiver<ChannelEvent>,
        request_timeout: Duration,
    ) -> Arc<Self> {
        let shared = Arc::new(RouterShared {
            channel,
            ids: RequestIds::new(),
            pending: Mutex::new(HashMap::new()),
            routes: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            request_timeout,
            stopped: AtomicBool::new(false),
        });
        tokio::spawn(Self::route_loop(Arc::clone(&shared), events));
        Arc::new(Self { shared })
    }

    pub fn channel(&self) -> &Arc<TransportChannel> {
        &self.shared.channel
    }

    pub fn channel_state(&self) -> ChannelState {
        self.shared.channel.current_state()
    }

    /// Whether the routing task has ended (transport gone for good).
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Send a request and wait for the correlated response's `result`.
    pub async fn request<P: Serialize>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<serde_json::Value> {
        let params = serde_json::to_value(params)?;
        self.shared.request(method, Some(params)).await
    }

    /// Send a notification (no response expected).
    pub async fn notify<P: Serialize>(&self, method: &str, params: &P) -> Result<()> {
        let params = serde_json::to_value(params)?;
        self.shared.notify(method, Some(params)).await
    }

    /// Remember a session so it is re-loaded after a reconnect.
    pub fn register_session(&self, session_id: &str, cwd: PathBuf) {
        self.shared
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.to_string(), cwd);
    }

    /// Route `session_id`'s events to `sender`, replacing any previous turn.
    pub fn open_turn(&self, session_id: &str, sender: TurnSender) {
        let previous = self
            .shared
            .routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.to_string(), sender);
        if previous.is_some() {
            debug!(session = session_id, "Router: replaced previous turn route");
        }
    }

    pub fn close_turn(&self, session_id: &str) {
        let mut routes = self
            .shared
            .routes
            .write()
            .unwrap_or_else(|e| e.into_inner());
        if routes.remove(session_id).is_some() {
            debug!(session = session_id, "Router: closed turn route");
        }
    }

    /// Background task, the single consumer of the channel's events.
    async fn route_loop(shared: Arc<RouterShared>, mut events: mpsc::Receiver<ChannelEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                ChannelEvent::Frame(bytes) => Self::route_frame(&shared, &bytes).await,
                ChannelEvent::Reconnected => Self::on_reconnected(&shared),
                ChannelEvent::Disconnected => break,
            }
        }

        info!("Router: transport gone, closing all turn streams");
        shared.stopped.store(true, Ordering::SeqCst);
        shared.fail_pending(|| TransportError::RouterStopped);
        let routes: Vec<TurnSender> = shared
            .routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, tx)| tx)
            .collect();
        for tx in routes {
            let _ = tx.send(Err(BackendError::Disconnected)).await;
        }
    }

    async fn route_frame(shared: &Arc<RouterShared>, bytes: &[u8]) {
        let frame = match decode_frame(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    error = %e,
                    frame = %preview(&String::from_utf8_lossy(bytes), 200),
                    "Router: dropping undecodable frame"
                );
                return;
            }
        };

        match frame {
            InboundFrame::Response { id, response } => {
                let sender = shared
                    .pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&id);
                match sender {
                    Some(tx) => {
                        let _ = tx.send(Ok(response));
                    }
                    None => debug!("Router: no pending receiver for response id={}", id),
                }
            }

            InboundFrame::SessionEvent { session_id, event } => {
                let event = match decode_event(event) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(
                            session = %session_id,
                            error = %e,
                            frame = %preview(&String::from_utf8_lossy(bytes), 200),
                            "Router: dropping undecodable event"
                        );
                        return;
                    }
                };
                if let ProtocolEvent::Unknown { raw } = &event {
                    debug!(
                        session = %session_id,
                        event_type = raw.get("type").and_then(|t| t.as_str()).unwrap_or(""),
                        "Router: unknown event type"
                    );
                }

                let Some(tx) = shared.route_for(&session_id) else {
                    debug!(
                        "Router: no turn open for session_id={}, dropping {}",
                        session_id,
                        event.type_name()
                    );
                    return;
                };
                if tx.send(Ok(event)).await.is_err() {
                    // Turn finished and dropped its stream.
                    let mut routes = shared.routes.write().unwrap_or_else(|e| e.into_inner());
                    if routes.get(&session_id).is_some_and(|current| current.is_closed()) {
                        routes.remove(&session_id);
                    }
                }
            }

            InboundFrame::IncomingRequest { id, method } => {
                warn!("Router: rejecting unsupported request method={}", method);
                let reply = JsonRpcErrorOut::method_not_found(id, &method);
                match serde_json::to_vec(&reply) {
                    Ok(body) => {
                        if let Err(e) = shared.channel.send(&body).await {
                            debug!(error = %e, "Router: failed to send error reply");
                        }
                    }
                    Err(e) => debug!(error = %e, "Router: failed to encode error reply"),
                }
            }

            InboundFrame::Notification { method } => {
                trace!("Router: ignoring notification method={}", method);
            }
        }
    }

    fn on_reconnected(shared: &Arc<RouterShared>) {
        shared.fail_pending(|| TransportError::Closed);

        let sessions: Vec<(String, PathBuf)> = shared
            .sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, cwd)| (id.clone(), cwd.clone()))
            .collect();

        for (session_id, cwd) in sessions {
            let shared = Arc::clone(shared);
            // Awaiting the response here would block the only task that can deliver it.
            tokio::spawn(async move {
                let params = LoadSessionParams {
                    session_id: session_id.clone(),
                    cwd: cwd.display().to_string(),
                };
                let result = match serde_json::to_value(&params) {
                    Ok(params) => shared.request(METHOD_SESSION_LOAD, Some(params)).await,
                    Err(e) => Err(e.into()),
                };
                match result {
                    Ok(_) => info!(session = %session_id, "Session reloaded after reconnect"),
                    Err(e) => warn!(session = %session_id, error = %e, "Session reload failed"),
                }
            });
        }
    }
}
