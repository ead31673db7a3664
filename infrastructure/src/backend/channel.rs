//! Reconnecting transport channel.
//!
//! A [`TransportChannel`] owns one connection obtained from a [`Connector`].
//! A background supervisor task owns the read half and forwards every frame,
//! in order, to the receiver returned by [`TransportChannel::connect`]. When
//! the connection drops unexpectedly the supervisor reconnects with
//! exponential backoff; once [`ReconnectPolicy::max_attempts`] attempts have
//! failed the channel becomes [`ChannelState::Disconnected`] for good.
//!
//! Frames that were in flight when the connection dropped are not resent.
//! Callers re-establish session context on [`ChannelEvent::Reconnected`].

use super::connector::{BoxedReader, BoxedWriter, Connection, Connector};
use super::error::{Result, TransportError};
use super::framing::{FrameFormat, read_frame, write_frame};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Capacity of the ordered event queue between supervisor and consumer.
const EVENT_BUFFER: usize = 256;

/// Backoff schedule for unexpected disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the 1-based `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connected,
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted, or the channel was closed. Terminal.
    Disconnected,
}

/// Everything the supervisor reports, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Frame(Vec<u8>),
    Reconnected,
    Disconnected,
}

/// State shared between the channel handle and its supervisor task.
struct Shared {
    target: String,
    format: FrameFormat,
    writer: Mutex<Option<BoxedWriter>>,
    state: watch::Sender<ChannelState>,
    shutdown: CancellationToken,
}

impl Shared {
    async fn drop_writer(&self) {
        self.writer.lock().await.take();
    }
}

pub struct TransportChannel {
    shared: Arc<Shared>,
}

impl TransportChannel {
    /// Connect once and start the supervisor.
    ///
    /// A failed initial connect is returned immediately; the backoff loop
    /// only covers disconnects after a connection was established.
    pub async fn connect(
        connector: Arc<dyn Connector>,
        format: FrameFormat,
        policy: ReconnectPolicy,
    ) -> Result<(Arc<Self>, mpsc::Receiver<ChannelEvent>)> {
        let target = connector.target();
        let Connection {
            reader,
            writer,
            child,
        } = connector.connect().await?;
        info!(target = %target, framing = %format, "Transport connected");

        let (state, _) = watch::channel(ChannelState::Connected);
        let shared = Arc::new(Shared {
            target,
            format,
            writer: Mutex::new(Some(writer)),
            state,
            shutdown: CancellationToken::new(),
        });

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let supervisor = Supervisor {
            connector,
            policy,
            shared: Arc::clone(&shared),
            events: events_tx,
        };
        tokio::spawn(supervisor.run(reader, child));

        Ok((Arc::new(Self { shared }), events_rx))
    }

    pub fn target(&self) -> &str {
        &self.shared.target
    }

    pub fn format(&self) -> FrameFormat {
        self.shared.format
    }

    /// Watch the connection state.
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    pub fn current_state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    /// Write one frame. Fails with [`TransportError::NotConnected`] unless
    /// connected; frames are never queued across a reconnect.
    pub async fn send(&self, body: &[u8]) -> Result<()> {
        if self.current_state() != ChannelState::Connected {
            return Err(TransportError::NotConnected);
        }
        let mut writer = self.shared.writer.lock().await;
        let Some(w) = writer.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        trace!("Transport sending {} bytes", body.len());
        write_frame(w, self.shared.format, body).await?;
        Ok(())
    }

    /// Close the channel. The supervisor stops and no reconnect is attempted.
    pub async fn close(&self) {
        self.shared.shutdown.cancel();
        self.shared.drop_writer().await;
        self.shared.state.send_replace(ChannelState::Disconnected);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }
}

impl Drop for TransportChannel {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

/// Why a read loop ended.
enum ReadEnd {
    Lost,
    Shutdown,
    ConsumerGone,
}

struct Supervisor {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    events: mpsc::Sender<ChannelEvent>,
}

impl Supervisor {
    async fn run(self, reader: BoxedReader, child: Option<Child>) {
        let mut reader = reader;
        // A spawned backend lives exactly as long as its connection.
        let mut child_guard = child;

        loop {
            match self.read_until_lost(reader).await {
                ReadEnd::Shutdown | ReadEnd::ConsumerGone => {
                    debug!("Transport supervisor stopping");
                    self.shared.shutdown.cancel();
                    self.shared.drop_writer().await;
                    self.shared.state.send_replace(ChannelState::Disconnected);
                    return;
                }
                ReadEnd::Lost => {}
            }

            self.shared.drop_writer().await;
            drop(child_guard.take());

            match self.reconnect().await {
                Some(connection) => {
                    *self.shared.writer.lock().await = Some(connection.writer);
                    reader = connection.reader;
                    child_guard = connection.child;
                    self.shared.state.send_replace(ChannelState::Connected);
                    if self.events.send(ChannelEvent::Reconnected).await.is_err() {
                        return;
                    }
                }
                None => {
                    self.shared.drop_writer().await;
                    self.shared.state.send_replace(ChannelState::Disconnected);
                    let _ = self.events.send(ChannelEvent::Disconnected).await;
                    return;
                }
            }
        }
    }

    async fn read_until_lost(&self, reader: BoxedReader) -> ReadEnd {
        let mut reader = BufReader::new(reader);
        loop {
            let frame = tokio::select! {
                _ = self.shared.shutdown.cancelled() => return ReadEnd::Shutdown,
                frame = read_frame(&mut reader, self.shared.format) => frame,
            };
            match frame {
                Ok(Some(body)) => {
                    if self.events.send(ChannelEvent::Frame(body)).await.is_err() {
                        return ReadEnd::ConsumerGone;
                    }
                }
                Ok(None) => {
                    warn!(target = %self.shared.target, "Transport closed by peer");
                    return ReadEnd::Lost;
                }
                Err(e) => {
                    warn!(target = %self.shared.target, error = %e, "Transport read failed");
                    return ReadEnd::Lost;
                }
            }
        }
    }

    async fn reconnect(&self) -> Option<Connection> {
        for attempt in 1..=self.policy.max_attempts {
            let delay = self.policy.delay_for(attempt);
            self.shared
                .state
                .send_replace(ChannelState::Reconnecting { attempt });
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                target = %self.shared.target,
                "Connection lost, reconnecting"
            );

            tokio::select! {
                _ = self.shared.shutdown.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.connector.connect().await {
                Ok(connection) => {
                    info!(attempt, target = %self.shared.target, "Transport reconnected");
                    return Some(connection);
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Reconnect attempt failed");
                }
            }
        }

        error!(
            attempts = self.policy.max_attempts,
            target = %self.shared.target,
            "Reconnect attempts exhausted, giving up"
        );
        None
    }
}
