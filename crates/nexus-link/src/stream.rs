//! Live stream channel to the backend, with bounded reconnection.
//!
//! [`StreamClient::connect`] spawns one connection cycle on the current tokio
//! runtime. The cycle connects, pumps frames until the socket drops, then
//! waits out the reconnect interval and tries again until the policy gives
//! up or the client disconnects. Everything observable is reported on the
//! event receiver returned by [`StreamClient::new`]; the current state is
//! also published on a watch channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use nexus_core::{ConnectionState, StreamMessage};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_WS_URL;
use crate::error::LinkError;
use crate::reconnect::ReconnectPolicy;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Clone, Debug, PartialEq)]
pub struct StreamConfig {
    pub url: String,
    /// Disabled means no network activity at all
    pub enabled: bool,
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            enabled: true,
            reconnect_interval: Duration::from_millis(3000),
            max_reconnect_attempts: 10,
        }
    }
}

#[derive(Debug)]
pub enum StreamEvent {
    Opened,
    Message(StreamMessage),
    /// A connect failure, a socket error, a peer close
    /// ([`LinkError::ChannelClosed`]) or a malformed frame. The channel stays
    /// up for malformed frames.
    Error(LinkError),
    /// The socket is gone. `reconnect_in` is set when another attempt is
    /// scheduled; `attempt` is that attempt's number.
    Closed {
        reconnect_in: Option<Duration>,
        attempt: u32,
    },
    /// Reconnection exhausted; only a manual `connect()` restarts the channel.
    GaveUp { attempts: u32 },
}

struct Cycle {
    cancel: CancellationToken,
    outgoing: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

/// State and event outlets shared by the client and its cycles.
///
/// Every `connect()` and `disconnect()` advances the generation. A cycle
/// publishes only while its generation is current, so a cancelled cycle
/// still winding down can never overwrite its successor.
struct Outlet {
    generation: Mutex<u64>,
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<StreamEvent>,
}

impl Outlet {
    fn new(events: mpsc::UnboundedSender<StreamEvent>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Closed);
        Self {
            generation: Mutex::new(0),
            state,
            events,
        }
    }

    fn generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Retire every earlier cycle and publish `state`.
    fn advance(&self, state: ConnectionState) -> u64 {
        let mut generation = self.generation();
        *generation += 1;
        self.state.send_replace(state);
        *generation
    }
}

/// One cycle's handle on the [`Outlet`].
struct Publisher {
    outlet: Arc<Outlet>,
    generation: u64,
}

impl Publisher {
    fn start(outlet: &Arc<Outlet>, state: ConnectionState) -> Self {
        Self {
            generation: outlet.advance(state),
            outlet: Arc::clone(outlet),
        }
    }

    fn state(&self, state: ConnectionState) {
        let current = self.outlet.generation();
        if *current == self.generation {
            self.outlet.state.send_replace(state);
        }
    }

    fn event(&self, event: StreamEvent) {
        let current = self.outlet.generation();
        if *current == self.generation {
            let _ = self.outlet.events.send(event);
        }
    }
}

pub struct StreamClient {
    config: StreamConfig,
    outlet: Arc<Outlet>,
    cycle: Option<Cycle>,
}

impl StreamClient {
    pub fn new(config: StreamConfig) -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let client = Self {
            config,
            outlet: Arc::new(Outlet::new(events)),
            cycle: None,
        };
        (client, rx)
    }

    /// Start a connection cycle with the attempt counter at zero. A no-op
    /// while a cycle is running or when the channel is disabled.
    pub fn connect(&mut self) {
        if !self.config.enabled {
            debug!("stream channel disabled, not connecting");
            return;
        }
        if self.is_running() {
            return;
        }

        let cancel = CancellationToken::new();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let publisher = Publisher::start(&self.outlet, ConnectionState::Connecting);
        let task = tokio::spawn(run_cycle(
            self.config.clone(),
            cancel.clone(),
            publisher,
            outgoing_rx,
        ));
        self.cycle = Some(Cycle {
            cancel,
            outgoing,
            task,
        });
    }

    /// Serialize and send `message`. Returns false, without queueing, unless
    /// the channel is open.
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        if self.state() != ConnectionState::Open {
            return false;
        }
        let Some(cycle) = self.cycle.as_ref() else {
            return false;
        };
        match serde_json::to_string(message) {
            Ok(text) => cycle.outgoing.send(text).is_ok(),
            Err(e) => {
                warn!(error = %e, "cannot serialize outgoing stream message");
                false
            }
        }
    }

    /// Cancel any pending reconnect and close the channel. Idempotent.
    ///
    /// The running cycle is silenced before this returns, so the `Closed`
    /// event sent here is the last one it produces.
    pub fn disconnect(&mut self) {
        if let Some(cycle) = self.cycle.take() {
            let was_running = !cycle.task.is_finished();
            self.outlet.advance(ConnectionState::Closed);
            cycle.cancel.cancel();
            if was_running {
                let _ = self.outlet.events.send(StreamEvent::Closed {
                    reconnect_in: None,
                    attempt: 0,
                });
            }
            info!("stream channel disconnected");
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.outlet.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.outlet.state.subscribe()
    }

    /// A cycle is connecting, open or waiting to reconnect.
    pub fn is_running(&self) -> bool {
        self.cycle.as_ref().is_some_and(|c| !c.task.is_finished())
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(cycle) = self.cycle.take() {
            self.outlet.advance(ConnectionState::Closed);
            cycle.cancel.cancel();
        }
    }
}

// --- Connection cycle ---

enum PumpEnd {
    Cancelled,
    Dropped,
}

async fn run_cycle(
    config: StreamConfig,
    cancel: CancellationToken,
    publisher: Publisher,
    mut outgoing: mpsc::UnboundedReceiver<String>,
) {
    let mut policy = ReconnectPolicy::new(config.reconnect_interval, config.max_reconnect_attempts);

    loop {
        publisher.state(ConnectionState::Connecting);
        debug!(url = %config.url, attempt = policy.attempts(), "connecting stream channel");

        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = connect_async(config.url.as_str()) => result,
        };

        match connected {
            Ok((socket, _)) => {
                policy.on_open();
                publisher.state(ConnectionState::Open);
                info!(url = %config.url, "stream channel open");
                publisher.event(StreamEvent::Opened);

                let end = pump(socket, &cancel, &publisher, &mut outgoing).await;
                publisher.state(ConnectionState::Closed);
                // nothing written while closed is carried over to the next socket
                while outgoing.try_recv().is_ok() {}
                if matches!(end, PumpEnd::Cancelled) {
                    break;
                }
            }
            Err(e) => {
                publisher.state(ConnectionState::Closed);
                warn!(url = %config.url, error = %e, "stream channel connect failed");
                publisher.event(StreamEvent::Error(LinkError::Channel(e)));
            }
        }

        match policy.on_close() {
            Some(delay) => {
                debug!(attempt = policy.attempts(), ?delay, "scheduling stream reconnect");
                publisher.event(StreamEvent::Closed {
                    reconnect_in: Some(delay),
                    attempt: policy.attempts(),
                });
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => {
                warn!(attempts = policy.attempts(), "stream reconnection exhausted");
                publisher.event(StreamEvent::Closed {
                    reconnect_in: None,
                    attempt: policy.attempts(),
                });
                publisher.event(StreamEvent::GaveUp {
                    attempts: policy.attempts(),
                });
                return;
            }
        }
    }

    // disconnect() has already published the closed state
    debug!(url = %config.url, "stream cycle cancelled");
}

async fn pump(
    socket: Socket,
    cancel: &CancellationToken,
    publisher: &Publisher,
    outgoing: &mut mpsc::UnboundedReceiver<String>,
) -> PumpEnd {
    let (mut sink, mut frames) = socket.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return PumpEnd::Cancelled;
            }
            Some(text) = outgoing.recv() => {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    publisher.event(StreamEvent::Error(LinkError::Channel(e)));
                    return PumpEnd::Dropped;
                }
            }
            frame = frames.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        deliver(publisher, serde_json::from_str(text.as_str()));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        deliver(publisher, serde_json::from_slice(&bytes));
                    }
                    Some(Ok(Message::Close(reason))) => {
                        debug!(?reason, "stream channel closed by peer");
                        publisher.event(StreamEvent::Error(LinkError::ChannelClosed));
                        return PumpEnd::Dropped;
                    }
                    // ping/pong are answered by the transport
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "stream channel error");
                        publisher.event(StreamEvent::Error(LinkError::Channel(e)));
                        return PumpEnd::Dropped;
                    }
                    None => {
                        publisher.event(StreamEvent::Error(LinkError::ChannelClosed));
                        return PumpEnd::Dropped;
                    }
                }
            }
        }
    }
}

fn deliver(publisher: &Publisher, parsed: serde_json::Result<StreamMessage>) {
    match parsed {
        Ok(message) => {
            debug!(kind = %message.kind, "stream message");
            publisher.event(StreamEvent::Message(message));
        }
        Err(e) => {
            warn!(error = %e, "dropping malformed stream message");
            publisher.event(StreamEvent::Error(LinkError::MalformedMessage(e)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_never_connects() {
        let (mut client, mut rx) = StreamClient::new(StreamConfig {
            enabled: false,
            ..StreamConfig::default()
        });
        client.connect();
        assert!(!client.is_running());
        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(!client.send(&serde_json::json!({"type": "ping"})));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (mut client, _rx) = StreamClient::new(StreamConfig::default());
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_deliver_reports_malformed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outlet = Arc::new(Outlet::new(tx));
        let publisher = Publisher::start(&outlet, ConnectionState::Open);
        deliver(&publisher, serde_json::from_str("{not json"));
        deliver(&publisher, serde_json::from_str(r#"{"type":"heartbeat"}"#));
        assert!(matches!(
            rx.try_recv().unwrap(),
            StreamEvent::Error(LinkError::MalformedMessage(_))
        ));
        match rx.try_recv().unwrap() {
            StreamEvent::Message(m) => assert_eq!(m.kind, "heartbeat"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_retired_cycle_is_silent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outlet = Arc::new(Outlet::new(tx));
        let old = Publisher::start(&outlet, ConnectionState::Connecting);
        let new = Publisher::start(&outlet, ConnectionState::Connecting);

        new.state(ConnectionState::Open);
        new.event(StreamEvent::Opened);
        // the retired cycle winding down after its successor opened
        old.state(ConnectionState::Closed);
        old.event(StreamEvent::Closed {
            reconnect_in: None,
            attempt: 0,
        });

        assert_eq!(*outlet.state.borrow(), ConnectionState::Open);
        assert!(matches!(rx.try_recv().unwrap(), StreamEvent::Opened));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_advance_retires_current_publisher() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outlet = Arc::new(Outlet::new(tx));
        let publisher = Publisher::start(&outlet, ConnectionState::Open);
        outlet.advance(ConnectionState::Closed);

        publisher.state(ConnectionState::Open);
        publisher.event(StreamEvent::Opened);
        assert_eq!(*outlet.state.borrow(), ConnectionState::Closed);
        assert!(rx.try_recv().is_err());
    }
}
