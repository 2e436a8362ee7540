//! Connection Manager
//!
//! Owns the one live WebSocket channel to the auction server, reconnects
//! after every close with a fixed delay, and feeds raw inbound frames into
//! the session event queue tagged with a connection generation.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    mpsc, Arc,
};
use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc::UnboundedReceiver, mpsc::UnboundedSender, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::event::{ConnectionEvent, Event, Generation};

/// Fixed delay between a channel going down and the next connect attempt.
///
/// Unconditional and unbounded on purpose: in a live auction eventual
/// reconnection matters more than connection-storm avoidance.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Not connected to the auction server")]
pub struct NotConnected;

/// Channel connectivity as seen by everyone but the manager itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// The outbound seam between the Reconciler and the transport.
pub trait AuctionChannel {
    fn state(&self) -> ConnectionState;

    /// Transmit a payload on the currently open channel, or fail. No
    /// buffering, no retry; the caller surfaces the failure to the user.
    fn send(&self, payload: String) -> Result<(), NotConnected>;

    /// Whether `generation` is still the current channel. Events tagged
    /// with a superseded generation must be discarded, not applied.
    fn is_current(&self, generation: Generation) -> bool;
}

pub type SharedAuctionChannel = Arc<dyn AuctionChannel + Send + Sync + 'static>;

struct Inner {
    state: Mutex<ConnectionState>,
    outbound: Mutex<Option<UnboundedSender<String>>>,
    generation: AtomicU64,
    shutdown: watch::Sender<bool>,
}

/// Maintains connectivity to a single logical endpoint on a private tokio
/// runtime. Exactly one channel is current at a time; a superseded channel
/// can neither re-trigger reconnect logic (only the supervisor loop
/// schedules reconnects) nor sneak events past the generation check.
pub struct ConnectionManager {
    inner: Arc<Inner>,
    // cancels all transport tasks on drop
    runtime: Option<tokio::runtime::Runtime>,
}

impl ConnectionManager {
    /// Open (and keep reopening) the channel, delivering events to `events`.
    pub fn spawn(config: &Config, events: mpsc::Sender<Event>) -> Result<Self> {
        let runtime = tokio::runtime::Runtime::new()?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let inner = Arc::new(Inner {
            state: Mutex::new(ConnectionState::Disconnected),
            outbound: Mutex::new(None),
            generation: AtomicU64::new(0),
            shutdown,
        });

        runtime.spawn(run_supervisor(
            inner.clone(),
            config.endpoint.clone(),
            events,
            shutdown_rx,
        ));

        Ok(Self {
            inner,
            runtime: Some(runtime),
        })
    }

    pub fn generation(&self) -> Generation {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Stop reconnecting and close the open channel, if any. Idempotent and
    /// safe to call with no channel open.
    pub fn close(&self) {
        let _ = self.inner.shutdown.send(true);
        *self.inner.outbound.lock() = None;
        *self.inner.state.lock() = ConnectionState::Disconnected;
    }
}

impl AuctionChannel for ConnectionManager {
    fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    fn send(&self, payload: String) -> Result<(), NotConnected> {
        let outbound = self.inner.outbound.lock();
        let tx = outbound.as_ref().ok_or(NotConnected)?;
        tx.send(payload).map_err(|_| NotConnected)
    }

    fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn run_supervisor(
    inner: Arc<Inner>,
    endpoint: String,
    events: mpsc::Sender<Event>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let connected = tokio::select! {
            _ = shutdown.changed() => break,
            res = connect_async(endpoint.as_str()) => res,
        };

        match connected {
            Ok((stream, _response)) => {
                info!(%endpoint, generation, "connected");
                let (outbound_tx, outbound_rx) = tokio::sync::mpsc::unbounded_channel();
                *inner.outbound.lock() = Some(outbound_tx);
                *inner.state.lock() = ConnectionState::Connected;
                let _ = events.send(Event {
                    generation,
                    details: ConnectionEvent::Open,
                });

                run_channel(stream, outbound_rx, &events, generation, &mut shutdown).await;

                *inner.outbound.lock() = None;
                *inner.state.lock() = ConnectionState::Disconnected;
                let _ = events.send(Event {
                    generation,
                    details: ConnectionEvent::Closed,
                });
                info!(generation, "channel closed");
            }
            Err(e) => {
                warn!(%endpoint, generation, error = %e, "connect failed");
                let _ = events.send(Event {
                    generation,
                    details: ConnectionEvent::Error(e.to_string()),
                });
            }
        }

        if *shutdown.borrow() {
            break;
        }
        debug!(delay_ms = RECONNECT_DELAY.as_millis() as u64, "reconnecting");
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

/// Drive one channel until it goes down, for whatever reason.
async fn run_channel(
    stream: WsStream,
    mut outbound: UnboundedReceiver<String>,
    events: &mpsc::Sender<Event>,
    generation: Generation,
    shutdown: &mut watch::Receiver<bool>,
) {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            payload = outbound.recv() => match payload {
                Some(payload) => {
                    if let Err(e) = write.send(Message::text(payload)).await {
                        warn!(generation, error = %e, "send failed");
                        break;
                    }
                }
                // outbound sender dropped by `close()`
                None => break,
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(Event {
                        generation,
                        details: ConnectionEvent::Message(text.to_string()),
                    });
                }
                Some(Ok(Message::Close(_))) | None => break,
                // ping/pong handled by tungstenite; binary not part of the protocol
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    // the transport always closes after an error
                    let _ = events.send(Event {
                        generation,
                        details: ConnectionEvent::Error(e.to_string()),
                    });
                    break;
                }
            }
        }
    }
}
