//! # Price stream
//! Persistent WebSocket subscription to a crypto price feed with automatic,
//! fixed-delay reconnect.
//!
//! State machine (published through a `watch` channel):
//!
//! ```text
//!   Connecting ──open──▶ Live ──error/close──▶ Error ──delay──▶ Connecting
//!        ▲                                                        │
//!        └───────────────── resume ◀── Offline ◀── pause (any) ───┘
//! ```
//!
//! - Reconnect uses a constant delay (default 5 s) and retries forever.
//! - `pause()` sends a Close frame, drops the socket, cancels a pending
//!   reconnect and parks the task in `Offline` until `resume()`.
//! - The socket is owned by the task and dropped before any new attempt, so at
//!   most one subscription exists at a time.
//!
//! The transport sits behind `PriceConnector`/`PriceSocket` so the state machine
//! is independent of tungstenite.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use metrics::counter;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::market::{MarketBoard, PriceQuote};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Live,
    Error,
    /// Paused by the user; no reconnect until resumed.
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Message(String),
    Error(String),
    Closed,
}

#[async_trait]
pub trait PriceSocket: Send {
    /// Next inbound event. Must be cancel safe.
    async fn next_event(&mut self) -> SocketEvent;

    /// Polite shutdown before the socket is dropped on pause.
    async fn close(&mut self) {}
}

#[async_trait]
pub trait PriceConnector: Send + Sync {
    async fn connect(&self) -> anyhow::Result<Box<dyn PriceSocket>>;
}

// ------------------------------------------------------------
// tungstenite transport
// ------------------------------------------------------------

pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl PriceConnector for WsConnector {
    async fn connect(&self) -> anyhow::Result<Box<dyn PriceSocket>> {
        let (ws, _) = connect_async(self.url.as_str()).await?;
        Ok(Box::new(WsSocket { ws }))
    }
}

struct WsSocket {
    ws: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

#[async_trait]
impl PriceSocket for WsSocket {
    async fn next_event(&mut self) -> SocketEvent {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return SocketEvent::Message(text.as_str().to_owned())
                }
                Some(Ok(Message::Close(_))) | None => return SocketEvent::Closed,
                // Ignore non-text frames (ping/pong/binary)
                Some(Ok(_)) => continue,
                Some(Err(e)) => return SocketEvent::Error(e.to_string()),
            }
        }
    }

    async fn close(&mut self) {
        match tokio::time::timeout(CLOSE_TIMEOUT, self.ws.close(None)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(target: "price_stream", error = %e, "close frame not delivered"),
            Err(_) => debug!(target: "price_stream", "close frame timed out"),
        }
    }
}

// ------------------------------------------------------------
// Message handling
// ------------------------------------------------------------

/// Apply one `{asset: price}` payload. Only subscribed assets with a parseable
/// price are written; everything else keeps its last value. Returns the number
/// of quotes updated.
pub fn apply_price_message(board: &MarketBoard, assets: &HashSet<String>, raw: &str) -> usize {
    let parsed: HashMap<String, serde_json::Value> = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "price message parse error");
            return 0;
        }
    };

    let updates: Vec<(String, PriceQuote)> = parsed
        .into_iter()
        .filter(|(asset, _)| assets.contains(asset))
        .filter_map(|(asset, v)| {
            let raw_price = match v {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            PriceQuote::from_raw(&raw_price).map(|q| (asset, q))
        })
        .collect();

    let n = updates.len();
    board.apply_quotes(updates);
    n
}

// ------------------------------------------------------------
// Manager
// ------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PriceStreamConfig {
    pub assets: Vec<String>,
    pub reconnect_delay: Duration,
}

impl Default for PriceStreamConfig {
    fn default() -> Self {
        Self {
            assets: vec!["bitcoin".to_string(), "ethereum".to_string()],
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

pub struct PriceStreamManager {
    paused_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl PriceStreamManager {
    /// Start the connection task; the first attempt begins immediately.
    pub fn spawn(
        connector: Arc<dyn PriceConnector>,
        board: MarketBoard,
        cfg: PriceStreamConfig,
    ) -> Self {
        let (paused_tx, paused_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let worker = Worker {
            connector,
            board,
            assets: cfg.assets.into_iter().collect(),
            delay: cfg.reconnect_delay,
            paused_rx,
            status_tx,
        };
        let task = tokio::spawn(worker.run());
        Self {
            paused_tx,
            status_rx,
            task,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Close the socket and stay offline until `resume`.
    pub fn pause(&self) {
        self.paused_tx.send_if_modified(|p| !std::mem::replace(p, true));
    }

    /// Reconnect immediately if paused; no-op otherwise.
    pub fn resume(&self) {
        self.paused_tx.send_if_modified(|p| std::mem::replace(p, false));
    }

    pub fn is_paused(&self) -> bool {
        *self.paused_tx.borrow()
    }

    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for PriceStreamManager {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum ReadEnd {
    Paused,
    Dropped,
    Shutdown,
}

struct Worker {
    connector: Arc<dyn PriceConnector>,
    board: MarketBoard,
    assets: HashSet<String>,
    delay: Duration,
    paused_rx: watch::Receiver<bool>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl Worker {
    fn set_status(&self, s: ConnectionStatus) {
        let prev = self.status_tx.send_replace(s);
        if prev != s {
            info!(target: "price_stream", from = ?prev, to = ?s, "connection status");
        }
    }

    async fn run(mut self) {
        loop {
            if *self.paused_rx.borrow_and_update() {
                self.set_status(ConnectionStatus::Offline);
                if self.paused_rx.wait_for(|paused| !*paused).await.is_err() {
                    return;
                }
                continue;
            }

            self.set_status(ConnectionStatus::Connecting);
            counter!("price_ws_reconnects_total").increment(1);

            let attempt = tokio::select! {
                res = self.connector.connect() => res,
                changed = self.paused_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    continue;
                }
            };

            match attempt {
                Ok(mut socket) => {
                    self.set_status(ConnectionStatus::Live);
                    let end = self.read_loop(socket.as_mut()).await;
                    if matches!(end, ReadEnd::Paused) {
                        socket.close().await;
                    }
                    drop(socket);
                    match end {
                        ReadEnd::Paused => continue,
                        ReadEnd::Shutdown => return,
                        ReadEnd::Dropped => {}
                    }
                }
                Err(e) => {
                    warn!(target: "price_stream", error = %e, "price stream connect failed");
                    self.set_status(ConnectionStatus::Error);
                }
            }

            debug!(target: "price_stream", delay = ?self.delay, "reconnect scheduled");
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                changed = self.paused_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }

    async fn read_loop(&mut self, socket: &mut dyn PriceSocket) -> ReadEnd {
        loop {
            tokio::select! {
                ev = socket.next_event() => match ev {
                    SocketEvent::Message(text) => {
                        counter!("price_ws_messages_total").increment(1);
                        apply_price_message(&self.board, &self.assets, &text);
                    }
                    SocketEvent::Error(e) => {
                        warn!(target: "price_stream", error = %e, "price stream socket error");
                        self.set_status(ConnectionStatus::Error);
                        return ReadEnd::Dropped;
                    }
                    SocketEvent::Closed => {
                        info!(target: "price_stream", "price stream closed by peer");
                        self.set_status(ConnectionStatus::Error);
                        return ReadEnd::Dropped;
                    }
                },
                changed = self.paused_rx.changed() => {
                    if changed.is_err() {
                        return ReadEnd::Shutdown;
                    }
                    if *self.paused_rx.borrow() {
                        return ReadEnd::Paused;
                    }
                }
            }
        }
    }
}
