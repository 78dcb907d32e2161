//! `EventStreamClient` — persistent EventSub connection over `tokio-tungstenite`.
//!
//! Each [`EventStreamClient::connect`] call spawns one *driver* task that
//! exclusively owns the socket, runs the receive loop, and performs every
//! reconnect for that call. Protocol-requested and transport-triggered
//! reconnects therefore happen on the same task, one at a time. The
//! driver's cancellation token and join handle are swapped together under
//! one lock, and [`EventStreamClient::disconnect`] awaits the driver.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use eventsub_core::retry::ReconnectPolicy;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{ClientConfig, parse_endpoint};
use crate::dispatch::{Directive, Dispatcher};
use crate::envelope::SessionInfo;
use crate::errors::Result;
use crate::events::ClientEvent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Resilient client for a streaming event endpoint.
///
/// Failures below the public API are logged and retried with backoff;
/// nothing is returned to the caller. Dropping the client cancels the
/// active driver.
#[derive(Debug)]
pub struct EventStreamClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    target_url: Mutex<Url>,
    policy: ReconnectPolicy,
    attempts: AtomicU32,
    session: Arc<Mutex<Option<SessionInfo>>>,
    events: broadcast::Sender<ClientEvent>,
    driver: Mutex<Option<ActiveDriver>>,
    lifecycle: tokio::sync::Mutex<()>,
}

/// The driver task of the current `connect()` call.
#[derive(Debug)]
struct ActiveDriver {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Why a receive loop stopped.
#[derive(Debug)]
enum LoopExit {
    /// `disconnect()` or drop: no reconnect.
    Cancelled,
    /// Server sent a close frame or the stream ended.
    Closed,
    /// Socket-level error.
    Failed,
    /// `session_reconnect` carried a new endpoint.
    Redirected(Url),
}

enum OpenOutcome {
    Connected(Box<WsStream>),
    Failed,
    Cancelled,
}

impl EventStreamClient {
    /// Create a client. Fails only if the configured URL is not a WebSocket URL.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let url = parse_endpoint(&config.url)?;
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Ok(Self {
            inner: Arc::new(ClientInner {
                target_url: Mutex::new(url),
                policy: config.reconnect,
                attempts: AtomicU32::new(0),
                session: Arc::new(Mutex::new(None)),
                events,
                driver: Mutex::new(None),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Subscribe to lifecycle and notification events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Endpoint the next connection attempt will use.
    pub fn target_url(&self) -> Url {
        self.inner.target_url()
    }

    /// Consecutive failed attempts since the last successful connection.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Session announced by the current connection's welcome frame.
    pub fn session(&self) -> Option<SessionInfo> {
        self.inner.session.lock().clone()
    }

    /// Whether a driver is active (connected or waiting to reconnect).
    pub fn is_running(&self) -> bool {
        self.inner
            .driver
            .lock()
            .as_ref()
            .is_some_and(|d| !d.handle.is_finished())
    }

    /// Open a socket to the current target URL and start receiving.
    ///
    /// Tears down any previous connection first. Returns once the first
    /// attempt has finished; if it failed, reconnection with backoff
    /// continues in the background. The driver is registered before the
    /// handshake starts, so a concurrent [`disconnect`](Self::disconnect)
    /// aborts a pending first attempt.
    pub async fn connect(&self) {
        let first_attempt = {
            let _lifecycle = self.inner.lifecycle.lock().await;
            self.inner.teardown().await;

            let cancel = CancellationToken::new();
            let (ready_tx, ready_rx) = oneshot::channel();
            let handle = tokio::spawn(drive(Arc::clone(&self.inner), cancel.clone(), ready_tx));
            *self.inner.driver.lock() = Some(ActiveDriver { cancel, handle });
            ready_rx
        };
        // Err means the driver went away before reporting; nothing to wait for.
        let _ = first_attempt.await;
    }

    /// Close the connection and stop reconnecting. Idempotent.
    pub async fn disconnect(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.teardown().await;
        debug!("client disconnected");
    }
}

impl Drop for EventStreamClient {
    fn drop(&mut self) {
        if let Some(active) = self.inner.driver.lock().take() {
            active.cancel.cancel();
        }
    }
}

impl ClientInner {
    fn target_url(&self) -> Url {
        self.target_url.lock().clone()
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    /// Cancel the active driver and wait for it to release the socket.
    async fn teardown(&self) {
        let active = self.driver.lock().take();
        if let Some(active) = active {
            active.cancel.cancel();
            if let Err(e) = active.handle.await {
                if e.is_panic() {
                    error!(error = %e, "connection driver panicked");
                }
            }
        }
        *self.session.lock() = None;
    }

    /// One connection attempt against the current target URL.
    async fn open(&self, cancel: &CancellationToken) -> OpenOutcome {
        let url = self.target_url();
        debug!(url = %url, "opening socket");

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return OpenOutcome::Cancelled,
            result = connect_async(url.as_str()) => result,
        };

        match result {
            Ok((ws, _response)) => {
                self.attempts.store(0, Ordering::SeqCst);
                info!(url = %url, "connected");
                self.emit(ClientEvent::Connected {
                    url: url.to_string(),
                });
                OpenOutcome::Connected(Box::new(ws))
            }
            Err(e) => {
                warn!(url = %url, error = %e, "connection failed");
                OpenOutcome::Failed
            }
        }
    }

    /// Retry with exponential backoff until connected or cancelled.
    async fn reconnect_with_backoff(&self, cancel: &CancellationToken) -> Option<Box<WsStream>> {
        loop {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst).saturating_add(1);
            let delay = self.policy.delay_for_attempt(attempt);
            info!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "reconnecting after backoff"
            );
            self.emit(ClientEvent::Reconnecting { attempt, delay });

            tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                () = tokio::time::sleep(delay) => {}
            }

            match self.open(cancel).await {
                OpenOutcome::Connected(ws) => return Some(ws),
                OpenOutcome::Failed => {}
                OpenOutcome::Cancelled => return None,
            }
        }
    }
}

/// Driver task: first open, then receive, tear down, reconnect, until cancelled.
///
/// `ready` fires once the first connection attempt has finished.
async fn drive(inner: Arc<ClientInner>, cancel: CancellationToken, ready: oneshot::Sender<()>) {
    let dispatcher = Dispatcher::new(inner.events.clone(), Arc::clone(&inner.session));
    let first = inner.open(&cancel).await;
    let _ = ready.send(());

    let mut socket = match first {
        OpenOutcome::Connected(ws) => Some(ws),
        OpenOutcome::Failed => None,
        OpenOutcome::Cancelled => {
            debug!("connection driver cancelled before first open");
            return;
        }
    };

    loop {
        let mut ws = match socket.take() {
            Some(ws) => ws,
            None => match inner.reconnect_with_backoff(&cancel).await {
                Some(ws) => ws,
                None => break,
            },
        };

        let exit = receive_loop(&mut ws, &dispatcher, &cancel).await;
        if let LoopExit::Redirected(url) = &exit {
            *inner.target_url.lock() = url.clone();
            inner.emit(ClientEvent::Redirected {
                url: url.to_string(),
            });
        }

        close_quietly(&mut ws).await;
        drop(ws);
        *inner.session.lock() = None;
        inner.emit(ClientEvent::Disconnected);

        match exit {
            LoopExit::Cancelled => break,
            LoopExit::Redirected(_) => {
                socket = match inner.open(&cancel).await {
                    OpenOutcome::Connected(ws) => Some(ws),
                    OpenOutcome::Failed => None,
                    OpenOutcome::Cancelled => break,
                };
            }
            LoopExit::Closed | LoopExit::Failed => {}
        }
    }

    debug!("connection driver stopped");
}

/// Read frames in arrival order and dispatch them one at a time.
async fn receive_loop(
    ws: &mut WsStream,
    dispatcher: &Dispatcher,
    cancel: &CancellationToken,
) -> LoopExit {
    loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => return LoopExit::Cancelled,
            frame = ws.next() => frame,
        };

        let directive = match frame {
            Some(Ok(Message::Text(text))) => dispatcher.handle_frame(text.as_str()),
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => dispatcher.handle_frame(text),
                Err(_) => {
                    debug!(len = bytes.len(), "dropping non-UTF-8 binary frame");
                    Directive::Continue
                }
            },
            Some(Ok(Message::Close(frame))) => {
                info!(?frame, "server closed connection");
                return LoopExit::Closed;
            }
            Some(Ok(_)) => Directive::Continue,
            Some(Err(e)) => {
                warn!(error = %e, "socket error");
                return LoopExit::Failed;
            }
            None => {
                warn!("socket stream ended");
                return LoopExit::Closed;
            }
        };

        if let Directive::Reconnect(url) = directive {
            return LoopExit::Redirected(url);
        }
    }
}

/// Best-effort client-initiated close; errors are swallowed.
async fn close_quietly(ws: &mut WsStream) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "client disconnect".into(),
    };
    if let Err(e) = ws.close(Some(frame)).await {
        debug!(error = %e, "close handshake failed");
    }
}
