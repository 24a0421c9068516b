//! WebSocket transport for the messenger.
//!
//! Runs a [`Messenger`] on a tokio task and executes its [`ClientAction`]s
//! against a `tokio-tungstenite` socket. This is a thin layer: it opens and
//! closes the socket, writes encoded frames, feeds inbound text and close
//! events back in, and ticks the messenger. All protocol logic stays in the
//! Sans-IO messenger.
//!
//! The WebSocket handshake runs on its own task so commands and ticks are
//! served while a connect is in flight.
//!
//! The running messenger is reached through a [`MessengerHandle`], which
//! ships closures to the task and awaits their result.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message as WsMessage},
};
use tracing::{debug, info, warn};

pub use crate::system_env::SystemEnv;
use crate::{ClientAction, ClientConfig, EventHandlers, Messenger, Participant};
use parley_core::env::Environment;
use parley_proto::{MessageId, payloads::Message};

/// Interval between messenger ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Time allowed for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pending commands buffered before callers wait.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Command<E> = Box<dyn FnOnce(&mut Messenger<E>) + Send>;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The runtime task has stopped.
    #[error("messenger runtime stopped")]
    Stopped,
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// WebSocket URL, e.g. `ws://localhost:8080`.
    pub url: String,
    /// Interval between messenger ticks.
    pub tick_interval: Duration,
    /// Time allowed for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Command channel capacity.
    pub command_capacity: usize,
}

impl RuntimeConfig {
    /// Defaults for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}

/// Cloneable handle to a messenger running on a tokio task.
///
/// When the last handle is dropped the messenger is destroyed and the task
/// exits.
pub struct MessengerHandle<E: Environment> {
    commands: mpsc::Sender<Command<E>>,
}

impl<E: Environment> Clone for MessengerHandle<E> {
    fn clone(&self) -> Self {
        Self { commands: self.commands.clone() }
    }
}

impl<E: Environment> MessengerHandle<E> {
    /// Run `f` against the messenger and return its result.
    pub async fn with<R, F>(&self, f: F) -> Result<R, TransportError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Messenger<E>) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command: Command<E> = Box::new(move |messenger| {
            let _ = reply_tx.send(f(messenger));
        });

        self.commands.send(command).await.map_err(|_| TransportError::Stopped)?;
        reply_rx.await.map_err(|_| TransportError::Stopped)
    }

    /// Register event handlers.
    pub async fn set_event_handlers(&self, handlers: EventHandlers) -> Result<(), TransportError> {
        self.with(move |m| m.set_event_handlers(handlers)).await
    }

    /// Join a room, leaving the current one.
    pub async fn join(
        &self,
        room_id: impl Into<String>,
        participant: Participant,
    ) -> Result<Result<(), crate::ClientError>, TransportError> {
        let room_id = room_id.into();
        self.with(move |m| m.join(&room_id, participant)).await
    }

    /// Send a message to the active room as the current identity.
    pub async fn send_message(
        &self,
        content: impl Into<String>,
    ) -> Result<Result<MessageId, crate::ClientError>, TransportError> {
        let content = content.into();
        self.with(move |m| {
            let sender = m.identity().clone();
            m.send_message(content, &sender)
        })
        .await
    }

    /// Signal typing in the active room.
    pub async fn send_typing(
        &self,
        is_typing: bool,
    ) -> Result<Result<(), crate::ClientError>, TransportError> {
        self.with(move |m| m.send_typing(is_typing)).await
    }

    /// Mark a message read.
    pub async fn mark_as_read(&self, message_id: impl Into<String>) -> Result<(), TransportError> {
        let message_id = message_id.into();
        self.with(move |m| m.mark_as_read(&message_id)).await
    }

    /// Snapshot of a room's cached history.
    pub async fn history(&self, room_id: impl Into<String>) -> Result<Vec<Message>, TransportError> {
        let room_id = room_id.into();
        self.with(move |m| m.history(&room_id).to_vec()).await
    }

    /// Destroy the messenger and stop the runtime.
    pub async fn destroy(&self) -> Result<(), TransportError> {
        self.with(Messenger::destroy).await
    }
}

/// Spawn a messenger over a WebSocket on the current tokio runtime.
///
/// The returned join handle completes once the messenger is destroyed.
pub fn spawn<E: Environment>(
    env: E,
    config: ClientConfig,
    identity: Participant,
    runtime: RuntimeConfig,
) -> (MessengerHandle<E>, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(runtime.command_capacity.max(1));
    let messenger = Messenger::new(env, config, identity);
    let task = tokio::spawn(run(messenger, runtime, commands_rx));
    (MessengerHandle { commands: commands_tx }, task)
}

async fn run<E: Environment>(
    mut messenger: Messenger<E>,
    runtime: RuntimeConfig,
    mut commands: mpsc::Receiver<Command<E>>,
) {
    let mut socket: Option<Socket> = None;
    let mut connecting: Option<JoinHandle<Result<Socket, String>>> = None;
    let mut ticker = tokio::time::interval(runtime.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        execute_actions(&mut messenger, &mut socket, &mut connecting, &runtime).await;
        if messenger.is_destroyed() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => messenger.tick(),
            opened = join_open(&mut connecting) => match opened {
                Ok(ws) => {
                    socket = Some(ws);
                    messenger.handle_opened();
                },
                Err(reason) => messenger.handle_connect_failed(reason),
            },
            command = commands.recv() => match command {
                Some(command) => command(&mut messenger),
                None => {
                    debug!("all handles dropped");
                    messenger.destroy();
                },
            },
            inbound = next_message(&mut socket) => match inbound {
                Some(Ok(WsMessage::Text(text))) => messenger.handle_text(text.as_str()),
                Some(Ok(WsMessage::Close(frame))) => {
                    socket = None;
                    let reason = frame
                        .map_or_else(|| "closed by server".to_owned(), |f| f.reason.as_str().to_owned());
                    messenger.handle_closed(reason);
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    socket = None;
                    messenger.handle_closed(e.to_string());
                },
                None => {
                    socket = None;
                    messenger.handle_closed("stream ended");
                },
            },
        }
    }

    if let Some(pending) = connecting.take() {
        pending.abort();
    }
    info!("messenger runtime stopped");
}

/// Execute queued actions until the messenger stops producing them.
///
/// A failed write feeds `handle_closed` back in, which may queue more
/// actions, so this loops. `Connect` only starts the handshake task; its
/// outcome arrives through [`join_open`].
async fn execute_actions<E: Environment>(
    messenger: &mut Messenger<E>,
    socket: &mut Option<Socket>,
    connecting: &mut Option<JoinHandle<Result<Socket, String>>>,
    runtime: &RuntimeConfig,
) {
    loop {
        let actions = messenger.take_actions();
        if actions.is_empty() {
            return;
        }

        for action in actions {
            match action {
                ClientAction::Connect => {
                    if let Some(stale) = connecting.take() {
                        stale.abort();
                    }
                    *socket = None;
                    let handshake = open(runtime.url.clone(), runtime.connect_timeout);
                    *connecting = Some(tokio::spawn(handshake));
                },
                ClientAction::Send(frame) => {
                    let Some(ws) = socket.as_mut() else {
                        continue;
                    };
                    let text = match frame.encode() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "failed to encode frame");
                            continue;
                        },
                    };
                    if let Err(e) = ws.send(WsMessage::Text(text.into())).await {
                        *socket = None;
                        messenger.handle_closed(e.to_string());
                    }
                },
                ClientAction::Disconnect { reason } => {
                    if let Some(pending) = connecting.take() {
                        debug!(%reason, "abandoning handshake");
                        pending.abort();
                    }
                    if let Some(mut ws) = socket.take() {
                        debug!(%reason, "closing socket");
                        let _ = ws.close(None).await;
                    }
                },
            }
        }
    }
}

async fn open(url: String, connect_timeout: Duration) -> Result<Socket, String> {
    match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((ws, _response))) => Ok(ws),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("connect timed out after {connect_timeout:?}")),
    }
}

/// Wait for the in-flight handshake. Pends forever when none is running.
async fn join_open(
    connecting: &mut Option<JoinHandle<Result<Socket, String>>>,
) -> Result<Socket, String> {
    let Some(pending) = connecting.as_mut() else {
        return std::future::pending().await;
    };
    let outcome = pending.await;
    *connecting = None;
    outcome.unwrap_or_else(|e| Err(format!("handshake task failed: {e}")))
}

async fn next_message(socket: &mut Option<Socket>) -> Option<Result<WsMessage, tungstenite::Error>> {
    match socket {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}
