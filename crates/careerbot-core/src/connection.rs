//! WebSocket runtime for the chat controller
//!
//! [`ChatSession`] pairs a [`ChatController`] with real tokio-tungstenite
//! connections. Each connection runs in its own task and reports back over an
//! unbounded channel as [`SessionEvent`]s; the owner of the session feeds those
//! into [`ChatSession::handle_event`] from its event loop.

use std::borrow::Cow;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::controller::{ChatController, Effect, SessionEvent, TransportEvent};

/// How long a closing socket may spend sending its close frame.
const CLOSE_GRACE: Duration = Duration::from_millis(50);

enum Outbound {
    Text(String),
    Close,
}

/// One live WebSocket task
struct Connection {
    generation: u64,
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
    closing: bool,
}

impl Connection {
    fn open(
        url: Url,
        generation: u64,
        delay: Duration,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(url, generation, delay, outbound_rx, events));
        Self {
            generation,
            outbound,
            task,
            closing: false,
        }
    }

    fn send(&self, text: String) {
        if self.outbound.send(Outbound::Text(text)).is_err() {
            debug!(generation = self.generation, "send on a finished connection");
        }
    }

    /// Asks the task to send a normal close frame and exit.
    fn close(mut self) {
        self.closing = self.outbound.send(Outbound::Close).is_ok();
        if !self.closing {
            self.task.abort();
            self.closing = true;
        }
    }

    fn is_open(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if !self.closing {
            self.task.abort();
        }
    }
}

async fn run_connection(
    url: Url,
    generation: u64,
    delay: Duration,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let emit = |event: TransportEvent| {
        let _ = events.send(SessionEvent::new(generation, event));
    };

    let connect = async {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        tokio_tungstenite::connect_async(url.as_str()).await
    };

    // A close request while still connecting abandons the attempt.
    let ws = tokio::select! {
        result = connect => match result {
            Ok((ws, _response)) => ws,
            Err(e) => {
                warn!(generation, error = %e, "chat connection failed");
                emit(TransportEvent::Error(e.to_string()));
                emit(TransportEvent::Closed { code: None });
                return;
            }
        },
        _ = wait_for_close(&mut outbound) => {
            debug!(generation, "connection closed before it opened");
            return;
        }
    };

    info!(generation, "chat socket open");
    emit(TransportEvent::Opened);
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        emit(TransportEvent::Error(e.to_string()));
                        emit(TransportEvent::Closed { code: None });
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: Cow::Borrowed(""),
                    };
                    let _ = tokio::time::timeout(CLOSE_GRACE, sink.send(Message::Close(Some(frame)))).await;
                    debug!(generation, "chat socket closed by client");
                    return;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => emit(TransportEvent::Message(text)),
                Some(Ok(Message::Close(frame))) => {
                    emit(TransportEvent::Closed { code: frame.map(|f| u16::from(f.code)) });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    emit(TransportEvent::Error(e.to_string()));
                    emit(TransportEvent::Closed { code: None });
                    return;
                }
                None => {
                    emit(TransportEvent::Closed { code: None });
                    return;
                }
            },
        }
    }
}

async fn wait_for_close(outbound: &mut mpsc::UnboundedReceiver<Outbound>) {
    loop {
        match outbound.recv().await {
            Some(Outbound::Close) | None => return,
            // Nothing can be sent before the socket is open.
            Some(Outbound::Text(_)) => {}
        }
    }
}

/// A chat controller wired to live WebSocket connections
pub struct ChatSession {
    controller: ChatController,
    url: Url,
    events: mpsc::UnboundedSender<SessionEvent>,
    connection: Option<Connection>,
}

impl ChatSession {
    pub fn new(
        controller: ChatController,
        url: Url,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            controller,
            url,
            events,
            connection: None,
        }
    }

    pub fn controller(&self) -> &ChatController {
        &self.controller
    }

    /// Number of connection tasks still running. Never more than one.
    pub fn open_connections(&self) -> usize {
        self.connection.iter().filter(|c| c.is_open()).count()
    }

    pub fn start(&mut self) {
        let effects = self.controller.connect();
        self.apply(effects);
    }

    pub fn reconnect(&mut self) {
        let effects = self.controller.reconnect();
        self.apply(effects);
    }

    pub fn new_chat(&mut self) {
        let effects = self.controller.new_chat();
        self.apply(effects);
    }

    /// Returns whether the answer went out.
    pub fn send_answer(&mut self, text: &str) -> bool {
        let effects = self.controller.send_answer(text);
        let sent = !effects.is_empty();
        self.apply(effects);
        sent
    }

    pub fn dismiss_validation(&mut self) {
        self.controller.dismiss_validation();
    }

    pub fn dismiss_notice(&mut self) {
        self.controller.dismiss_notice();
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        let effects = self.controller.handle(event);
        self.apply(effects);
    }

    /// Closes the owned connection before returning.
    pub fn shutdown(&mut self) {
        let effects = self.controller.teardown();
        self.apply(effects);
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Open { generation, delay } => {
                    if let Some(old) = self.connection.take() {
                        old.close();
                    }
                    self.connection = Some(Connection::open(
                        self.url.clone(),
                        generation,
                        delay,
                        self.events.clone(),
                    ));
                }
                Effect::Send { generation, text } => match &self.connection {
                    Some(connection) if connection.generation == generation => {
                        connection.send(text)
                    }
                    _ => debug!(generation, "no connection for outgoing answer"),
                },
                Effect::Close { generation } => {
                    if self
                        .connection
                        .as_ref()
                        .is_some_and(|c| c.generation == generation)
                    {
                        if let Some(connection) = self.connection.take() {
                            connection.close();
                        }
                    }
                }
            }
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
