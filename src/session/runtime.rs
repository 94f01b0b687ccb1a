// ABOUTME: Event loop driving the chat store from transport events, timers and user commands
// All store mutations happen on this single task; callers talk to it through a SessionHandle

use crate::i18n::{Language, Localizer};
use crate::models::ChatMessage;
use crate::session::error::SessionError;
use crate::session::store::{ChatStore, ConnectStep};
use crate::transport::{AttemptId, ConnectionStatus, Connector, TaggedEvent};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug)]
enum SessionCommand {
    Connect { reset: bool },
    SendChat { text: String, hidden: bool },
    Send { code: String, data: Map<String, Value> },
    Shutdown,
}

#[derive(Debug)]
enum RuntimeEvent {
    ConnectFailed { attempt: AttemptId, error: SessionError },
    ReconnectDue,
}

/// Cloneable handle used by the UI and collaborators to drive the session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    messages: watch::Receiver<Vec<ChatMessage>>,
    status: watch::Receiver<ConnectionStatus>,
    localizer: Localizer,
}

impl SessionHandle {
    fn command(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            warn!("Chat session is no longer running");
        }
    }

    /// Connect (or reconnect) to the backend. With `reset` only the history is cleared.
    pub fn connect(&self, reset: bool) {
        self.command(SessionCommand::Connect { reset });
    }

    pub fn reset_history(&self) {
        self.connect(true);
    }

    pub fn send_chat_message(&self, text: impl Into<String>, hidden: bool) {
        self.command(SessionCommand::SendChat {
            text: text.into(),
            hidden,
        });
    }

    pub fn send(&self, code: impl Into<String>, data: Map<String, Value>) {
        self.command(SessionCommand::Send {
            code: code.into(),
            data,
        });
    }

    pub fn shutdown(&self) {
        self.command(SessionCommand::Shutdown);
    }

    pub fn language(&self) -> Language {
        self.localizer.language()
    }

    pub fn set_language(&self, language: Language) {
        self.localizer.set_language(language);
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn subscribe_messages(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages.clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }
}

pub struct SessionRuntime {
    store: ChatStore,
    connector: Arc<dyn Connector>,
    auto_connect: bool,
    commands_rx: mpsc::UnboundedReceiver<SessionCommand>,
    transport_tx: mpsc::UnboundedSender<TaggedEvent>,
    transport_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    events_tx: mpsc::UnboundedSender<RuntimeEvent>,
    events_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    pending_reconnect: Option<JoinHandle<()>>,
}

impl SessionRuntime {
    pub fn new(store: ChatStore, connector: Arc<dyn Connector>) -> (Self, SessionHandle) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let handle = SessionHandle {
            commands: commands_tx,
            messages: store.subscribe_messages(),
            status: store.subscribe_status(),
            localizer: store.localizer().clone(),
        };

        let runtime = Self {
            store,
            connector,
            auto_connect: true,
            commands_rx,
            transport_tx,
            transport_rx,
            events_tx,
            events_rx,
            pending_reconnect: None,
        };

        (runtime, handle)
    }

    /// Whether `run` connects on its own before processing commands
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Process events until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!("Chat session runtime started");

        if self.auto_connect {
            self.connect(false);
        }

        loop {
            tokio::select! {
                command = self.commands_rx.recv() => {
                    match command {
                        Some(SessionCommand::Shutdown) | None => break,
                        Some(command) => self.handle_command(command),
                    }
                }
                Some(tagged) = self.transport_rx.recv() => {
                    if let Some(delay) = self.store.handle_transport_event(tagged.attempt, tagged.event) {
                        self.schedule_reconnect(delay);
                    }
                }
                Some(event) = self.events_rx.recv() => self.handle_runtime_event(event),
            }
        }

        if let Some(pending) = self.pending_reconnect.take() {
            pending.abort();
        }
        info!("Chat session runtime stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect { reset } => {
                if !reset {
                    self.cancel_pending_reconnect();
                }
                self.connect(reset);
            }
            SessionCommand::SendChat { text, hidden } => self.store.send_chat_message(&text, hidden),
            SessionCommand::Send { code, data } => self.store.send(&code, data),
            SessionCommand::Shutdown => {}
        }
    }

    fn handle_runtime_event(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::ConnectFailed { attempt, error } => {
                if let Some(delay) = self.store.connect_failed(attempt, &error) {
                    self.schedule_reconnect(delay);
                }
            }
            RuntimeEvent::ReconnectDue => {
                self.pending_reconnect = None;
                info!("Attempting to reconnect...");
                self.connect(false);
            }
        }
    }

    fn connect(&mut self, reset: bool) {
        let ConnectStep::Discover { attempt } = self.store.begin_connect(reset) else {
            return;
        };

        let connector = self.connector.clone();
        let transport_tx = self.transport_tx.clone();
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            if let Err(error) = connector.connect(attempt, transport_tx).await {
                let _ = events_tx.send(RuntimeEvent::ConnectFailed { attempt, error });
            }
        });
    }

    /// Schedule the single pending reconnect, replacing any earlier one
    fn schedule_reconnect(&mut self, delay: Duration) {
        self.cancel_pending_reconnect();
        debug!("Reconnecting in {:?}", delay);

        let events_tx = self.events_tx.clone();
        self.pending_reconnect = Some(tokio::spawn(async move {
            sleep(delay).await;
            let _ = events_tx.send(RuntimeEvent::ReconnectDue);
        }));
    }

    fn cancel_pending_reconnect(&mut self) {
        if let Some(pending) = self.pending_reconnect.take() {
            debug!("Cancelling pending reconnect");
            pending.abort();
        }
    }
}
