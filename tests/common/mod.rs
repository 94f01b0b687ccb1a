// ABOUTME: Shared test doubles for the chat session tests
// Recording transport, scripted connector and a quiz sink that remembers what it got
#![allow(dead_code)]

use async_trait::async_trait;
use elisa_chat::i18n::Localizer;
use elisa_chat::quiz::QuizSink;
use elisa_chat::session::error::DiscoveryError;
use elisa_chat::session::{
    ChatStore, MemoryStorage, MessagePersistence, SessionError, StoreSettings,
};
use elisa_chat::transport::{AttemptId, Connector, EventSender, TaggedEvent, Transport, TransportEvent};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport that records every frame written to it
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<String>>>,
    open: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }
}

impl Transport for RecordingTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingQuiz {
    pub received: Mutex<Vec<Value>>,
}

impl QuizSink for RecordingQuiz {
    fn update_from_backend(&self, data: Value) {
        self.received.lock().unwrap().push(data);
    }
}

pub fn store_with(storage: MemoryStorage, localizer: Localizer) -> ChatStore {
    ChatStore::new(
        MessagePersistence::new(Box::new(storage)),
        localizer,
        StoreSettings::default(),
    )
}

pub fn new_store() -> ChatStore {
    store_with(MemoryStorage::new(), Localizer::default())
}

/// A store whose current attempt has an open recording transport
pub fn connected_store(storage: MemoryStorage) -> (ChatStore, RecordingTransport) {
    let mut store = store_with(storage, Localizer::default());
    let transport = RecordingTransport::new();
    let attempt = match store.begin_connect(false) {
        elisa_chat::session::ConnectStep::Discover { attempt } => attempt,
        other => panic!("unexpected connect step {other:?}"),
    };
    store.handle_transport_event(attempt, TransportEvent::Opened(Box::new(transport.clone())));
    (store, transport)
}

pub fn frame(value: Value) -> TransportEvent {
    TransportEvent::Message(value.to_string())
}

pub fn fast_settings() -> StoreSettings {
    StoreSettings {
        greeting: "Hi!".to_string(),
        reconnect_delay: Duration::from_millis(20),
        discovery_retry_delay: Duration::from_millis(40),
    }
}

pub enum Outcome {
    Open,
    /// Discovery returned something that is not a websocket URL
    Fail(String),
    /// Discovery worked but the server refused the handshake
    Refuse(String),
}

/// Connector following a script of outcomes; opens a recording transport
/// once the script runs out.
#[derive(Default)]
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Outcome>>,
    attempts: AtomicUsize,
    channel: Mutex<Option<(AttemptId, EventSender, RecordingTransport)>>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<Outcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Transport of the most recently opened channel
    pub fn transport(&self) -> Option<RecordingTransport> {
        self.channel.lock().unwrap().as_ref().map(|(_, _, t)| t.clone())
    }

    pub fn push(&self, event: TransportEvent) {
        let channel = self.channel.lock().unwrap();
        let (attempt, events, _) = channel.as_ref().expect("no channel opened yet");
        events
            .send(TaggedEvent {
                attempt: *attempt,
                event,
            })
            .unwrap();
    }

    /// Simulate the server dropping the connection
    pub fn close(&self) {
        if let Some(transport) = self.transport() {
            transport.set_open(false);
        }
        self.push(TransportEvent::Closed);
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, attempt: AttemptId, events: EventSender) -> Result<(), SessionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Outcome::Open);

        match outcome {
            Outcome::Fail(url) => Err(SessionError::Discovery(DiscoveryError::InvalidUrl(url))),
            Outcome::Refuse(reason) => Err(SessionError::Handshake(reason)),
            Outcome::Open => {
                let transport = RecordingTransport::new();
                events
                    .send(TaggedEvent {
                        attempt,
                        event: TransportEvent::Opened(Box::new(transport.clone())),
                    })
                    .map_err(|_| SessionError::Transport("session gone".into()))?;
                *self.channel.lock().unwrap() = Some((attempt, events, transport));
                Ok(())
            }
        }
    }
}
