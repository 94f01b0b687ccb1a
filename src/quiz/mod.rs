// ABOUTME: Quiz store collaborator fed with quiz payloads received by the chat session
// Holds the latest payload for the quiz UI and can push answers back through the chat

use crate::i18n::Localizer;
use crate::session::SessionHandle;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

/// Receiver of quiz payloads. The session only ever pushes data into it.
pub trait QuizSink: Send + Sync {
    fn update_from_backend(&self, data: Value);
}

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("Quiz store is not wired to a chat session")]
    NotWired,
}

/// Latest quiz state as sent by the backend
#[derive(Debug, Clone)]
pub struct QuizStore {
    data: Arc<watch::Sender<Option<Value>>>,
    chat: Arc<Mutex<Option<SessionHandle>>>,
    localizer: Localizer,
}

impl QuizStore {
    pub fn new(localizer: Localizer) -> Self {
        let (data, _) = watch::channel(None);
        Self {
            data: Arc::new(data),
            chat: Arc::new(Mutex::new(None)),
            localizer,
        }
    }

    /// Wire the chat session used to send quiz answers. Must happen before the
    /// first answers are submitted; quiz payloads can arrive before or after.
    pub fn set_chat(&self, chat: SessionHandle) {
        if let Ok(mut slot) = self.chat.lock() {
            *slot = Some(chat);
            debug!("Quiz store wired to chat session");
        }
    }

    pub fn current(&self) -> Option<Value> {
        self.data.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Value>> {
        self.data.subscribe()
    }

    /// Ask the agent for feedback on the given answers via a visible chat message
    pub fn request_feedback(&self, answers: &str) -> Result<(), QuizError> {
        let chat = self
            .chat
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or(QuizError::NotWired)?;

        let prompt = self.localizer.strings().prompt_final_feedback;
        chat.send_chat_message(format!("{prompt}\n\n{answers}"), false);
        Ok(())
    }
}

impl QuizSink for QuizStore {
    fn update_from_backend(&self, data: Value) {
        info!("Received quiz update from backend");
        self.data.send_replace(Some(data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_from_backend_publishes() {
        let store = QuizStore::new(Localizer::default());
        let mut rx = store.subscribe();
        assert!(store.current().is_none());

        store.update_from_backend(json!({"title": "Rust"}));
        assert!(rx.has_changed().unwrap());
        assert_eq!(store.current(), Some(json!({"title": "Rust"})));
    }

    #[test]
    fn test_request_feedback_requires_wiring() {
        let store = QuizStore::new(Localizer::default());
        assert!(matches!(store.request_feedback("1: a"), Err(QuizError::NotWired)));
    }
}
