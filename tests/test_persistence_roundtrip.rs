// ABOUTME: Tests that the message log survives restarts through durable storage

mod common;

use common::{connected_store, frame, store_with};
use elisa_chat::i18n::Localizer;
use elisa_chat::session::{
    ChatStore, FileStorage, MemoryStorage, MessagePersistence, StoreSettings, MESSAGES_KEY,
};
use elisa_chat::transport::TransportEvent;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn file_store(dir: &TempDir) -> ChatStore {
    let storage = FileStorage::with_dir(dir.path()).unwrap();
    ChatStore::new(
        MessagePersistence::new(Box::new(storage)),
        Localizer::default(),
        StoreSettings::default(),
    )
}

#[test]
fn test_fresh_store_restores_the_same_log() {
    let storage = MemoryStorage::new();
    let (mut store, _transport) = connected_store(storage.clone());
    let attempt = store.current_attempt();

    store.handle_transport_event(attempt, frame(json!({"code": "chat_reply", "id": "a", "text": "Hel"})));
    store.send_chat_message("Hi", false);
    store.handle_transport_event(attempt, frame(json!({"code": "chat_reply", "id": "a", "text": "Hello!"})));
    store.handle_transport_event(attempt, frame(json!({"code": "nope"})));
    store.handle_transport_event(attempt, TransportEvent::Closed);

    let restored = store_with(storage, Localizer::default());
    assert_eq!(restored.messages(), store.messages());
    assert_eq!(restored.messages().len(), 4);
}

#[test]
fn test_file_storage_survives_restart() {
    let dir = TempDir::new().unwrap();

    let mut store = file_store(&dir);
    store.handle_frame(&json!({"code": "chat_reply", "id": "a", "text": "persisted"}).to_string());
    store.send_chat_message("offline", false);
    let expected = store.messages().to_vec();
    drop(store);

    let restored = file_store(&dir);
    assert_eq!(restored.messages(), &expected[..]);
}

#[test]
fn test_corrupt_snapshot_starts_empty() {
    let storage = MemoryStorage::new();
    storage.insert(MESSAGES_KEY, "][");

    let store = store_with(storage, Localizer::default());
    assert!(store.messages().is_empty());
}

#[test]
fn test_reset_persists_empty_log() {
    let dir = TempDir::new().unwrap();

    let mut store = file_store(&dir);
    store.handle_frame(&json!({"code": "chat_reply", "id": "a", "text": "gone soon"}).to_string());
    store.reset_history();
    drop(store);

    assert!(file_store(&dir).messages().is_empty());
}

#[test]
fn test_restored_log_is_published_to_subscribers() {
    let storage = MemoryStorage::new();
    {
        let mut store = store_with(storage.clone(), Localizer::default());
        store.handle_frame(&json!({"code": "chat_reply", "id": "a", "text": "hi"}).to_string());
    }

    let store = store_with(storage, Localizer::default());
    let messages = store.subscribe_messages();
    assert_eq!(messages.borrow().len(), 1);
}
