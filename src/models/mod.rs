// ABOUTME: Data models shared by the session store and its consumers

pub mod message;

pub use message::{ChatMessage, MessageKind, MessageLog, MessageRole, Upsert};
