// ABOUTME: Chat session module: store state machine, runtime driver and persistence
// The store is the only owner of the transport and the message log

pub mod error;
pub mod persistence;
pub mod runtime;
pub mod store;

pub use error::SessionError;
pub use persistence::{FileStorage, KeyValueStorage, MemoryStorage, MessagePersistence, MESSAGES_KEY};
pub use runtime::{SessionHandle, SessionRuntime};
pub use store::{ChatStore, ConnectStep, StoreSettings};
