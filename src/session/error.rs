// ABOUTME: Error types for the chat session and its transport
// None of these ever escape the store; they end up as error entries in the message log

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Discovery(#[from] DiscoveryError),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Discovery endpoint returned no URL")]
    EmptyUrl,

    #[error("Discovery endpoint returned an invalid websocket URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Message '{code}' is missing the '{field}' field")]
    MissingField { code: &'static str, field: &'static str },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage directory unavailable")]
    NoStorageDir,
}
