// ABOUTME: Wire protocol between the chat client and the backend websocket
// Splits the untyped envelope (code + opaque fields) from the typed inbound messages

use crate::i18n::Language;
use crate::models::MessageKind;
use crate::session::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ============================================
// Envelope
// ============================================

/// JSON object exchanged over the websocket: a message code plus arbitrary fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl WireMessage {
    /// Build an outbound envelope `{code, ...data}`
    pub fn new(code: impl Into<String>, mut data: Map<String, Value>) -> Self {
        data.remove("code");
        Self {
            code: Some(code.into()),
            fields: data,
        }
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Data of an outbound `chat_input` message
pub fn chat_input(text: &str, language: Language) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("text".into(), Value::String(text.to_string()));
    data.insert("language".into(), Value::String(language.tag().to_string()));
    data
}

// ============================================
// Inbound dispatch table
// ============================================

/// Inbound message codes the client knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCode {
    ChatReply,
    Quiz,
    Error,
}

const DISPATCH_TABLE: &[(&str, MessageCode)] = &[
    ("chat_reply", MessageCode::ChatReply),
    ("quiz", MessageCode::Quiz),
    ("error", MessageCode::Error),
];

impl MessageCode {
    pub fn from_code(code: &str) -> Option<Self> {
        DISPATCH_TABLE
            .iter()
            .find(|(name, _)| *name == code)
            .map(|(_, message_code)| *message_code)
    }

    pub fn as_str(self) -> &'static str {
        DISPATCH_TABLE
            .iter()
            .find(|(_, message_code)| *message_code == self)
            .map_or("unknown", |(name, _)| *name)
    }
}

/// Typed inbound message, produced from an envelope at the dispatch boundary
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    ChatReply {
        id: String,
        text: String,
        kind: MessageKind,
    },
    /// `data` is `None` when the payload is absent or empty
    Quiz { data: Option<Value> },
    ServerError { text: Option<String> },
    Unknown { code: Option<String> },
}

impl InboundMessage {
    pub fn from_envelope(envelope: &WireMessage) -> Result<Self, ProtocolError> {
        let Some(code) = envelope.code.as_deref() else {
            return Ok(InboundMessage::Unknown { code: None });
        };

        let Some(message_code) = MessageCode::from_code(code) else {
            return Ok(InboundMessage::Unknown {
                code: Some(code.to_string()),
            });
        };

        match message_code {
            MessageCode::ChatReply => {
                let id = match envelope.fields.get("id") {
                    Some(Value::String(id)) => id.clone(),
                    Some(Value::Number(id)) => id.to_string(),
                    _ => {
                        return Err(ProtocolError::MissingField {
                            code: message_code.as_str(),
                            field: "id",
                        })
                    }
                };
                let text = envelope.str_field("text").unwrap_or_default().to_string();
                let kind = envelope
                    .str_field("type")
                    .and_then(MessageKind::from_wire)
                    .unwrap_or_default();
                Ok(InboundMessage::ChatReply { id, text, kind })
            }
            MessageCode::Quiz => Ok(InboundMessage::Quiz {
                data: envelope.fields.get("data").filter(|d| !is_empty_payload(d)).cloned(),
            }),
            MessageCode::Error => Ok(InboundMessage::ServerError {
                text: envelope
                    .str_field("text")
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            }),
        }
    }
}

/// Null, `false`, zero and empty strings, arrays or objects carry no quiz
fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

// ============================================
// Connection State
// ============================================

/// Connection status the UI adapts to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    ConnectionLost,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::ConnectionLost => "connection-lost",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inbound(value: Value) -> Result<InboundMessage, ProtocolError> {
        let envelope: WireMessage = serde_json::from_value(value).unwrap();
        InboundMessage::from_envelope(&envelope)
    }

    #[test]
    fn test_outbound_envelope_flattens_fields() {
        let message = WireMessage::new("chat_input", chat_input("Hi", Language::De));
        let json: Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(json, json!({"code": "chat_input", "text": "Hi", "language": "de"}));
    }

    #[test]
    fn test_outbound_code_cannot_be_overridden_by_data() {
        let mut data = Map::new();
        data.insert("code".into(), json!("sneaky"));
        let message = WireMessage::new("chat_input", data);
        let json: Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(json, json!({"code": "chat_input"}));
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert!(WireMessage::parse("[1, 2]").is_err());
        assert!(WireMessage::parse("not json").is_err());
        assert!(WireMessage::parse(r#"{"code": 7}"#).is_err());
    }

    #[test]
    fn test_chat_reply_mapping() {
        let message = inbound(json!({"code": "chat_reply", "id": "a", "text": "Hel"})).unwrap();
        assert_eq!(
            message,
            InboundMessage::ChatReply {
                id: "a".into(),
                text: "Hel".into(),
                kind: MessageKind::Say
            }
        );

        let thinking = inbound(json!({"code": "chat_reply", "id": 3, "type": "think"})).unwrap();
        assert_eq!(
            thinking,
            InboundMessage::ChatReply {
                id: "3".into(),
                text: String::new(),
                kind: MessageKind::Think
            }
        );
    }

    #[test]
    fn test_chat_reply_requires_id() {
        let err = inbound(json!({"code": "chat_reply", "text": "x"})).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField { field: "id", .. }));
    }

    #[test]
    fn test_quiz_payload_emptiness() {
        assert_eq!(inbound(json!({"code": "quiz"})).unwrap(), InboundMessage::Quiz { data: None });
        assert_eq!(inbound(json!({"code": "quiz", "data": {}})).unwrap(), InboundMessage::Quiz { data: None });
        assert_eq!(inbound(json!({"code": "quiz", "data": false})).unwrap(), InboundMessage::Quiz { data: None });
        assert_eq!(inbound(json!({"code": "quiz", "data": 0})).unwrap(), InboundMessage::Quiz { data: None });
        assert_eq!(
            inbound(json!({"code": "quiz", "data": 1})).unwrap(),
            InboundMessage::Quiz { data: Some(json!(1)) }
        );
        assert_eq!(
            inbound(json!({"code": "quiz", "data": {"questions": []}})).unwrap(),
            InboundMessage::Quiz {
                data: Some(json!({"questions": []}))
            }
        );
    }

    #[test]
    fn test_unknown_and_missing_codes() {
        assert_eq!(
            inbound(json!({"code": "bogus"})).unwrap(),
            InboundMessage::Unknown {
                code: Some("bogus".into())
            }
        );
        assert_eq!(inbound(json!({"text": "x"})).unwrap(), InboundMessage::Unknown { code: None });
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::ConnectionLost).unwrap(),
            "\"connection-lost\""
        );
        assert_eq!(ConnectionStatus::ConnectionLost.to_string(), "connection-lost");
    }
}
