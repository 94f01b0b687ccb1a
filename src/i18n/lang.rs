// ABOUTME: String tables for the languages supported by the chat client
// Only the strings produced by the session itself live here

/// User-visible strings emitted by the session store
#[derive(Debug)]
pub struct Strings {
    pub connection_lost: &'static str,
    pub fetch_url: &'static str,
    /// Placeholder: `$code$`
    pub not_connected: &'static str,
    pub unknown_error: &'static str,
    /// Placeholder: `$code$`
    pub unknown_message_code: &'static str,
    pub prompt_final_feedback: &'static str,
}

pub static EN: Strings = Strings {
    connection_lost: "Connection lost. Trying to reconnect.",
    fetch_url: "Failed to fetch websocket URL.",
    not_connected: "No connection to the backend. Error code: $code$",
    unknown_error: "An unknown error occurred while communicating with the backend.",
    unknown_message_code: "Unrecognized message code: $code$",
    prompt_final_feedback: "These are my answers. Please give me feedback and explain to me, if I answered something wrong:",
};

pub static DE: Strings = Strings {
    connection_lost: "Verbindung unterbrochen. Versuche, die Verbindung wiederherzustellen.",
    fetch_url: "Fehler beim Abrufen der Websocket URL.",
    not_connected: "Keine Verbindung mit dem Backend. Fehlercode: $code$",
    unknown_error: "Während der Kommunikation mit dem Backend ist ein unbekannter Fehler aufgetreten.",
    unknown_message_code: "Unbekannter Nachrichtencode: $code$",
    prompt_final_feedback: "Dies sind meine Antwort. Bitte gib mir Feedback und erkläre es mir, wenn ich etwas falsch beantwortet habe:",
};
