//! JSON message protocol between clients and relay sessions.

use serde::{Deserialize, Serialize};

/// Where pipeline-mode transcripts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AsrMode {
    /// The relay recognizes buffered audio itself.
    #[default]
    Local,
    /// The caller supplies transcripts via `text` messages.
    External,
}

/// Messages sent by clients to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Update translation languages and transcript source.
    #[serde(rename_all = "camelCase")]
    Config {
        #[serde(default)]
        target_language: Option<String>,
        #[serde(default)]
        source_language: Option<String>,
        #[serde(default)]
        asr_mode: Option<AsrMode>,
    },
    /// Base64 PCM16LE mono audio chunk.
    Audio { data: String },
    /// Caller-supplied transcript text (bypasses local recognition).
    #[serde(rename_all = "camelCase")]
    Text {
        data: String,
        #[serde(default)]
        is_final: bool,
    },
    /// Graceful session termination request.
    Stop,
}

impl ClientMessage {
    /// Deserialize a client message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize a client message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Session state reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    LoadingModel,
    Ready,
    Processing,
}

/// Messages sent by a session to its client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status { data: StatusKind },
    /// Finalized source transcript for an utterance.
    SourceText { data: String },
    /// In-progress source transcript, may still change.
    SourceTextInterim { data: String },
    /// Token-incremental translation (full-duplex mode).
    TranslatedText { data: String },
    /// Fast draft translation fragment, superseded by the next final.
    TranslatedTextDraft { data: String },
    /// Context-aware translation replacing all drafts since the last final.
    TranslatedTextFinal { data: String },
    /// Base64 PCM16LE synthesized audio.
    #[serde(rename_all = "camelCase")]
    Audio { data: String, sample_rate: u32 },
    Error { message: String },
}

impl ServerMessage {
    /// Serialize a server message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a server message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
