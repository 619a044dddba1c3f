//! Events exchanged between the server and workers over the event channel

use serde::{Deserialize, Serialize};

/// Default channel name events are published on
pub const DEFAULT_CHANNEL: &str = "hackrx_events";

/// Status attached to [`HackrxEvent::Result`]
pub const RESULT_READY: &str = "result_ready";

/// An event on the hackrx channel.
///
/// Serialized as JSON with an `event_type` tag, e.g.
/// `{"event_type": "run_hackrx", "filehash": "...", "questions": [...]}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum HackrxEvent {
    /// Ask a worker to answer questions about an already stored document
    RunHackrx {
        /// SHA-256 of the stored document
        filehash: String,
        /// Questions to answer
        #[serde(default)]
        questions: Vec<String>,
    },
    /// Answers produced by a worker
    Result {
        /// SHA-256 of the stored document
        filehash: String,
        /// The questions, in order
        questions: Vec<String>,
        /// One answer per question
        answers: Vec<String>,
        /// Wall-clock processing time in seconds
        processing_time: f64,
        /// Always [`RESULT_READY`]
        status: String,
    },
    /// A document was stored for the first time
    NewFile {
        /// SHA-256 of the stored document
        filehash: String,
        /// Where the document was stored
        filepath: String,
    },
}

impl HackrxEvent {
    /// Build a [`HackrxEvent::Result`] event.
    pub fn result(
        filehash: impl Into<String>,
        questions: Vec<String>,
        answers: Vec<String>,
        processing_time: f64,
    ) -> Self {
        Self::Result {
            filehash: filehash.into(),
            questions,
            answers,
            processing_time,
            status: RESULT_READY.to_string(),
        }
    }

    /// The event type tag, as it appears on the wire
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunHackrx { .. } => "run_hackrx",
            Self::Result { .. } => "result",
            Self::NewFile { .. } => "new_file",
        }
    }
}
