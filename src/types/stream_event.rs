use serde::{Deserialize, Serialize};

use crate::types::{ContentBlock, ContentBlockDelta, ResponseMessage, Usage};

/// An event in a message stream.
///
/// Events arrive as `message_start`, then any number of content block
/// start/delta/stop triples, then `message_delta` and `message_stop`.  Pings may
/// be interleaved anywhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Keep-alive with no payload.
    Ping,

    /// Start of the message, with metadata and initial usage.
    MessageStart {
        /// The message shell; content is empty.
        message: ResponseMessage,
    },

    /// Start of a content block.
    ContentBlockStart {
        /// Index of the block within the message.
        index: usize,
        /// Initial block content.
        content_block: ContentBlock,
    },

    /// Incremental update to a content block.
    ContentBlockDelta {
        /// Index of the block within the message.
        index: usize,
        /// The update.
        delta: ContentBlockDelta,
    },

    /// End of a content block.
    ContentBlockStop {
        /// Index of the block within the message.
        index: usize,
    },

    /// Top-level changes such as the stop reason and final output usage.
    MessageDelta {
        /// The changed fields.
        delta: MessageDelta,
        /// Cumulative usage.
        #[serde(default)]
        usage: Usage,
    },

    /// End of the stream.
    MessageStop,

    /// The server reported an error mid-stream.
    Error {
        /// Error details.
        error: StreamError,
    },
}

/// Fields carried by a `message_delta` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageDelta {
    /// Why generation stopped.
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Error payload of an `error` stream event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamError {
    /// Error type, e.g. `overloaded_error`.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable message.
    pub message: String,
}

impl StreamEvent {
    /// Returns the text of a text delta event.
    pub fn text_delta(&self) -> Option<&str> {
        match self {
            StreamEvent::ContentBlockDelta { delta, .. } => delta.text(),
            _ => None,
        }
    }
}
