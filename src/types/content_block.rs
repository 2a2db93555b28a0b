use serde::{Deserialize, Serialize};

/// A block of content in a response.
///
/// Only text is rendered; every other block type the API may add (tool use,
/// thinking, ...) deserializes as `Other` and is skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Generated text.
    Text {
        /// The text content.
        text: String,
    },

    /// A block type this crate does not render.
    #[serde(other)]
    Other,
}

/// An incremental update to a content block while streaming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockDelta {
    /// A piece of generated text.
    TextDelta {
        /// The text fragment, possibly empty.
        text: String,
    },

    /// A delta for a block type this crate does not render.
    #[serde(other)]
    Other,
}

impl ContentBlockDelta {
    /// Returns the text carried by this delta, if it is a text delta.
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentBlockDelta::TextDelta { text } => Some(text),
            ContentBlockDelta::Other => None,
        }
    }
}
