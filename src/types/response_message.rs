use serde::{Deserialize, Serialize};

use crate::types::{ContentBlock, MessageRole, Usage};

/// A complete message returned by the API.
///
/// Returned directly by a one-shot request, and carried (with empty content)
/// by the `message_start` stream event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseMessage {
    /// Unique object identifier.
    pub id: String,

    /// The model that handled the request.
    pub model: String,

    /// Always `assistant` for responses.
    pub role: MessageRole,

    /// Content generated by the model.
    #[serde(default)]
    pub content: Vec<ContentBlock>,

    /// Why generation stopped, when known.
    #[serde(default)]
    pub stop_reason: Option<String>,

    /// Billing and rate-limit usage.
    #[serde(default)]
    pub usage: Usage,
}

impl ResponseMessage {
    /// Concatenates every text block in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect()
    }
}
