//! Logging hook for client operations.
//!
//! The [`ClientLogger`] trait lets callers observe every API interaction passing
//! through the [`Anthropic`](crate::Anthropic) client.  [`TracingClientLogger`]
//! forwards them to `tracing` at trace level.

use crate::types::{MessagesRequest, ResponseMessage, StreamEvent};

/// A trait for logging client operations.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use docusaurus_architect::{Anthropic, TracingClientLogger};
///
/// let client = Anthropic::new(None)?.with_logger(Arc::new(TracingClientLogger));
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log an outgoing request before it is sent.
    fn log_request(&self, request: &MessagesRequest) {
        _ = request;
    }

    /// Log a complete response from a one-shot `send` call.
    fn log_response(&self, message: &ResponseMessage);

    /// Log an individual streaming event.
    fn log_stream_event(&self, event: &StreamEvent);
}

/// Logs every request, response, and stream event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingClientLogger;

impl ClientLogger for TracingClientLogger {
    fn log_request(&self, request: &MessagesRequest) {
        tracing::trace!(
            model = %request.model,
            turns = request.messages.len(),
            stream = request.stream,
            "sending request"
        );
    }

    fn log_response(&self, message: &ResponseMessage) {
        tracing::trace!(
            id = %message.id,
            input_tokens = message.usage.input_tokens,
            output_tokens = message.usage.output_tokens,
            "received response"
        );
    }

    fn log_stream_event(&self, event: &StreamEvent) {
        tracing::trace!(?event, "stream event");
    }
}
