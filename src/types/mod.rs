// Public modules
pub mod content_block;
pub mod message_param;
pub mod messages_request;
pub mod response_message;
pub mod stream_event;
pub mod usage;

// Re-exports
pub use content_block::{ContentBlock, ContentBlockDelta};
pub use message_param::{MessageParam, MessageRole};
pub use messages_request::MessagesRequest;
pub use response_message::ResponseMessage;
pub use stream_event::{MessageDelta, StreamError, StreamEvent};
pub use usage::Usage;
