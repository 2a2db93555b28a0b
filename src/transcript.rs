//! The message model of a chat view.
//!
//! A [`Transcript`] is an append-only sequence of [`Message`]s.  At most one
//! message is in progress at a time, and only the most recently appended one
//! can be: fragments are appended to it until it is completed or interrupted.

use std::fmt;

use time::OffsetDateTime;

use crate::error::{Error, Result};

/// Stable identifier for one message, unique within its transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Lifecycle of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageState {
    /// Placeholder appended; no fragment yet.
    Pending,
    /// At least one fragment received.
    Streaming,
    /// Finished normally, or never streamed.
    Complete,
    /// The stream failed after the message was created.  Content is kept as-is.
    Interrupted,
}

impl MessageState {
    /// True for `Pending` and `Streaming`.
    pub fn in_progress(self) -> bool {
        matches!(self, MessageState::Pending | MessageState::Streaming)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub state: MessageState,
    pub created_at: OffsetDateTime,
}

impl Message {
    pub fn in_progress(&self) -> bool {
        self.state.in_progress()
    }
}

/// Ordered, append-only history of a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcript seeded with one complete assistant message.
    pub fn with_welcome(text: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.push(Role::Assistant, text.into(), MessageState::Complete);
        transcript
    }

    fn push(&mut self, role: Role, content: String, state: MessageState) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            content,
            state,
            created_at: OffsetDateTime::now_utc(),
        });
        id
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Role::User, text.into(), MessageState::Complete)
    }

    /// Append an empty assistant placeholder that fragments will fill.
    pub fn begin_assistant(&mut self) -> Result<MessageId> {
        if let Some(active) = self.in_progress() {
            return Err(Error::validation(
                format!("message {} is still in progress", active.id),
                None,
            ));
        }
        Ok(self.push(Role::Assistant, String::new(), MessageState::Pending))
    }

    /// Append a fixed-text assistant message, such as an error notice.
    pub fn push_notice(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Role::Assistant, text.into(), MessageState::Complete)
    }

    fn active_mut(&mut self, id: MessageId) -> Result<&mut Message> {
        match self.messages.last_mut() {
            Some(last) if last.id == id && last.in_progress() => Ok(last),
            _ => Err(Error::validation(
                format!("message {id} is not the message in progress"),
                None,
            )),
        }
    }

    /// Concatenate `text` onto the in-progress message.
    ///
    /// An empty fragment leaves the content alone but still moves the message
    /// from `Pending` to `Streaming`.
    pub fn append_fragment(&mut self, id: MessageId, text: &str) -> Result<()> {
        let message = self.active_mut(id)?;
        message.content.push_str(text);
        message.state = MessageState::Streaming;
        Ok(())
    }

    pub fn complete(&mut self, id: MessageId) -> Result<()> {
        self.active_mut(id)?.state = MessageState::Complete;
        Ok(())
    }

    pub fn interrupt(&mut self, id: MessageId) -> Result<()> {
        self.active_mut(id)?.state = MessageState::Interrupted;
        Ok(())
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        // Ids are allocated in append order.
        self.messages
            .binary_search_by_key(&id, |m| m.id)
            .ok()
            .map(|index| &self.messages[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The message currently in progress, if any.
    pub fn in_progress(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.in_progress())
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_seed() {
        let transcript = Transcript::with_welcome("hi");
        assert_eq!(transcript.len(), 1);
        let first = transcript.last().unwrap();
        assert_eq!(first.role, Role::Assistant);
        assert_eq!(first.content, "hi");
        assert_eq!(first.state, MessageState::Complete);
        assert!(transcript.in_progress().is_none());
    }

    #[test]
    fn fragments_concatenate_in_order() {
        let mut transcript = Transcript::new();
        transcript.push_user("q");
        let id = transcript.begin_assistant().unwrap();
        assert_eq!(transcript.get(id).unwrap().state, MessageState::Pending);
        for fragment in ["Hel", "lo, ", "world"] {
            transcript.append_fragment(id, fragment).unwrap();
        }
        assert_eq!(transcript.get(id).unwrap().state, MessageState::Streaming);
        transcript.complete(id).unwrap();
        let message = transcript.get(id).unwrap();
        assert_eq!(message.content, "Hello, world");
        assert!(!message.in_progress());
    }

    #[test]
    fn empty_fragment_advances_state() {
        let mut transcript = Transcript::new();
        let id = transcript.begin_assistant().unwrap();
        transcript.append_fragment(id, "").unwrap();
        let message = transcript.get(id).unwrap();
        assert_eq!(message.content, "");
        assert_eq!(message.state, MessageState::Streaming);
    }

    #[test]
    fn only_one_message_in_progress() {
        let mut transcript = Transcript::new();
        let id = transcript.begin_assistant().unwrap();
        assert!(transcript.begin_assistant().unwrap_err().is_validation());
        transcript.interrupt(id).unwrap();
        assert!(transcript.begin_assistant().is_ok());
    }

    #[test]
    fn finished_messages_reject_mutation() {
        let mut transcript = Transcript::new();
        let id = transcript.begin_assistant().unwrap();
        transcript.append_fragment(id, "Par").unwrap();
        transcript.append_fragment(id, "tial").unwrap();
        transcript.interrupt(id).unwrap();
        assert!(transcript.append_fragment(id, "more").is_err());
        assert!(transcript.complete(id).is_err());
        let message = transcript.get(id).unwrap();
        assert_eq!(message.content, "Partial");
        assert_eq!(message.state, MessageState::Interrupted);
    }

    #[test]
    fn stale_id_is_rejected() {
        let mut transcript = Transcript::new();
        let user = transcript.push_user("q");
        let id = transcript.begin_assistant().unwrap();
        assert!(transcript.append_fragment(user, "x").is_err());
        assert!(transcript.append_fragment(id, "x").is_ok());
    }

    #[test]
    fn ids_are_unique_and_ordered() {
        let mut transcript = Transcript::with_welcome("hi");
        let a = transcript.push_user("a");
        let b = transcript.push_notice("b");
        assert!(a < b);
        let ids: Vec<_> = transcript.iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(transcript.get(b).unwrap().content, "b");
    }
}
