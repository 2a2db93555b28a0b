//! Chat sessions: the seam between the conversation controller and the model.
//!
//! A [`ChatSession`] opens one fragment stream per turn and answers one-shot
//! prompts.  [`AssistantSession`] is the production implementation backed by
//! the [`Anthropic`] client; [`ScriptedSession`] replays canned turns and is
//! what the tests drive the controller with.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};

use crate::client::{Anthropic, EventStream};
use crate::error::{Error, Result};
use crate::observability::ONE_SHOT_FALLBACKS;
use crate::types::{MessageParam, MessagesRequest, StreamEvent};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5";

/// Default maximum tokens per response.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Returned by [`ChatSession::one_shot`] when the model answers with no text.
pub const ONE_SHOT_EMPTY_TEXT: &str = "Could not generate explanation.";

/// Returned by [`ChatSession::one_shot`] when the call fails.
pub const ONE_SHOT_FAILURE_TEXT: &str = "Failed to analyze configuration.";

/// The system prompt every assistant session starts with unless overridden.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an expert Docusaurus consultant and React engineer.
Your goal is to help users install, configure, and customize Docusaurus websites.

Guidelines:
1. Provide clear, copy-pasteable code snippets (bash for commands, JS/TS for config).
2. Explain complex concepts like 'swizzling' or 'versioning' simply.
3. If the user asks about specific plugins, provide their npm install commands and config usage.
4. Assume the user is using the latest Docusaurus version (3.x).
5. Format responses using Markdown.";

/// An incremental piece of assistant text.  May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFragment {
    pub text: String,
}

impl TextFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl From<&str> for TextFragment {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// The fragments of one turn.  Finite and not restartable; its end means the
/// turn completed, and failures arrive as `Err` items.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<TextFragment>> + Send>>;

/// A conversation with a remote model.
///
/// The session owns the conversation history; callers send only the new turn.
#[async_trait::async_trait]
pub trait ChatSession: Send + Sync {
    /// Send one user turn and return the stream of the reply.
    async fn start_stream(&self, turn_text: &str) -> Result<FragmentStream>;

    /// Ask a single stateless question.  Never fails: errors degrade to
    /// [`ONE_SHOT_FAILURE_TEXT`].
    async fn one_shot(&self, prompt: &str) -> String;
}

#[async_trait::async_trait]
impl<S: ChatSession + ?Sized> ChatSession for Arc<S> {
    async fn start_stream(&self, turn_text: &str) -> Result<FragmentStream> {
        (**self).start_stream(turn_text).await
    }

    async fn one_shot(&self, prompt: &str) -> String {
        (**self).one_shot(prompt).await
    }
}

//////////////////////////////////////////// SessionConfig ///////////////////////////////////////////

/// Request parameters for an [`AssistantSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub model: String,
    pub max_tokens: u32,
    pub system: Option<String>,
    pub temperature: Option<f32>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    fn request(&self, messages: Vec<MessageParam>) -> MessagesRequest {
        MessagesRequest::new(self.model.clone(), self.max_tokens, messages)
            .with_system(self.system.clone())
            .with_temperature(self.temperature)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////// AssistantSession //////////////////////////////////////////

type History = Arc<Mutex<Vec<MessageParam>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A session backed by the Anthropic Messages API.
///
/// Each turn sends the accumulated history plus the new user turn.  A reply
/// that streams to completion is recorded in the history; a reply that fails
/// or is abandoned rolls the user turn back out, so the history always
/// alternates user and assistant.
pub struct AssistantSession {
    client: Anthropic,
    config: Mutex<SessionConfig>,
    history: History,
}

impl AssistantSession {
    pub fn new(client: Anthropic, config: SessionConfig) -> Self {
        Self {
            client,
            config: Mutex::new(config),
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A copy of the current request parameters.
    pub fn config(&self) -> SessionConfig {
        lock(&self.config).clone()
    }

    /// Switch models for subsequent turns.
    pub fn set_model(&self, model: impl Into<String>) {
        let model = model.into();
        tracing::info!(%model, "switching model");
        lock(&self.config).model = model;
    }

    /// The turns recorded so far.
    pub fn history(&self) -> Vec<MessageParam> {
        lock(&self.history).clone()
    }

    /// Forget all recorded turns.
    pub fn clear_history(&self) {
        lock(&self.history).clear();
    }
}

#[async_trait::async_trait]
impl ChatSession for AssistantSession {
    async fn start_stream(&self, turn_text: &str) -> Result<FragmentStream> {
        let (request, turn_index) = {
            let mut history = lock(&self.history);
            let turn_index = history.len();
            history.push(MessageParam::user(turn_text));
            (self.config().request(history.clone()), turn_index)
        };
        let recorder = TurnRecorder::new(Arc::clone(&self.history), turn_index);
        let events = match self.client.stream(&request).await {
            Ok(events) => events,
            Err(err) => {
                drop(recorder);
                return Err(err);
            }
        };
        Ok(Box::pin(recorded(text_fragments(events), recorder)))
    }

    async fn one_shot(&self, prompt: &str) -> String {
        let request = {
            let config = lock(&self.config);
            MessagesRequest::new(
                config.model.clone(),
                config.max_tokens,
                vec![MessageParam::user(prompt)],
            )
        };
        match self.client.send(&request).await {
            Ok(message) => {
                let text = message.text();
                if text.trim().is_empty() {
                    ONE_SHOT_EMPTY_TEXT.to_string()
                } else {
                    text
                }
            }
            Err(err) => {
                ONE_SHOT_FALLBACKS.click();
                tracing::warn!(error = %err, "one-shot request failed");
                ONE_SHOT_FAILURE_TEXT.to_string()
            }
        }
    }
}

/// Map wire events to text fragments.
///
/// Only text deltas produce fragments; every other event is skipped.  The
/// first error ends the stream, and so does a body that closes before
/// `message_stop`, which yields a streaming error instead of a clean end.
pub fn text_fragments(events: EventStream) -> impl Stream<Item = Result<TextFragment>> + Send {
    stream::unfold((Some(events), false), |(events, mut stopped)| async move {
        let Some(mut events) = events else {
            return None;
        };
        loop {
            match events.next().await {
                Some(Ok(StreamEvent::MessageStop)) => stopped = true,
                Some(Ok(event)) => {
                    if let Some(text) = event.text_delta() {
                        let fragment = TextFragment::new(text);
                        return Some((Ok(fragment), (Some(events), stopped)));
                    }
                }
                Some(Err(err)) => return Some((Err(err), (None, stopped))),
                None if stopped => return None,
                None => {
                    let err = Error::streaming("stream ended before message_stop", None);
                    return Some((Err(err), (None, stopped)));
                }
            }
        }
    })
}

/// Records the assistant reply of one turn into the shared history.
///
/// Unless `finish` runs, dropping the recorder removes the user turn again.
struct TurnRecorder {
    history: History,
    turn_index: usize,
    text: String,
    finished: bool,
}

impl TurnRecorder {
    fn new(history: History, turn_index: usize) -> Self {
        Self {
            history,
            turn_index,
            text: String::new(),
            finished: false,
        }
    }

    fn finish(&mut self) {
        if self.text.is_empty() {
            return;
        }
        lock(&self.history).push(MessageParam::assistant(std::mem::take(&mut self.text)));
        self.finished = true;
    }
}

impl Drop for TurnRecorder {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(turn_index = self.turn_index, "rolling back unfinished turn");
            lock(&self.history).truncate(self.turn_index);
        }
    }
}

fn recorded<S>(fragments: S, recorder: TurnRecorder) -> impl Stream<Item = Result<TextFragment>> + Send
where
    S: Stream<Item = Result<TextFragment>> + Send,
{
    stream::unfold(
        (Box::pin(fragments), Some(recorder)),
        |(mut fragments, mut recorder)| async move {
            let Some(active) = recorder.as_mut() else {
                return None;
            };
            match fragments.next().await {
                Some(Ok(fragment)) => {
                    active.text.push_str(&fragment.text);
                    Some((Ok(fragment), (fragments, recorder)))
                }
                Some(Err(err)) => Some((Err(err), (fragments, None))),
                None => {
                    active.finish();
                    None
                }
            }
        },
    )
}

////////////////////////////////////////// ScriptedSession ///////////////////////////////////////////

/// One step of a scripted reply.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Deliver a fragment.
    Text(String),
    /// Deliver an error item.
    Fail(Error),
    /// Wait before the next step.
    Pause(Duration),
    /// Never deliver anything again.
    Hang,
}

#[derive(Debug)]
enum ScriptedTurn {
    Steps(Vec<Scripted>),
    FailedStart(Error),
    HangingStart,
}

/// A [`ChatSession`] that replays scripted turns in order.
///
/// Turns are consumed one per `start_stream` call.  A turn scripted with
/// [`ScriptedSession::with_failed_start`] fails before any stream opens, and
/// one scripted with [`ScriptedSession::with_hanging_start`] never opens.
///
/// ```
/// use docusaurus_architect::{ChatSession, ScriptedSession};
/// use futures::StreamExt;
///
/// # tokio_test::block_on(async {
/// let session = ScriptedSession::new().with_fragments(["Hel", "lo"]);
/// let mut stream = session.start_stream("hi").await.unwrap();
/// let mut text = String::new();
/// while let Some(fragment) = stream.next().await {
///     text.push_str(fragment.unwrap().as_str());
/// }
/// assert_eq!(text, "Hello");
/// # });
/// ```
#[derive(Debug, Default)]
pub struct ScriptedSession {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    one_shots: Mutex<VecDeque<Option<String>>>,
    received: Mutex<Vec<String>>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a turn whose reply is the given fragments.
    pub fn with_fragments<I, T>(self, fragments: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.with_turn(fragments.into_iter().map(|f| Scripted::Text(f.into())))
    }

    /// Script a turn from arbitrary steps.
    pub fn with_turn(self, steps: impl IntoIterator<Item = Scripted>) -> Self {
        lock(&self.turns).push_back(ScriptedTurn::Steps(steps.into_iter().collect()));
        self
    }

    /// Script a turn whose stream cannot be opened.
    pub fn with_failed_start(self, err: Error) -> Self {
        lock(&self.turns).push_back(ScriptedTurn::FailedStart(err));
        self
    }

    /// Script a turn whose `start_stream` call never returns.
    pub fn with_hanging_start(self) -> Self {
        lock(&self.turns).push_back(ScriptedTurn::HangingStart);
        self
    }

    /// Script the next one-shot answer; `None` simulates a failed call.
    pub fn with_one_shot(self, answer: Option<String>) -> Self {
        lock(&self.one_shots).push_back(answer);
        self
    }

    /// Every turn and prompt this session has been sent, in order.
    pub fn received(&self) -> Vec<String> {
        lock(&self.received).clone()
    }
}

#[async_trait::async_trait]
impl ChatSession for ScriptedSession {
    async fn start_stream(&self, turn_text: &str) -> Result<FragmentStream> {
        lock(&self.received).push(turn_text.to_string());
        let turn = lock(&self.turns).pop_front();
        let steps = match turn {
            Some(ScriptedTurn::Steps(steps)) => steps,
            Some(ScriptedTurn::FailedStart(err)) => return Err(err),
            Some(ScriptedTurn::HangingStart) => futures::future::pending().await,
            None => return Err(Error::validation("no scripted turn remaining", None)),
        };
        Ok(Box::pin(stream::unfold(
            steps.into_iter(),
            |mut steps| async move {
                loop {
                    let Some(step) = steps.next() else {
                        return None;
                    };
                    match step {
                        Scripted::Text(text) => return Some((Ok(TextFragment::new(text)), steps)),
                        Scripted::Fail(err) => return Some((Err(err), steps)),
                        Scripted::Pause(duration) => tokio::time::sleep(duration).await,
                        Scripted::Hang => futures::future::pending::<()>().await,
                    }
                }
            },
        )))
    }

    async fn one_shot(&self, prompt: &str) -> String {
        lock(&self.received).push(prompt.to_string());
        match lock(&self.one_shots).pop_front().flatten() {
            Some(answer) if answer.trim().is_empty() => ONE_SHOT_EMPTY_TEXT.to_string(),
            Some(answer) => answer,
            None => ONE_SHOT_FAILURE_TEXT.to_string(),
        }
    }
}
