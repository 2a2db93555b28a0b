//! The streaming conversation controller.
//!
//! A [`Controller`] owns the transcript of one chat view and runs at most one
//! turn at a time: it appends the user message, opens a stream through the
//! [`ChatSession`], grows an assistant placeholder fragment by fragment, and
//! republishes the transcript through its [`TranscriptSink`] after every
//! mutation.  Failures never escape a turn; they become a fixed notice.
//!
//! All state sits behind one mutex that is only held for the duration of a
//! mutation plus its publication, never across an await.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::error::{Error, Result};
use crate::observability::{
    CHAT_FRAGMENTS, CHAT_SUBMITS_IGNORED, CHAT_TURN_DURATION, CHAT_TURN_FAILURES, CHAT_TURNS,
};
use crate::render::{Change, TranscriptSink};
use crate::session::{ChatSession, FragmentStream, TextFragment};
use crate::transcript::{MessageId, Transcript};

/// The assistant message every chat view starts with.
pub const WELCOME_MESSAGE: &str = "Hi! I'm your Docusaurus Architect. Ask me anything about installation, swizzling, versioning, or deployment.";

/// Appended after a turn fails.
pub const STREAM_ERROR_NOTICE: &str =
    "I encountered an error connecting to the knowledge base. Please try again.";

/// Why a submission was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The text was empty after trimming.
    Empty,
    /// A turn is already in flight.
    Busy,
    /// The view has been disposed.
    Disposed,
}

/// How a call to [`Controller::submit`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing happened; the transcript is unchanged.
    Ignored(IgnoreReason),
    /// The reply streamed to completion.
    Completed,
    /// The turn failed and the error notice was appended.
    Failed,
    /// The view was disposed while the turn was in flight.
    Abandoned,
}

struct ViewState {
    transcript: Transcript,
    sink: Box<dyn TranscriptSink>,
    busy: bool,
    disposed: bool,
}

impl ViewState {
    fn publish(&mut self, change: Change) {
        self.sink.publish(&self.transcript, &change);
    }

    fn begin_assistant(&mut self) -> Result<MessageId> {
        let id = self.transcript.begin_assistant()?;
        self.publish(Change::Appended(id));
        Ok(id)
    }

    fn append(&mut self, id: MessageId, fragment: TextFragment) -> Result<()> {
        self.transcript.append_fragment(id, &fragment.text)?;
        self.publish(Change::Fragment {
            id,
            text: fragment.text,
        });
        Ok(())
    }

    fn complete(&mut self, id: MessageId) -> Result<()> {
        self.transcript.complete(id)?;
        self.publish(Change::Completed(id));
        Ok(())
    }

    fn fail(&mut self, placeholder: Option<MessageId>) {
        if let Some(id) = placeholder
            && self.transcript.interrupt(id).is_ok()
        {
            self.publish(Change::Interrupted(id));
        }
        let notice = self.transcript.push_notice(STREAM_ERROR_NOTICE);
        self.publish(Change::Appended(notice));
    }
}

/// Clears the busy flag however the turn ends, including when the `submit`
/// future is dropped mid-await.
struct BusyGuard<'a> {
    state: &'a Mutex<ViewState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .busy = false;
    }
}

/// Drives the turns of one chat view.
pub struct Controller<S: ChatSession> {
    session: S,
    state: Mutex<ViewState>,
    turn_timeout: Option<Duration>,
}

impl<S: ChatSession> Controller<S> {
    /// A controller whose transcript is seeded with [`WELCOME_MESSAGE`].
    pub fn new(session: S, sink: impl TranscriptSink + 'static) -> Self {
        Self::from_transcript(session, sink, Transcript::with_welcome(WELCOME_MESSAGE))
    }

    /// A controller that continues an existing transcript instead of starting
    /// from the welcome message.
    pub fn from_transcript(
        session: S,
        sink: impl TranscriptSink + 'static,
        transcript: Transcript,
    ) -> Self {
        Self {
            session,
            state: Mutex::new(ViewState {
                transcript,
                sink: Box::new(sink),
                busy: false,
                disposed: false,
            }),
            turn_timeout: None,
        }
    }

    /// Treat a stream that produces nothing for `timeout` as failed.
    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// A copy of the transcript as it is now.
    pub fn snapshot(&self) -> Transcript {
        self.lock().transcript.clone()
    }

    /// Run `f` against the current transcript without copying it.
    pub fn with_transcript<R>(&self, f: impl FnOnce(&Transcript) -> R) -> R {
        f(&self.lock().transcript)
    }

    /// Tear down the view.
    ///
    /// Once this returns the transcript is frozen: an in-flight turn stops at
    /// its next fragment and publishes nothing more, and later submissions are
    /// ignored.
    pub fn dispose(&self) {
        let mut view = self.lock();
        if !view.disposed {
            tracing::info!(busy = view.busy, "disposing chat view");
            view.disposed = true;
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` unless the view has been disposed.
    fn update<T>(&self, f: impl FnOnce(&mut ViewState) -> T) -> Option<T> {
        let mut view = self.lock();
        if view.disposed {
            None
        } else {
            Some(f(&mut *view))
        }
    }

    /// Run one turn for `user_text`.
    ///
    /// Empty input, a turn already in flight, or a disposed view leave the
    /// transcript untouched and return [`SubmitOutcome::Ignored`].
    pub async fn submit(&self, user_text: &str) -> SubmitOutcome {
        let _busy = {
            let mut view = self.lock();
            let rejection = if user_text.trim().is_empty() {
                Some(IgnoreReason::Empty)
            } else if view.disposed {
                Some(IgnoreReason::Disposed)
            } else if view.busy {
                Some(IgnoreReason::Busy)
            } else {
                None
            };
            if let Some(reason) = rejection {
                CHAT_SUBMITS_IGNORED.click();
                tracing::debug!(?reason, "ignoring submission");
                return SubmitOutcome::Ignored(reason);
            }
            let id = view.transcript.push_user(user_text);
            view.busy = true;
            view.publish(Change::Appended(id));
            BusyGuard { state: &self.state }
        };

        CHAT_TURNS.click();
        let start = Instant::now();
        let outcome = self.run_turn(user_text).await;
        CHAT_TURN_DURATION.add(start.elapsed().as_secs_f64());
        tracing::info!(?outcome, elapsed_ms = start.elapsed().as_millis() as u64, "chat turn finished");
        outcome
    }

    async fn run_turn(&self, user_text: &str) -> SubmitOutcome {
        let opened = match self.turn_timeout {
            Some(limit) => tokio::time::timeout(limit, self.session.start_stream(user_text))
                .await
                .unwrap_or_else(|_| Err(stalled(limit))),
            None => self.session.start_stream(user_text).await,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => return self.fail(None, &err),
        };

        let placeholder = match self.update(ViewState::begin_assistant) {
            None => return SubmitOutcome::Abandoned,
            Some(Ok(id)) => id,
            Some(Err(err)) => return self.fail(None, &err),
        };

        loop {
            if self.is_disposed() {
                return SubmitOutcome::Abandoned;
            }
            match self.next_fragment(&mut stream).await {
                Some(Ok(fragment)) => {
                    CHAT_FRAGMENTS.click();
                    match self.update(|view| view.append(placeholder, fragment)) {
                        None => return SubmitOutcome::Abandoned,
                        Some(Ok(())) => {}
                        Some(Err(err)) => return self.fail(Some(placeholder), &err),
                    }
                }
                Some(Err(err)) => return self.fail(Some(placeholder), &err),
                None => break,
            }
        }

        match self.update(|view| view.complete(placeholder)) {
            None => SubmitOutcome::Abandoned,
            Some(Ok(())) => SubmitOutcome::Completed,
            Some(Err(err)) => self.fail(Some(placeholder), &err),
        }
    }

    async fn next_fragment(&self, stream: &mut FragmentStream) -> Option<Result<TextFragment>> {
        match self.turn_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .unwrap_or_else(|_| Some(Err(stalled(limit)))),
            None => stream.next().await,
        }
    }

    fn fail(&self, placeholder: Option<MessageId>, err: &Error) -> SubmitOutcome {
        CHAT_TURN_FAILURES.click();
        tracing::warn!(error = %err, retryable = err.is_retryable(), "chat turn failed");
        match self.update(|view| view.fail(placeholder)) {
            None => SubmitOutcome::Abandoned,
            Some(()) => SubmitOutcome::Failed,
        }
    }
}

fn stalled(limit: Duration) -> Error {
    Error::timeout(
        format!("no response within {} seconds", limit.as_secs_f64()),
        Some(limit.as_secs_f64()),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::render::NullSink;
    use crate::session::{Scripted, ScriptedSession};
    use crate::transcript::{MessageState, Role};

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<Change>>>);

    impl Recording {
        fn changes(&self) -> Vec<Change> {
            self.0.lock().unwrap().clone()
        }
    }

    impl TranscriptSink for Recording {
        fn publish(&mut self, _: &Transcript, change: &Change) {
            self.0.lock().unwrap().push(change.clone());
        }
    }

    fn pause(ms: u64) -> Scripted {
        Scripted::Pause(Duration::from_millis(ms))
    }

    fn text(t: &str) -> Scripted {
        Scripted::Text(t.to_string())
    }

    #[tokio::test]
    async fn completed_turn() {
        let sink = Recording::default();
        let session = ScriptedSession::new().with_fragments(["Hel", "lo, ", "world"]);
        let controller = Controller::new(session, sink.clone());
        assert!(!controller.is_busy());

        let outcome = controller.submit("Say hello").await;
        assert_eq!(outcome, SubmitOutcome::Completed);
        assert!(!controller.is_busy());

        let transcript = controller.snapshot();
        assert_eq!(transcript.len(), 3);
        let messages: Vec<_> = transcript.iter().collect();
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "Say hello");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, "Hello, world");
        assert_eq!(messages[2].state, MessageState::Complete);

        let changes = sink.changes();
        assert_eq!(changes.len(), 6);
        assert_eq!(changes[0], Change::Appended(messages[1].id));
        assert_eq!(changes[1], Change::Appended(messages[2].id));
        assert_eq!(
            changes[2],
            Change::Fragment { id: messages[2].id, text: "Hel".to_string() }
        );
        assert_eq!(changes[5], Change::Completed(messages[2].id));
        assert_eq!(controller.session().received(), vec!["Say hello"]);
    }

    #[tokio::test]
    async fn blank_submissions_are_ignored() {
        let sink = Recording::default();
        let controller = Controller::new(ScriptedSession::new(), sink.clone());
        for input in ["", "   ", "\n\t"] {
            assert_eq!(
                controller.submit(input).await,
                SubmitOutcome::Ignored(IgnoreReason::Empty)
            );
        }
        assert_eq!(controller.snapshot().len(), 1);
        assert!(sink.changes().is_empty());
        assert!(controller.session().received().is_empty());
    }

    #[tokio::test]
    async fn failure_keeps_partial_content() {
        let session = ScriptedSession::new().with_turn([
            text("Par"),
            text("tial"),
            Scripted::Fail(Error::streaming("connection reset", None)),
        ]);
        let controller = Controller::new(session, NullSink);
        assert_eq!(controller.submit("q").await, SubmitOutcome::Failed);
        assert!(!controller.is_busy());

        let transcript = controller.snapshot();
        let messages: Vec<_> = transcript.iter().collect();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].content, "Partial");
        assert_eq!(messages[2].state, MessageState::Interrupted);
        assert!(!messages[2].in_progress());
        assert_eq!(messages[3].content, STREAM_ERROR_NOTICE);
        assert_eq!(messages[3].state, MessageState::Complete);
    }

    #[tokio::test]
    async fn failure_before_stream_has_no_placeholder() {
        let session = ScriptedSession::new().with_failed_start(Error::connection("refused", None));
        let controller = Controller::new(session, NullSink);
        assert_eq!(controller.submit("q").await, SubmitOutcome::Failed);

        let transcript = controller.snapshot();
        let contents: Vec<_> = transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![WELCOME_MESSAGE, "q", STREAM_ERROR_NOTICE]);
        assert!(transcript.in_progress().is_none());
        assert!(!controller.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn submission_while_busy_is_ignored() {
        let session = ScriptedSession::new()
            .with_turn([text("Build"), pause(100), text(" then deploy.")])
            .with_fragments(["unused"]);
        let controller = Controller::new(session, NullSink);

        let (first, second) = tokio::join!(controller.submit("How do I deploy?"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(controller.is_busy());
            let before = controller.snapshot();
            let outcome = controller.submit("Another question").await;
            assert_eq!(controller.snapshot(), before);
            outcome
        });
        assert_eq!(first, SubmitOutcome::Completed);
        assert_eq!(second, SubmitOutcome::Ignored(IgnoreReason::Busy));
        assert_eq!(controller.snapshot().len(), 3);
        assert_eq!(controller.session().received(), vec!["How do I deploy?"]);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_freezes_transcript() {
        let sink = Recording::default();
        let session = ScriptedSession::new().with_turn([text("a"), pause(50), text("b")]);
        let controller = Controller::new(session, sink.clone());

        let (outcome, published) = tokio::join!(controller.submit("q"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            controller.dispose();
            sink.changes().len()
        });
        assert_eq!(outcome, SubmitOutcome::Abandoned);
        assert_eq!(sink.changes().len(), published);

        let transcript = controller.snapshot();
        let last = transcript.last().unwrap();
        assert_eq!(last.content, "a");
        assert_eq!(last.state, MessageState::Streaming);
        assert!(!controller.is_busy());
        assert_eq!(
            controller.submit("again").await,
            SubmitOutcome::Ignored(IgnoreReason::Disposed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_stream_times_out() {
        let session = ScriptedSession::new().with_turn([text("a"), Scripted::Hang]);
        let controller =
            Controller::new(session, NullSink).with_turn_timeout(Some(Duration::from_secs(5)));
        assert_eq!(controller.submit("q").await, SubmitOutcome::Failed);

        let transcript = controller.snapshot();
        let messages: Vec<_> = transcript.iter().collect();
        assert_eq!(messages[2].content, "a");
        assert_eq!(messages[2].state, MessageState::Interrupted);
        assert_eq!(messages[3].content, STREAM_ERROR_NOTICE);
    }

    #[tokio::test]
    async fn continues_existing_transcript() {
        let mut transcript = Transcript::new();
        transcript.push_notice("Earlier session.");
        let session = ScriptedSession::new().with_fragments(["ok"]);
        let controller = Controller::from_transcript(session, NullSink, transcript);
        assert_eq!(controller.submit("next").await, SubmitOutcome::Completed);
        let contents = controller.with_transcript(|t| {
            t.iter().map(|m| m.content.clone()).collect::<Vec<_>>()
        });
        assert_eq!(contents, vec!["Earlier session.", "next", "ok"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_that_never_opens_times_out() {
        let sink = Recording::default();
        let session = ScriptedSession::new().with_hanging_start();
        let controller =
            Controller::new(session, sink.clone()).with_turn_timeout(Some(Duration::from_secs(5)));
        assert_eq!(controller.submit("q").await, SubmitOutcome::Failed);
        assert!(!controller.is_busy());

        let transcript = controller.snapshot();
        let contents: Vec<_> = transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec![WELCOME_MESSAGE, "q", STREAM_ERROR_NOTICE]);
        assert!(transcript.in_progress().is_none());
        assert_eq!(sink.changes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_submit_clears_busy() {
        let session = ScriptedSession::new().with_turn([Scripted::Hang]);
        let controller = Controller::new(session, NullSink);
        let result =
            tokio::time::timeout(Duration::from_secs(1), controller.submit("q")).await;
        assert!(result.is_err());
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn turns_run_back_to_back() {
        let session = ScriptedSession::new()
            .with_fragments(["one"])
            .with_fragments(["two"]);
        let controller = Controller::new(session, NullSink);
        assert_eq!(controller.submit("1").await, SubmitOutcome::Completed);
        assert_eq!(controller.submit("2").await, SubmitOutcome::Completed);
        let contents = controller.with_transcript(|t| {
            t.iter().map(|m| m.content.clone()).collect::<Vec<_>>()
        });
        assert_eq!(contents, vec![WELCOME_MESSAGE, "1", "one", "2", "two"]);
    }
}
