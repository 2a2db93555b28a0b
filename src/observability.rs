use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("architect.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("architect.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("architect.client.request_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("architect.stream.events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("architect.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("architect.stream.bytes");

pub(crate) static ONE_SHOT_FALLBACKS: Counter = Counter::new("architect.session.one_shot_fallbacks");

pub(crate) static CHAT_TURNS: Counter = Counter::new("architect.chat.turns");
pub(crate) static CHAT_TURN_FAILURES: Counter = Counter::new("architect.chat.turn_failures");
pub(crate) static CHAT_SUBMITS_IGNORED: Counter = Counter::new("architect.chat.submits_ignored");
pub(crate) static CHAT_FRAGMENTS: Counter = Counter::new("architect.chat.fragments");
pub(crate) static CHAT_TURN_DURATION: Moments =
    Moments::new("architect.chat.turn_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&ONE_SHOT_FALLBACKS);

    collector.register_counter(&CHAT_TURNS);
    collector.register_counter(&CHAT_TURN_FAILURES);
    collector.register_counter(&CHAT_SUBMITS_IGNORED);
    collector.register_counter(&CHAT_FRAGMENTS);
    collector.register_moments(&CHAT_TURN_DURATION);
}
