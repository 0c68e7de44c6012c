use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("parley.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("parley.client.request_errors");
pub(crate) static CLIENT_RATE_LIMITED: Counter = Counter::new("parley.client.rate_limited");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("parley.client.request_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("parley.stream.events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("parley.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("parley.stream.bytes");
pub(crate) static STREAM_HEARTBEATS: Counter = Counter::new("parley.stream.heartbeats");
pub(crate) static STREAM_DURATION: Moments = Moments::new("parley.stream.duration_seconds");

pub(crate) static TURNS_STARTED: Counter = Counter::new("parley.turns.started");
pub(crate) static TURNS_COMPLETED: Counter = Counter::new("parley.turns.completed");
pub(crate) static TURNS_FAILED: Counter = Counter::new("parley.turns.failed");
pub(crate) static TURNS_INTERRUPTED: Counter = Counter::new("parley.turns.interrupted");

pub(crate) static SESSIONS_CREATED: Counter = Counter::new("parley.sessions.created");
pub(crate) static SESSIONS_RENAMED: Counter = Counter::new("parley.sessions.renamed");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_RATE_LIMITED);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_HEARTBEATS);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&TURNS_STARTED);
    collector.register_counter(&TURNS_COMPLETED);
    collector.register_counter(&TURNS_FAILED);
    collector.register_counter(&TURNS_INTERRUPTED);

    collector.register_counter(&SESSIONS_CREATED);
    collector.register_counter(&SESSIONS_RENAMED);
}
