use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("anne.client.requests");
pub(crate) static CLIENT_SUCCESSES: Counter = Counter::new("anne.client.successes");
pub(crate) static CLIENT_NETWORK_FAILURES: Counter = Counter::new("anne.client.network_failures");
pub(crate) static CLIENT_BAD_STATUS: Counter = Counter::new("anne.client.bad_status");
pub(crate) static CLIENT_MALFORMED_BODY: Counter = Counter::new("anne.client.malformed_body");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("anne.client.request_duration_seconds");

pub(crate) static SESSION_SUBMITS: Counter = Counter::new("anne.session.submits");
pub(crate) static SESSION_IGNORED_EMPTY: Counter = Counter::new("anne.session.ignored_empty");
pub(crate) static SESSION_IGNORED_BUSY: Counter = Counter::new("anne.session.ignored_busy");
pub(crate) static SESSION_FALLBACKS: Counter = Counter::new("anne.session.fallbacks");
pub(crate) static SESSION_STALE_COMPLETIONS: Counter =
    Counter::new("anne.session.stale_completions");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_SUCCESSES);
    collector.register_counter(&CLIENT_NETWORK_FAILURES);
    collector.register_counter(&CLIENT_BAD_STATUS);
    collector.register_counter(&CLIENT_MALFORMED_BODY);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&SESSION_SUBMITS);
    collector.register_counter(&SESSION_IGNORED_EMPTY);
    collector.register_counter(&SESSION_IGNORED_BUSY);
    collector.register_counter(&SESSION_FALLBACKS);
    collector.register_counter(&SESSION_STALE_COMPLETIONS);
}
