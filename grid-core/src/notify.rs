//! Alerting interface the engine uses for the same-order blocker, plus a
//! throttling wrapper so a stuck blocker does not spam whatever channel the
//! executor wires up (Slack, PagerDuty, a log aggregator).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::warn;

/// Narrow alerting interface the engine emits to. The executor supplies a
/// concrete sink (out of scope here); the engine only ever calls `alert`.
pub trait NotificationSink {
    fn alert(&mut self, key: &str, message: &str);
}

/// Discards every alert. Logging still happens independently via `tracing`
/// at the engine's call sites, so this is safe to use when no external
/// channel is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn alert(&mut self, _key: &str, _message: &str) {}
}

const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(60);

/// Wraps any [`NotificationSink`] and suppresses repeat alerts for the same
/// key inside `min_interval` (default 60s, matching §6's "throttle per key
/// (>= 60s) and log always"). The underlying sink is only ever called when
/// the throttle allows it; a `tracing::warn!` line is emitted on every call
/// regardless, so operators watching logs never miss an occurrence even
/// when the external channel is throttled.
pub struct ThrottledSink<S: NotificationSink> {
    inner: S,
    min_interval: Duration,
    last_sent: HashMap<String, Instant>,
}

impl<S: NotificationSink> ThrottledSink<S> {
    pub fn new(inner: S) -> Self {
        Self::with_interval(inner, DEFAULT_MIN_INTERVAL)
    }

    pub fn with_interval(inner: S, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_sent: HashMap::new(),
        }
    }
}

impl<S: NotificationSink> NotificationSink for ThrottledSink<S> {
    fn alert(&mut self, key: &str, message: &str) {
        warn!(key = %key, message = %message, "alert");

        let now = Instant::now();
        let should_send = match self.last_sent.get(key) {
            Some(last) => now.duration_since(*last) >= self.min_interval,
            None => true,
        };
        if should_send {
            self.inner.alert(key, message);
            self.last_sent.insert(key.to_string(), now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingSink(Rc<RefCell<Vec<(String, String)>>>);

    impl NotificationSink for RecordingSink {
        fn alert(&mut self, key: &str, message: &str) {
            self.0.borrow_mut().push((key.to_string(), message.to_string()));
        }
    }

    #[test]
    fn throttled_sink_suppresses_repeat_within_interval() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sink = ThrottledSink::with_interval(RecordingSink(log.clone()), Duration::from_secs(3600));

        sink.alert("same_order:long", "duplicate fill detected");
        sink.alert("same_order:long", "duplicate fill detected again");
        sink.alert("same_order:short", "different key always passes through");

        let sent = log.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "same_order:long");
        assert_eq!(sent[1].0, "same_order:short");
    }
}
