//! Test capture sinks (spec §4.D).

use std::sync::Arc;

use parking_lot::Mutex;

/// An append-only capture buffer of rendered payloads. Cheap to clone: every
/// clone shares the same underlying buffer, so attaching a sink to several
/// handlers (spec §4.F `add_sink`) observes all of them through one handle.
#[derive(Clone, Default)]
pub struct Sink {
    events: Arc<Mutex<Vec<String>>>,
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a post-render payload. Called by a handler's pipeline after a
    /// successful render, in addition to (or, for the null handler, instead
    /// of) writing to the destination.
    pub fn append(&self, payload: impl Into<String>) {
        self.events.lock().push(payload.into());
    }

    /// A snapshot of everything captured so far, in append order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_events_preserve_order() {
        let sink = Sink::new();
        sink.append("first");
        sink.append("second");
        assert_eq!(sink.events(), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn clones_share_the_same_buffer() {
        let sink = Sink::new();
        let handle = sink.clone();
        handle.append("via clone");
        assert_eq!(sink.events(), vec!["via clone".to_string()]);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let sink = Sink::new();
        sink.append("x");
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn concurrent_appends_are_serialized() {
        use std::thread;
        let sink = Sink::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sink = sink.clone();
                thread::spawn(move || {
                    for j in 0..50 {
                        sink.append(format!("{i}-{j}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sink.len(), 400);
    }
}
