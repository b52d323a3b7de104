//! Per-run diagnostic collector.
//!
//! Fetch workers and pipeline stages append human-readable lines here; the
//! `update` command prints the whole log once the run is over. Every line is
//! also emitted as a `tracing` event at the time it is recorded.

use std::sync::Mutex;
use tracing::{info, warn};

/// Append-only, thread-safe log of one run.
#[derive(Debug, Default)]
pub struct RunLog {
    lines: Mutex<Vec<String>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an informational line.
    pub fn push(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.append(message);
    }

    /// Record a problem that did not stop the run.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.append(message);
    }

    /// Snapshot of all recorded lines in insertion order.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&self, message: String) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_push_preserves_order() {
        let log = RunLog::new();
        log.push("first");
        log.warn("second");
        log.push(String::from("third"));
        assert_eq!(log.lines(), vec!["first", "second", "third"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_empty() {
        let log = RunLog::new();
        assert!(log.is_empty());
        assert!(log.lines().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_appends() {
        let log = Arc::new(RunLog::new());
        let mut handles = Vec::new();

        for worker in 0..16 {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    log.push(format!("worker {} line {}", worker, i));
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(log.len(), 16 * 50);
    }
}
