use std::sync::atomic::{AtomicU64, Ordering};
use chrono::Utc;

/// Hands out strictly increasing millisecond tokens.
///
/// Tokens track wall-clock time but never repeat within a process: when two
/// callers land in the same millisecond the later one gets `last + 1`.
#[derive(Debug, Default)]
pub struct SubmissionClock {
    last: AtomicU64,
}

impl SubmissionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut prev = self.last.load(Ordering::Acquire);
        loop {
            let candidate = now.max(prev + 1);
            match self.last.compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}
