use std::sync::atomic::{AtomicU64, Ordering};

use echo_chat_model::ErrorKind;

/// Decides which requests of a [`crate::SimulatedProvider`] should fail.
///
/// The plan is shared between clones of a provider, so the remaining count
/// drops across every request sent through any of them.
#[derive(Debug)]
pub(crate) struct FailurePlan {
    kind: ErrorKind,
    remaining: Option<AtomicU64>,
}

impl FailurePlan {
    /// `times == 0` makes every request fail.
    pub fn new(kind: ErrorKind, times: u64) -> Self {
        let remaining = (times > 0).then(|| AtomicU64::new(times));
        Self { kind, remaining }
    }

    /// Consumes one failure, returning its kind if the next request should
    /// fail.
    pub fn next_failure(&self) -> Option<ErrorKind> {
        let Some(remaining) = &self.remaining else {
            return Some(self.kind);
        };
        remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                n.checked_sub(1)
            })
            .ok()
            .map(|_| self.kind)
    }
}
