//! Decision model: what happens to a task after a failed attempt.
//!
//! Kept as a pure function of the retry counters so it can be tested without
//! a queue or a worker.

/// The next action for a task whose handler returned an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Push the task to the back of the queue; `retry` is the new retry_count.
    Requeue { retry: u32 },

    /// Retry budget exhausted: terminal failure.
    MarkFailed,
}

impl Decision {
    /// Retry while `retry_count < max_retries`, so a task runs at most
    /// `max_retries + 1` times.
    pub fn after_failure(retry_count: u32, max_retries: u32) -> Self {
        if retry_count < max_retries {
            Decision::Requeue {
                retry: retry_count + 1,
            }
        } else {
            Decision::MarkFailed
        }
    }
}
