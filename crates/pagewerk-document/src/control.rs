// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cancellation and progress reporting between page-level work units.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use pagewerk_core::Progress;
use pagewerk_core::error::{PagewerkError, Result};

/// Shared flag a caller flips to stop a long operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress callback. May be invoked from worker threads.
pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

/// Per-call cancellation token and progress sink.
///
/// Create one per request: a token cancelled for one request never leaks
/// into another, so partial results can't be mixed across requests.
#[derive(Clone, Default)]
pub struct JobControl {
    cancel: CancelToken,
    progress: Option<ProgressFn>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, callback: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// `Err(Cancelled)` once the token has been flipped.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(PagewerkError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Start counting `units_total` work units for one operation.
    pub fn tracker(&self, units_total: usize) -> ProgressTracker<'_> {
        ProgressTracker {
            control: self,
            completed: AtomicUsize::new(0),
            units_total,
        }
    }
}

impl fmt::Debug for JobControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobControl")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}

/// Counts completed units and forwards them to the progress callback.
pub struct ProgressTracker<'a> {
    control: &'a JobControl,
    completed: AtomicUsize,
    units_total: usize,
}

impl ProgressTracker<'_> {
    /// Cancellation check to run before each unit.
    pub fn checkpoint(&self) -> Result<()> {
        self.control.checkpoint()
    }

    /// Record one finished unit (successful or not).
    pub fn unit_done(&self) {
        let units_completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(callback) = &self.control.progress {
            callback(Progress {
                units_completed,
                units_total: self.units_total,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn checkpoint_fails_after_cancel() {
        let token = CancelToken::new();
        let control = JobControl::new().with_cancel(token.clone());
        assert!(control.checkpoint().is_ok());
        token.cancel();
        assert!(matches!(control.checkpoint(), Err(PagewerkError::Cancelled)));
    }

    #[test]
    fn tracker_reports_each_unit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let control = JobControl::new().with_progress(move |p| sink.lock().unwrap().push(p));

        let tracker = control.tracker(2);
        tracker.unit_done();
        tracker.unit_done();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[1],
            Progress {
                units_completed: 2,
                units_total: 2
            }
        );
    }

    #[test]
    fn separate_controls_do_not_share_cancellation() {
        let first = JobControl::new();
        let second = JobControl::new();
        first.cancel_token().cancel();
        assert!(first.checkpoint().is_err());
        assert!(second.checkpoint().is_ok());
    }
}
