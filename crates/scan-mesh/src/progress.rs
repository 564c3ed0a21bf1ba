//! Stage progress and coarse-grained cancellation.
//!
//! The pipeline announces each stage before it starts and once more with
//! [`DONE`] after the last one. A callback returning `false` cancels the run
//! at that boundary; a stage that has started always runs to completion.
//!
//! # Example
//!
//! ```ignore
//! use scan_mesh::progress::ProgressCallback;
//!
//! let callback: ProgressCallback = Box::new(|progress| {
//!     println!("[{:>3}%] {}", progress.percent(), progress.stage);
//!     !user_pressed_cancel()
//! });
//!
//! let processed = ScanPipeline::new(mesh)
//!     .with_progress(callback)
//!     .run(&config)?;
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{MeshError, MeshResult};

/// Stage name reported after the last stage finished.
pub const DONE: &str = "done";

/// Where a pipeline run stands, as seen by a [`ProgressCallback`].
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// Stages already finished.
    pub completed: usize,

    /// Stages this run executes.
    pub stage_count: usize,

    /// Stage about to start, or [`DONE`].
    pub stage: &'static str,

    /// Time since the run started.
    pub elapsed: Duration,
}

impl Progress {
    /// Finished share of the run, from 0.0 to 1.0.
    pub fn fraction(&self) -> f64 {
        if self.stage_count == 0 {
            1.0
        } else {
            self.completed.min(self.stage_count) as f64 / self.stage_count as f64
        }
    }

    /// Finished share of the run as a whole percentage.
    pub fn percent(&self) -> u32 {
        (self.fraction() * 100.0).round() as u32
    }

    /// True for the final report.
    pub fn is_done(&self) -> bool {
        self.stage == DONE
    }
}

/// Called at every stage boundary. Return `false` to cancel.
pub type ProgressCallback = Box<dyn Fn(&Progress) -> bool + Send + Sync>;

/// Counts finished stages and consults the callback between them.
pub struct ProgressTracker {
    completed: AtomicUsize,
    stage_count: usize,
    cancelled: AtomicBool,
    started: Instant,
    callback: Option<ProgressCallback>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("completed", &self.completed())
            .field("stage_count", &self.stage_count)
            .field("cancelled", &self.is_cancelled())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl ProgressTracker {
    /// Track a run of `stage_count` stages.
    pub fn new(stage_count: usize, callback: Option<ProgressCallback>) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            stage_count,
            cancelled: AtomicBool::new(false),
            started: Instant::now(),
            callback,
        }
    }

    /// Announce `stage` and return whether it may start.
    ///
    /// # Errors
    ///
    /// [`MeshError::Cancelled`] naming `stage` if the callback declined now
    /// or at an earlier boundary.
    pub fn begin(&self, stage: &'static str) -> MeshResult<()> {
        if self.is_cancelled() || !self.notify(stage) {
            self.cancel();
            info!(stage, completed = self.completed(), "Processing cancelled");
            return Err(MeshError::cancelled(stage));
        }
        debug!(stage, "Stage starting");
        Ok(())
    }

    /// Record that the current stage finished.
    pub fn stage_finished(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Send the final [`DONE`] report. The callback's answer is ignored.
    pub fn finish(&self) {
        if !self.is_cancelled() {
            self.notify(DONE);
        }
    }

    /// Stages finished so far.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Cancel at the next stage boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    fn notify(&self, stage: &'static str) -> bool {
        let Some(callback) = &self.callback else {
            return true;
        };
        callback(&Progress {
            completed: self.completed(),
            stage_count: self.stage_count,
            stage,
            elapsed: self.started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording(answer: bool) -> (ProgressCallback, Arc<Mutex<Vec<Progress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Box::new(move |p| {
            sink.lock().unwrap().push(p.clone());
            answer
        });
        (callback, seen)
    }

    #[test]
    fn test_fraction_and_percent() {
        let p = Progress {
            completed: 1,
            stage_count: 3,
            stage: "smoothing",
            elapsed: Duration::ZERO,
        };
        assert!((p.fraction() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(p.percent(), 33);
        assert!(!p.is_done());

        let empty = Progress {
            completed: 0,
            stage_count: 0,
            stage: DONE,
            elapsed: Duration::ZERO,
        };
        assert_eq!(empty.percent(), 100);
        assert!(empty.is_done());
    }

    #[test]
    fn test_without_callback_every_stage_starts() {
        let tracker = ProgressTracker::new(2, None);
        tracker.begin("noise filter").unwrap();
        tracker.stage_finished();
        tracker.begin("hole repair").unwrap();
        tracker.stage_finished();
        tracker.finish();
        assert_eq!(tracker.completed(), 2);
    }

    #[test]
    fn test_reports_carry_completed_count() {
        let (callback, seen) = recording(true);
        let tracker = ProgressTracker::new(2, Some(callback));
        tracker.begin("hole repair").unwrap();
        tracker.stage_finished();
        tracker.begin("normal estimation").unwrap();
        tracker.stage_finished();
        tracker.finish();

        let seen = seen.lock().unwrap();
        let summary: Vec<(usize, &str)> = seen.iter().map(|p| (p.completed, p.stage)).collect();
        assert_eq!(
            summary,
            vec![(0, "hole repair"), (1, "normal estimation"), (2, DONE)]
        );
        assert_eq!(seen[2].percent(), 100);
    }

    #[test]
    fn test_declined_stage_cancels_for_good() {
        let (callback, seen) = recording(false);
        let tracker = ProgressTracker::new(3, Some(callback));

        let err = tracker.begin("smoothing").unwrap_err();
        assert!(matches!(err, MeshError::Cancelled { stage: "smoothing" }));
        assert!(tracker.is_cancelled());

        // Later boundaries fail without consulting the callback again
        assert!(tracker.begin("normal estimation").is_err());
        tracker.finish();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_from_outside() {
        let tracker = ProgressTracker::new(1, None);
        tracker.cancel();
        assert!(matches!(
            tracker.begin("decimation"),
            Err(MeshError::Cancelled { stage: "decimation" })
        ));
    }
}
