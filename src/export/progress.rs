use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use parking_lot::Mutex;
use std::sync::Arc;

use super::sink::ResultLocation;

/// Lifecycle of an export run. Runs only move forward; `reset` returns to
/// `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ExportPhase {
    #[default]
    Idle,
    Preparing,
    Exporting,
    Completed,
    Failed,
}

impl ExportPhase {
    pub fn is_running(self) -> bool {
        matches!(self, ExportPhase::Preparing | ExportPhase::Exporting)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, ExportPhase::Completed | ExportPhase::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportProgress {
    pub phase: ExportPhase,
    /// 0 to 100
    pub percent: u8,
    pub result: Option<ResultLocation>,
    pub error: Option<String>,
}

/// Identifies one run on a [`ProgressBroadcast`]. Updates carrying a run
/// other than the latest one are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportRun(u64);

struct BroadcastState {
    latest: ExportProgress,
    run: u64,
    subscribers: Vec<UnboundedSender<ExportProgress>>,
}

/// Hot broadcast of export progress that replays the latest value to every
/// new subscriber
#[derive(Clone)]
pub struct ProgressBroadcast {
    state: Arc<Mutex<BroadcastState>>,
}

impl std::fmt::Debug for ProgressBroadcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ProgressBroadcast")
            .field("latest", &state.latest)
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl Default for ProgressBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBroadcast {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BroadcastState {
                latest: ExportProgress::default(),
                run: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    pub fn current(&self) -> ExportProgress {
        self.state.lock().latest.clone()
    }

    /// Stream of updates, starting with the current value
    pub fn subscribe(&self) -> UnboundedReceiver<ExportProgress> {
        let (tx, rx) = unbounded();
        let mut state = self.state.lock();
        if tx.unbounded_send(state.latest.clone()).is_ok() {
            state.subscribers.push(tx);
        }
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    fn publish(&self, run: Option<ExportRun>, update: impl FnOnce(&mut ExportProgress) -> bool) {
        let mut state = self.state.lock();
        if run.is_some_and(|ExportRun(id)| id != state.run) {
            return;
        }
        if !update(&mut state.latest) {
            return;
        }
        let latest = state.latest.clone();
        state
            .subscribers
            .retain(|tx| tx.unbounded_send(latest.clone()).is_ok());
    }

    /// Start a new run. Updates from any earlier run are ignored from now on.
    pub fn begin(&self) -> ExportRun {
        let run = {
            let mut state = self.state.lock();
            state.run += 1;
            ExportRun(state.run)
        };
        self.publish(Some(run), |p| {
            *p = ExportProgress {
                phase: ExportPhase::Preparing,
                ..ExportProgress::default()
            };
            true
        });
        run
    }

    /// Report frame progress. Values never go backwards within a run.
    pub fn exporting(&self, run: ExportRun, percent: u8) {
        self.publish(Some(run), |p| {
            if !p.phase.is_running() {
                return false;
            }
            let percent = percent.min(100).max(p.percent);
            let changed = p.phase != ExportPhase::Exporting || p.percent != percent;
            p.phase = ExportPhase::Exporting;
            p.percent = percent;
            changed
        });
    }

    pub fn complete(&self, run: ExportRun, location: ResultLocation) {
        self.publish(Some(run), |p| {
            if !p.phase.is_running() {
                return false;
            }
            p.phase = ExportPhase::Completed;
            p.percent = 100;
            p.result = Some(location);
            true
        });
    }

    pub fn fail(&self, run: ExportRun, error: impl ToString) {
        self.publish(Some(run), |p| {
            if !p.phase.is_running() {
                return false;
            }
            p.phase = ExportPhase::Failed;
            p.error = Some(error.to_string());
            true
        });
    }

    /// Back to idle; runs still in flight can no longer publish
    pub fn reset(&self) {
        self.state.lock().run += 1;
        self.publish(None, |p| {
            *p = ExportProgress::default();
            true
        });
    }
}
