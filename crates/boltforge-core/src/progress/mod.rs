//! Progress tracking
//!
//! `ProgressTracker` owns the ordered step list for one execution and
//! enforces the forward-only step state machine. Observers subscribe through
//! [`ProgressReporter`].

mod reporter;

pub use reporter::{
    ChannelProgressReporter, CollectingProgressReporter, ProgressEvent, ProgressPhase,
    ProgressReporter,
};

use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::types::{Step, StepId, StepStatus};

/// Progress tracker errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressError {
    #[error("step '{0}' already exists")]
    DuplicateStep(StepId),
}

/// Step counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub pending: usize,
    pub running: usize,
    pub complete: usize,
    pub failed: usize,
}

impl ProgressSummary {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.complete + self.failed
    }
}

/// Ordered collection of steps with a per-step state machine.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    steps: IndexMap<StepId, Step>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new pending step. Ids must be unique within the tracker.
    pub fn add_step(
        &mut self,
        id: impl Into<StepId>,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Result<&Step, ProgressError> {
        let id = id.into();
        if self.steps.contains_key(&id) {
            return Err(ProgressError::DuplicateStep(id));
        }
        let step = Step::pending(id.clone(), title).with_description(description);
        let (index, _) = self.steps.insert_full(id, step);
        Ok(&self.steps[index])
    }

    /// `Pending -> Running`. Returns whether the transition applied.
    pub fn start_step(&mut self, id: &str) -> bool {
        self.transition(id, StepStatus::Running, None)
    }

    /// `Running -> Complete`. Returns whether the transition applied.
    pub fn complete_step(&mut self, id: &str) -> bool {
        self.transition(id, StepStatus::Complete, None)
    }

    /// `Running | Pending -> Failed`, recording `error`.
    pub fn fail_step(&mut self, id: &str, error: impl Into<String>) -> bool {
        self.transition(id, StepStatus::Failed, Some(error.into()))
    }

    fn transition(&mut self, id: &str, next: StepStatus, error: Option<String>) -> bool {
        let Some(step) = self.steps.get_mut(id) else {
            tracing::warn!(step_id = %id, to = %next, "ignoring transition for unknown step");
            return false;
        };
        if !step.status.can_transition_to(next) {
            tracing::warn!(
                step_id = %id,
                from = %step.status,
                to = %next,
                "ignoring illegal step transition"
            );
            return false;
        }

        let now = Utc::now();
        match next {
            StepStatus::Running => step.started_at = Some(now),
            StepStatus::Complete | StepStatus::Failed => step.finished_at = Some(now),
            StepStatus::Pending => {}
        }
        step.status = next;
        step.error = error;
        true
    }

    /// Snapshot of every step in insertion order.
    pub fn steps(&self) -> Vec<Step> {
        self.steps.values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&Step> {
        self.steps.get(id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn summary(&self) -> ProgressSummary {
        self.steps
            .values()
            .fold(ProgressSummary::default(), |mut acc, step| {
                match step.status {
                    StepStatus::Pending => acc.pending += 1,
                    StepStatus::Running => acc.running += 1,
                    StepStatus::Complete => acc.complete += 1,
                    StepStatus::Failed => acc.failed += 1,
                }
                acc
            })
    }

    /// True when no step is pending or running.
    pub fn all_terminal(&self) -> bool {
        self.steps.values().all(|step| step.status.is_terminal())
    }
}
