//! Realtime progress reporting

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

use crate::types::StepId;

/// Lifecycle phase carried by a [`ProgressEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    StepAdded,
    StepStarted,
    StepCompleted,
    StepFailed,
    BatchCompleted,
}

impl ProgressPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StepAdded => "step_added",
            Self::StepStarted => "step_started",
            Self::StepCompleted => "step_completed",
            Self::StepFailed => "step_failed",
            Self::BatchCompleted => "batch_completed",
        }
    }
}

/// Realtime progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub step_id: Option<StepId>,
    pub phase: ProgressPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Human-readable detail: command output, error text, batch summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn step(step_id: StepId, phase: ProgressPhase, title: impl Into<String>) -> Self {
        Self {
            step_id: Some(step_id),
            phase,
            title: Some(title.into()),
            message: None,
        }
    }

    pub fn batch_completed() -> Self {
        Self {
            step_id: None,
            phase: ProgressPhase::BatchCompleted,
            title: None,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Sink interface for progress reporting.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, event: ProgressEvent) -> Result<(), String>;
}

/// Forwards events into an unbounded tokio channel.
pub struct ChannelProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressReporter {
    /// Create a reporter and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ProgressReporter for ChannelProgressReporter {
    async fn report(&self, event: ProgressEvent) -> Result<(), String> {
        self.tx
            .send(event)
            .map_err(|_| "progress receiver dropped".to_string())
    }
}

/// Keeps every event in memory.
#[derive(Default, Clone)]
pub struct CollectingProgressReporter {
    events: Arc<RwLock<Vec<ProgressEvent>>>,
}

impl CollectingProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl ProgressReporter for CollectingProgressReporter {
    async fn report(&self, event: ProgressEvent) -> Result<(), String> {
        self.events.write().await.push(event);
        Ok(())
    }
}
