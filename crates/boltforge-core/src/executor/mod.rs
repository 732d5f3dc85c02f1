//! Executor module
//!
//! The action executor applies a parsed action list to a workspace:
//! - strictly sequential, in input order
//! - one step per action, driven through the progress tracker
//! - capability failures become failed steps and never abort the call

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::{FileManager, Workspace};
use crate::progress::{
    ProgressError, ProgressEvent, ProgressPhase, ProgressReporter, ProgressTracker,
};
use crate::types::{Action, Artifact, StepId, StepStatus};

const MAX_TITLE_CHARS: usize = 80;
const MAX_LOG_OUTPUT_CHARS: usize = 2_000;

/// What to do with the rest of a batch after a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep executing the remaining actions.
    #[default]
    Continue,
    /// Mark every remaining action as a failed, skipped step.
    Abort,
}

/// Whole-batch errors. Capability failures are recorded on steps instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("failed to register step: {0}")]
    StepRegistration(#[from] ProgressError),
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push('…');
    preview
}

/// Human-readable step title for an action.
pub fn step_title(action: &Action) -> String {
    match action {
        Action::File { file_path, .. } if file_path.is_empty() => "Create <unnamed file>".to_string(),
        Action::File { file_path, .. } => format!("Create {}", file_path),
        Action::Shell { content } => {
            let first_line = content
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or_default();
            format!("Run {}", truncate_chars(first_line, MAX_TITLE_CHARS))
        }
    }
}

/// Sequential action executor owning its tracker and workspace.
pub struct ActionExecutor<W: Workspace = FileManager> {
    tracker: ProgressTracker,
    workspace: W,
    failure_policy: FailurePolicy,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    next_step: usize,
    aborted_by: Option<StepId>,
}

impl ActionExecutor<FileManager> {
    /// Create an executor over a fresh in-memory file manager
    pub fn new() -> Self {
        Self::with_workspace(FileManager::new())
    }

    pub fn file_manager(&self) -> &FileManager {
        &self.workspace
    }
}

impl Default for ActionExecutor<FileManager> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Workspace> ActionExecutor<W> {
    /// Create an executor over the given workspace
    pub fn with_workspace(workspace: W) -> Self {
        Self {
            tracker: ProgressTracker::new(),
            workspace,
            failure_policy: FailurePolicy::default(),
            progress_reporter: None,
            next_step: 0,
            aborted_by: None,
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Attach a realtime progress reporter.
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    pub fn progress_tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn workspace(&self) -> &W {
        &self.workspace
    }

    pub fn into_parts(self) -> (ProgressTracker, W) {
        (self.tracker, self.workspace)
    }

    /// Execute `actions` in order, one step each.
    pub async fn execute_actions(&mut self, actions: &[Action]) -> Result<(), ExecutorError> {
        for action in actions {
            self.execute_action(action, None).await?;
        }
        self.finish_batch().await;
        Ok(())
    }

    /// Execute every artifact's actions in order. Steps carry the artifact
    /// title as their description.
    pub async fn execute_artifacts(&mut self, artifacts: &[Artifact]) -> Result<(), ExecutorError> {
        for artifact in artifacts {
            tracing::info!(
                artifact_id = %artifact.id,
                actions = artifact.actions.len(),
                "executing artifact"
            );
            for action in &artifact.actions {
                self.execute_action(action, Some(&artifact.title)).await?;
            }
        }
        self.finish_batch().await;
        Ok(())
    }

    /// Register, run and settle a single action. Returns the step's final status.
    pub async fn execute_action(
        &mut self,
        action: &Action,
        description: Option<&str>,
    ) -> Result<StepStatus, ExecutorError> {
        self.next_step += 1;
        let step_id = StepId::new(format!("step-{}", self.next_step));
        let title = step_title(action);

        self.tracker.add_step(
            step_id.clone(),
            title.clone(),
            description.map(str::to_string),
        )?;
        self.report(ProgressEvent::step(step_id.clone(), ProgressPhase::StepAdded, &title))
            .await;

        if let Some(failed) = &self.aborted_by {
            let reason = format!("skipped: batch aborted after {} failed", failed);
            self.tracker.fail_step(step_id.as_str(), reason.clone());
            self.report(
                ProgressEvent::step(step_id, ProgressPhase::StepFailed, &title).with_message(reason),
            )
            .await;
            return Ok(StepStatus::Failed);
        }

        self.tracker.start_step(step_id.as_str());
        tracing::info!(
            step_id = %step_id,
            action = %action.kind(),
            title = %title,
            "step execution started"
        );
        self.report(ProgressEvent::step(step_id.clone(), ProgressPhase::StepStarted, &title))
            .await;

        let result = match action {
            Action::File { file_path, content } => self
                .workspace
                .create_file(file_path, content)
                .await
                .map(|_| None),
            Action::Shell { content } => self
                .workspace
                .execute_shell_command(content)
                .await
                .map(|output| Some(output.output)),
        };

        match result {
            Ok(output) => {
                self.tracker.complete_step(step_id.as_str());
                tracing::info!(step_id = %step_id, "step execution completed");
                let mut event = ProgressEvent::step(step_id, ProgressPhase::StepCompleted, &title);
                if let Some(output) = output {
                    event = event.with_message(truncate_chars(&output, MAX_LOG_OUTPUT_CHARS));
                }
                self.report(event).await;
                Ok(StepStatus::Complete)
            }
            Err(err) => {
                let message = err.to_string();
                self.tracker.fail_step(step_id.as_str(), message.clone());
                tracing::warn!(step_id = %step_id, error = %message, "step execution failed");
                if self.failure_policy == FailurePolicy::Abort {
                    self.aborted_by = Some(step_id.clone());
                }
                self.report(
                    ProgressEvent::step(step_id, ProgressPhase::StepFailed, &title)
                        .with_message(message),
                )
                .await;
                Ok(StepStatus::Failed)
            }
        }
    }

    /// Emit the batch summary event.
    pub async fn finish_batch(&mut self) {
        let summary = self.tracker.summary();
        tracing::info!(
            steps = summary.total(),
            complete = summary.complete,
            failed = summary.failed,
            "action batch completed"
        );
        self.report(ProgressEvent::batch_completed().with_message(format!(
            "{} complete, {} failed",
            summary.complete, summary.failed
        )))
        .await;
    }

    async fn report(&self, event: ProgressEvent) {
        if let Some(reporter) = &self.progress_reporter {
            if let Err(err) = reporter.report(event).await {
                tracing::warn!("failed to report progress: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::files::{CommandOutput, FileError, FileSnapshot};
    use crate::parser::parse_actions;
    use crate::progress::CollectingProgressReporter;

    /// Fails every command containing "fail" and every file under `locked/`.
    #[derive(Default)]
    struct FlakyWorkspace {
        inner: FileManager,
    }

    #[async_trait]
    impl Workspace for FlakyWorkspace {
        async fn create_file(&mut self, path: &str, content: &str) -> Result<(), FileError> {
            if path.starts_with("locked/") {
                return Err(FileError::Internal(format!("{} is read-only", path)));
            }
            self.inner.create_file(path, content).await
        }

        async fn execute_shell_command(
            &mut self,
            command: &str,
        ) -> Result<CommandOutput, FileError> {
            if command.contains("fail") {
                return Err(FileError::CommandFailed {
                    exit_code: 1,
                    output: "exploded".to_string(),
                });
            }
            self.inner.execute_shell_command(command).await
        }

        fn files(&self) -> FileSnapshot {
            self.inner.get_files()
        }
    }

    struct BrokenReporter;

    #[async_trait]
    impl ProgressReporter for BrokenReporter {
        async fn report(&self, _event: ProgressEvent) -> Result<(), String> {
            Err("sink closed".to_string())
        }
    }

    #[tokio::test]
    async fn test_file_and_shell_actions_complete() {
        let actions = parse_actions(
            r#"<action type="file" filePath="index.js">console.log("Hello World");</action>
<action type="shell">node index.js</action>"#,
        );
        assert_eq!(actions.len(), 2);

        let mut executor = ActionExecutor::new();
        executor.execute_actions(&actions).await.expect("execute");

        let steps = executor.progress_tracker().steps();
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| s.status == StepStatus::Complete));
        assert_eq!(steps[0].title, "Create index.js");
        assert_eq!(steps[1].title, "Run node index.js");

        let files = executor.file_manager().get_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files.get("index.js"), Some("console.log(\"Hello World\");"));
        assert_eq!(executor.file_manager().commands(), vec!["node index.js"]);
    }

    #[tokio::test]
    async fn test_later_write_to_same_path_wins() {
        let actions = vec![
            Action::file("app.js", "v1"),
            Action::file("app.js", "v2"),
        ];
        let mut executor = ActionExecutor::new();
        executor.execute_actions(&actions).await.expect("execute");

        let files = executor.file_manager().get_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files.get("app.js"), Some("v2"));
        assert_eq!(executor.progress_tracker().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_step_does_not_abort_batch() {
        let actions = vec![
            Action::file("a.txt", "a"),
            Action::file("", "no path"),
            Action::shell(""),
            Action::file("b.txt", "b"),
        ];
        let mut executor = ActionExecutor::new();
        executor.execute_actions(&actions).await.expect("execute");

        let steps = executor.progress_tracker().steps();
        let statuses: Vec<StepStatus> = steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![
                StepStatus::Complete,
                StepStatus::Failed,
                StepStatus::Failed,
                StepStatus::Complete
            ]
        );
        assert!(steps[1]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("path is empty")));
        assert_eq!(steps[2].error.as_deref(), Some("command is empty"));
        assert!(steps[0].error.is_none() && steps[3].error.is_none());
        assert_eq!(executor.file_manager().get_files().len(), 2);
    }

    #[tokio::test]
    async fn test_every_action_gets_exactly_one_terminal_step() {
        let actions = vec![
            Action::shell("npm install"),
            Action::shell("npm run fail"),
            Action::file("locked/x", "x"),
            Action::file("ok.txt", "ok"),
            Action::shell("npm test"),
        ];
        let mut executor =
            ActionExecutor::with_workspace(FlakyWorkspace::default());
        executor.execute_actions(&actions).await.expect("execute");

        let tracker = executor.progress_tracker();
        assert_eq!(tracker.len(), actions.len());
        assert!(tracker.all_terminal());
        let summary = tracker.summary();
        assert_eq!((summary.complete, summary.failed), (3, 2));
        assert_eq!(
            tracker.get("step-2").and_then(|s| s.error.as_deref()),
            Some("command failed with exit code 1: exploded")
        );
        assert_eq!(executor.workspace().files().len(), 1);
    }

    #[tokio::test]
    async fn test_abort_policy_skips_remaining_actions() {
        let actions = vec![
            Action::shell("echo one"),
            Action::shell("please fail"),
            Action::file("never.txt", "x"),
            Action::shell("echo never"),
        ];
        let mut executor = ActionExecutor::with_workspace(FlakyWorkspace::default())
            .with_failure_policy(FailurePolicy::Abort);
        executor.execute_actions(&actions).await.expect("execute");

        let steps = executor.progress_tracker().steps();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].status, StepStatus::Complete);
        assert_eq!(steps[1].status, StepStatus::Failed);
        for skipped in &steps[2..] {
            assert_eq!(skipped.status, StepStatus::Failed);
            assert_eq!(
                skipped.error.as_deref(),
                Some("skipped: batch aborted after step-2 failed")
            );
            assert!(skipped.started_at.is_none());
        }
        assert!(executor.workspace().files().is_empty());
    }

    #[tokio::test]
    async fn test_reporter_sees_lifecycle_in_order() {
        let reporter = CollectingProgressReporter::new();
        let mut executor = ActionExecutor::with_workspace(FlakyWorkspace::default())
            .with_progress_reporter(Arc::new(reporter.clone()));
        executor
            .execute_actions(&[Action::shell("ls"), Action::shell("fail now")])
            .await
            .expect("execute");

        let events = reporter.events().await;
        let phases: Vec<(Option<String>, &str)> = events
            .iter()
            .map(|e| (e.step_id.as_ref().map(|id| id.to_string()), e.phase.as_str()))
            .collect();
        assert_eq!(
            phases,
            vec![
                (Some("step-1".to_string()), "step_added"),
                (Some("step-1".to_string()), "step_started"),
                (Some("step-1".to_string()), "step_completed"),
                (Some("step-2".to_string()), "step_added"),
                (Some("step-2".to_string()), "step_started"),
                (Some("step-2".to_string()), "step_failed"),
                (None, "batch_completed"),
            ]
        );
        assert!(events[2].message.as_deref().is_some_and(|m| m.contains("ls")));
        assert_eq!(events[6].message.as_deref(), Some("1 complete, 1 failed"));
    }

    #[tokio::test]
    async fn test_failing_reporter_does_not_affect_execution() {
        let mut executor = ActionExecutor::new().with_progress_reporter(Arc::new(BrokenReporter));
        executor
            .execute_actions(&[Action::file("a.txt", "a")])
            .await
            .expect("execute");
        assert_eq!(
            executor.progress_tracker().steps()[0].status,
            StepStatus::Complete
        );
    }

    #[tokio::test]
    async fn test_artifacts_share_one_step_sequence() {
        let artifacts = vec![
            Artifact::new("a", "Scaffold").with_actions(vec![Action::file("a.txt", "a")]),
            Artifact::new("a", "Scaffold again").with_actions(vec![
                Action::file("b.txt", "b"),
                Action::shell("npm start"),
            ]),
        ];
        let mut executor = ActionExecutor::new();
        executor.execute_artifacts(&artifacts).await.expect("execute");

        let steps = executor.progress_tracker().steps();
        let ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["step-1", "step-2", "step-3"]);
        assert_eq!(steps[0].description.as_deref(), Some("Scaffold"));
        assert_eq!(steps[2].description.as_deref(), Some("Scaffold again"));
    }

    #[test]
    fn test_step_titles() {
        assert_eq!(step_title(&Action::file("src/a.rs", "")), "Create src/a.rs");
        assert_eq!(step_title(&Action::file("", "")), "Create <unnamed file>");
        assert_eq!(
            step_title(&Action::shell("\n  cd app\nnpm install\n")),
            "Run cd app"
        );
        let long = "x".repeat(200);
        let title = step_title(&Action::shell(long));
        assert_eq!(title.chars().count(), "Run ".len() + MAX_TITLE_CHARS + 1);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn test_empty_action_list_still_finishes() {
        tokio_test::block_on(async {
            let mut executor = ActionExecutor::new();
            executor.execute_actions(&[]).await.expect("execute");
            assert!(executor.progress_tracker().is_empty());
            assert!(executor.file_manager().get_files().is_empty());
        });
    }
}
