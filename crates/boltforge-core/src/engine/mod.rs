//! Engine facade
//!
//! Composition root for one invocation: parse the model output, run the
//! actions against a fresh executor and workspace, and hand back a
//! transport-ready report. Nothing survives between calls.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::executor::{ActionExecutor, ExecutorError, FailurePolicy};
use crate::files::{FileEntry, FileManager};
use crate::parser::{parse_actions, parse_artifacts, ParseEvent, StreamingParser};
use crate::progress::ProgressReporter;
use crate::types::{Step, StepStatus};

/// Which grammar the input is expected to follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Every `<action>` in the text, grouped or not.
    #[default]
    Actions,
    /// Only actions inside `<boltArtifact>` blocks.
    Artifacts,
}

/// Per-engine settings, usually built from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub parse_mode: ParseMode,
    pub failure_policy: FailurePolicy,
    pub simulated_latency: Duration,
    /// Report `success: false` when any step failed.
    pub fail_on_step_error: bool,
}

/// Final result of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineReport {
    pub success: bool,
    pub steps: Vec<Step>,
    pub files: Vec<FileEntry>,
}

impl EngineReport {
    pub fn failed_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Failed)
    }
}

/// Parses model output and executes it.
#[derive(Clone, Default)]
pub struct Engine {
    options: EngineOptions,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            progress_reporter: None,
        }
    }

    /// Attach a reporter handed to every executor this engine creates.
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn executor(&self) -> ActionExecutor<FileManager> {
        let workspace = FileManager::new().with_simulated_latency(self.options.simulated_latency);
        let executor = ActionExecutor::with_workspace(workspace)
            .with_failure_policy(self.options.failure_policy);
        match &self.progress_reporter {
            Some(reporter) => executor.with_progress_reporter(reporter.clone()),
            None => executor,
        }
    }

    /// Parse complete text and execute it.
    pub async fn run(&self, text: &str) -> EngineReport {
        let span = tracing::info_span!("engine_run", run_id = %Uuid::new_v4(), mode = ?self.options.parse_mode);
        async move {
            let mut executor = self.executor();
            let result = match self.options.parse_mode {
                ParseMode::Actions => {
                    let actions = parse_actions(text);
                    tracing::info!(actions = actions.len(), "parsed model output");
                    executor.execute_actions(&actions).await
                }
                ParseMode::Artifacts => {
                    let artifacts = parse_artifacts(text);
                    tracing::info!(artifacts = artifacts.len(), "parsed model output");
                    executor.execute_artifacts(&artifacts).await
                }
            };
            self.build_report(executor, result)
        }
        .instrument(span)
        .await
    }

    /// Execute actions as soon as their markup closes in a chunked stream.
    ///
    /// Unlike [`Engine::run`] in artifact mode, actions run when they close,
    /// before their artifact's close marker has arrived.
    pub async fn run_stream(&self, mut chunks: mpsc::Receiver<String>) -> EngineReport {
        let span = tracing::info_span!("engine_stream", run_id = %Uuid::new_v4(), mode = ?self.options.parse_mode);
        async move {
            let mut executor = self.executor();
            let mut parser = StreamingParser::new();
            let mut artifact_title: Option<String> = None;
            let mut result = Ok(());

            'chunks: while let Some(chunk) = chunks.recv().await {
                for event in parser.push(&chunk) {
                    let step = match (event, self.options.parse_mode) {
                        (ParseEvent::ArtifactOpened { title, .. }, _) => {
                            artifact_title = Some(title);
                            continue;
                        }
                        (ParseEvent::ArtifactClosed { .. }, _) => {
                            artifact_title = None;
                            continue;
                        }
                        (ParseEvent::ActionClosed { artifact_id: None, .. }, ParseMode::Artifacts) => {
                            continue;
                        }
                        (ParseEvent::ActionClosed { action, .. }, ParseMode::Actions) => {
                            executor.execute_action(&action, None).await
                        }
                        (ParseEvent::ActionClosed { action, .. }, ParseMode::Artifacts) => {
                            executor.execute_action(&action, artifact_title.as_deref()).await
                        }
                    };
                    if let Err(err) = step {
                        result = Err(err);
                        break 'chunks;
                    }
                }
            }

            for pending in parser.finish() {
                tracing::warn!(?pending, "stream ended with unterminated markup");
            }
            if result.is_ok() {
                executor.finish_batch().await;
            }
            self.build_report(executor, result)
        }
        .instrument(span)
        .await
    }

    fn build_report(
        &self,
        executor: ActionExecutor<FileManager>,
        result: Result<(), ExecutorError>,
    ) -> EngineReport {
        let (tracker, files) = executor.into_parts();
        let steps = tracker.steps();
        let any_failed = steps.iter().any(|step| step.status == StepStatus::Failed);
        let success = match &result {
            Ok(()) => !(self.options.fail_on_step_error && any_failed),
            Err(err) => {
                tracing::error!(error = %err, "action batch aborted");
                false
            }
        };
        EngineReport {
            success,
            steps,
            files: files.get_files().into_entries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::progress::CollectingProgressReporter;

    const ARTIFACT_TEXT: &str = r#"Here you go.
<action type="shell">echo stray</action>
<boltArtifact id="hello" title="Hello World">
  <action type="file" filePath="index.js">console.log("Hello World");</action>
  <action type="shell">node index.js</action>
</boltArtifact>"#;

    #[tokio::test]
    async fn test_run_reports_transport_shape() {
        let engine = Engine::default();
        let report = engine
            .run(r#"<action type="file" filePath="index.js">console.log("Hello World");</action>"#)
            .await;

        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["success"], json!(true));
        assert_eq!(
            value["files"],
            json!([{"path": "index.js", "content": "console.log(\"Hello World\");"}])
        );
        assert_eq!(value["steps"][0]["id"], json!("step-1"));
        assert_eq!(value["steps"][0]["status"], json!("complete"));
    }

    #[tokio::test]
    async fn test_actions_mode_includes_actions_outside_artifacts() {
        let report = Engine::default().run(ARTIFACT_TEXT).await;
        assert_eq!(report.steps.len(), 3);
        assert_eq!(report.steps[0].title, "Run echo stray");
    }

    #[tokio::test]
    async fn test_artifacts_mode_only_runs_grouped_actions() {
        let engine = Engine::new(EngineOptions {
            parse_mode: ParseMode::Artifacts,
            ..EngineOptions::default()
        });
        let report = engine.run(ARTIFACT_TEXT).await;
        assert!(report.success);
        assert_eq!(report.steps.len(), 2);
        assert!(report
            .steps
            .iter()
            .all(|s| s.description.as_deref() == Some("Hello World")));
        assert_eq!(report.files.len(), 1);
    }

    #[tokio::test]
    async fn test_step_failure_downgrades_success_only_when_configured() {
        let text = r#"<action type="file">no path</action><action type="shell">ls</action>"#;

        let lenient = Engine::default().run(text).await;
        assert!(lenient.success);
        assert_eq!(lenient.failed_steps().count(), 1);

        let strict = Engine::new(EngineOptions {
            fail_on_step_error: true,
            ..EngineOptions::default()
        })
        .run(text)
        .await;
        assert!(!strict.success);
        assert_eq!(strict.steps.len(), 2);
        assert_eq!(strict.steps[1].status, StepStatus::Complete);
    }

    #[tokio::test]
    async fn test_runs_do_not_share_state() {
        let engine = Engine::default();
        let first = engine.run(r#"<action type="file" filePath="a">1</action>"#).await;
        let second = engine.run(r#"<action type="file" filePath="b">2</action>"#).await;
        assert_eq!(first.files.len(), 1);
        assert_eq!(second.files.len(), 1);
        assert_eq!(second.files[0].path, "b");
        assert_eq!(second.steps[0].id.as_str(), "step-1");
    }

    #[tokio::test]
    async fn test_run_stream_matches_one_shot_run() {
        let reporter = CollectingProgressReporter::new();
        let engine = Engine::new(EngineOptions {
            parse_mode: ParseMode::Artifacts,
            ..EngineOptions::default()
        })
        .with_progress_reporter(Arc::new(reporter.clone()));

        let (tx, rx) = mpsc::channel(8);
        let producer = tokio::spawn(async move {
            let bytes: Vec<char> = ARTIFACT_TEXT.chars().collect();
            for piece in bytes.chunks(5) {
                tx.send(piece.iter().collect::<String>())
                    .await
                    .expect("send chunk");
            }
        });

        let streamed = engine.run_stream(rx).await;
        producer.await.expect("producer");
        let one_shot = engine.run(ARTIFACT_TEXT).await;

        assert_eq!(streamed.files, one_shot.files);
        let titles = |r: &EngineReport| r.steps.iter().map(|s| s.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&streamed), titles(&one_shot));
        assert!(streamed
            .steps
            .iter()
            .all(|s| s.description.as_deref() == Some("Hello World")));

        let events = reporter.events().await;
        assert!(events
            .iter()
            .any(|e| e.phase == crate::progress::ProgressPhase::BatchCompleted));
    }

    #[tokio::test]
    async fn test_run_stream_drops_unterminated_tail() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(r#"<action type="shell">ls</action><action type="shell">never"#.to_string())
            .await
            .expect("send");
        drop(tx);

        let report = Engine::default().run_stream(rx).await;
        assert!(report.success);
        assert_eq!(report.steps.len(), 1);
    }
}
