use boltforge_core::progress::{ProgressEvent, ProgressPhase};
use tokio::sync::mpsc;

/// Print progress lines to stderr until the reporter side is dropped.
pub async fn print_progress(mut events: mpsc::UnboundedReceiver<ProgressEvent>) {
    while let Some(event) = events.recv().await {
        eprintln!("{}", format_event(&event));
    }
}

fn format_event(event: &ProgressEvent) -> String {
    let marker = match event.phase {
        ProgressPhase::StepAdded => "  ",
        ProgressPhase::StepStarted => "->",
        ProgressPhase::StepCompleted => "ok",
        ProgressPhase::StepFailed => "!!",
        ProgressPhase::BatchCompleted => "==",
    };
    let mut line = match &event.step_id {
        Some(id) => format!("[{}] {} {}", marker, id, event.phase.as_str()),
        None => format!("[{}] {}", marker, event.phase.as_str()),
    };
    if let Some(title) = &event.title {
        line.push_str(": ");
        line.push_str(title);
    }
    if let Some(message) = &event.message {
        // Command output can span lines; keep the first one on the progress line.
        let first = message.lines().next().unwrap_or_default();
        line.push_str(" (");
        line.push_str(first);
        line.push(')');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use boltforge_core::StepId;

    #[test]
    fn test_format_step_event() {
        let event = ProgressEvent::step(
            StepId::from("step-2"),
            ProgressPhase::StepFailed,
            "Create <unnamed file>",
        )
        .with_message("invalid path '': path is empty");
        assert_eq!(
            format_event(&event),
            "[!!] step-2 step_failed: Create <unnamed file> (invalid path '': path is empty)"
        );
    }

    #[test]
    fn test_format_batch_event_keeps_first_message_line() {
        let event = ProgressEvent::batch_completed().with_message("2 complete, 0 failed\nextra");
        assert_eq!(
            format_event(&event),
            "[==] batch_completed (2 complete, 0 failed)"
        );
    }

    #[tokio::test]
    async fn test_print_progress_exits_when_sender_drops() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ProgressEvent::batch_completed()).expect("send");
        drop(tx);
        print_progress(rx).await;
    }
}
