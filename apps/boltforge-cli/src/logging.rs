use std::fs::{create_dir_all, File, OpenOptions};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once. `RUST_LOG` wins over `level`.
///
/// Logs go to `log_file` when it can be opened, otherwise to stderr so that
/// stdout stays reserved for JSON output.
pub fn init_tracing(level: &str, log_file: Option<&str>) {
    TRACING_INIT.get_or_init(|| {
        let log_file_path = std::env::var("BOLTFORGE_LOG_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| log_file.map(str::to_string));
        let file_writer = log_file_path.as_deref().and_then(open_log_file);
        let fallback_level = normalize_level(level);

        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback_level))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let destination = match (&file_writer, log_file_path.as_deref()) {
            (Some(_), Some(path)) => path.to_string(),
            _ => "(stderr)".to_string(),
        };
        match file_writer {
            Some(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init();
            }
            None => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .try_init();
            }
        }

        tracing::debug!(
            log_level = fallback_level,
            log_file = %destination,
            "tracing initialized"
        );
    });
}

fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn open_log_file(path: &str) -> Option<File> {
    let file_path = Path::new(path);
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = create_dir_all(parent) {
                eprintln!(
                    "failed to create log directory '{}': {}",
                    parent.display(),
                    err
                );
                return None;
            }
        }
    }
    match OpenOptions::new().create(true).append(true).open(file_path) {
        Ok(file) => Some(file),
        Err(err) => {
            eprintln!("failed to open log file '{}': {}", file_path.display(), err);
            None
        }
    }
}
