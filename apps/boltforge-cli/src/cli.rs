use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use boltforge_config::{load_config, BoltforgeConfig};
use boltforge_core::progress::ChannelProgressReporter;
use boltforge_core::{parse_actions, parse_artifacts, Engine, ParseMode};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;

use crate::input::{read_input, stream_input, InputSource};

const STREAM_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Parser)]
#[command(name = "boltforge", about = "Parse and apply model action markup")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the actions (or artifacts) found in the input as JSON
    Parse(ParseArgs),
    /// Execute the input against a fresh simulated workspace
    Run(RunArgs),
}

#[derive(Debug, Args, Clone)]
struct ParseArgs {
    /// Group actions by their enclosing <boltArtifact>
    #[arg(long)]
    artifacts: bool,
    /// Input file; omitted or '-' reads stdin
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
struct RunArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    /// Only execute actions inside <boltArtifact> blocks
    #[arg(long)]
    artifacts: bool,
    /// Execute actions as soon as they close instead of reading all input first
    #[arg(long)]
    stream: bool,
    #[arg(long)]
    verbose: bool,
    /// Input file; omitted or '-' reads stdin
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        match self.command {
            Command::Parse(args) => {
                crate::logging::init_tracing("warn", None);
                parse(args).await
            }
            Command::Run(args) => run(args).await,
        }
    }
}

async fn parse(args: ParseArgs) -> anyhow::Result<ExitCode> {
    let source = InputSource::from_arg(args.input);
    let text = read_input(&source).await?;
    let json = if args.artifacts {
        serde_json::to_string_pretty(&parse_artifacts(&text))?
    } else {
        serde_json::to_string_pretty(&parse_actions(&text))?
    };
    println!("{}", json);
    Ok(ExitCode::SUCCESS)
}

async fn run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => BoltforgeConfig::default(),
    };
    let log_level = if args.verbose {
        "debug"
    } else {
        config.observability.log_level.as_str()
    };
    crate::logging::init_tracing(log_level, config.observability.log_file.as_deref());

    let mut options = config.to_engine_options();
    if args.artifacts {
        options.parse_mode = ParseMode::Artifacts;
    }

    let (reporter, events) = ChannelProgressReporter::channel();
    let printer = tokio::spawn(crate::progress::print_progress(events));
    let engine = Engine::new(options).with_progress_reporter(Arc::new(reporter));
    tracing::info!(
        mode = ?engine.options().parse_mode,
        failure_policy = ?engine.options().failure_policy,
        stream = args.stream,
        "starting run"
    );
    let source = InputSource::from_arg(args.input);

    let report = if args.stream {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let reader = tokio::spawn(async move { stream_input(&source, tx).await });
        let report = engine.run_stream(rx).await;
        reader.await.context("input reader task panicked")??;
        report
    } else {
        let text = read_input(&source).await?;
        engine.run(&text).await
    };

    // Closes the progress channel so the printer drains and exits.
    drop(engine);
    printer.await.context("progress printer task panicked")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
