mod cli_style;

use anyhow::{Context, Result};
use clap::Parser;
use cli_style::{
    close_section, colors, get_styles, notify, open_section, print_banner, print_field,
    print_file_heading, print_nothing, print_path_item, prompt, status_color, Table, Tone,
};
use hifi_remedy::config::{AppConfig, CliConfig, FileConfig, CLIENT_TOKEN_ENV};
use hifi_remedy::library_scan::collect_audio_paths;
use hifi_remedy::remediation::{
    BatchReport, FfprobeProbe, FsFileOperations, HttpReplacementGateway, ItemOutcome,
    RemediationError, RemediationOrchestrator, SourcePreference, WorkStatus,
};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    Ok(std::env::current_dir()?.join(original_path))
}

#[derive(Parser, Debug)]
#[command(
    styles=get_styles(),
    version = concat!(env!("APP_VERSION"), "-", env!("GIT_HASH")),
    about = "Replace low-quality audio files with verified higher-quality downloads"
)]
struct CliArgs {
    /// Audio files or directories to remediate.
    #[clap(required = true, value_parser = parse_path)]
    pub paths: Vec<PathBuf>,

    /// Path to TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Base URL of the download gateway.
    #[clap(long)]
    pub gateway_url: Option<String>,

    /// Token sent to the gateway as X-Client-Token.
    #[clap(long, env = CLIENT_TOKEN_ENV, hide_env_values = true)]
    pub client_token: Option<String>,

    /// Where replacements may come from.
    #[clap(long, value_enum)]
    pub source: Option<SourcePreference>,

    /// Keep replaced originals in a backup directory next to them.
    #[clap(long)]
    pub backup: bool,

    /// Timeout for a single gateway request, in seconds.
    #[clap(long, default_value_t = 300)]
    pub timeout_sec: u64,

    /// ffprobe binary used to read durations and tags.
    #[clap(long)]
    pub ffprobe_path: Option<PathBuf>,

    /// Process the batch and print the results without prompting.
    #[clap(long)]
    pub non_interactive: bool,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            gateway_url: self.gateway_url.clone(),
            client_token: self.client_token.clone(),
            gateway_timeout_sec: self.timeout_sec,
            ffprobe_path: self.ffprobe_path.clone(),
            source: self.source,
            keep_backup: self.backup.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let cli_args = CliArgs::parse();

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    let paths = collect_audio_paths(&cli_args.paths, &config.remediation.backup_dir_name)?;

    print_banner(&[
        ("Gateway", config.gateway_url.clone()),
        ("Source", config.remediation.default_source.as_str().to_string()),
        ("Keep backups", config.remediation.keep_backup.to_string()),
        ("Files", paths.len().to_string()),
    ]);

    if paths.is_empty() {
        notify(Tone::Warning, "No audio files found in the given paths");
        return Ok(());
    }

    let probe = Arc::new(FfprobeProbe::new(config.ffprobe_path.clone()));
    let gateway = HttpReplacementGateway::new(
        config.gateway_url.clone(),
        config.client_token.clone(),
        config.gateway_timeout(),
        probe,
    )
    .context("Failed to build gateway client")?;
    let file_ops = FsFileOperations::new(config.remediation.backup_dir_name.clone());
    let orchestrator = RemediationOrchestrator::new(
        Arc::new(gateway),
        Arc::new(file_ops),
        &config.remediation,
    );

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if !handler_token.is_cancelled() {
            eprintln!("\nStopping after the current file...");
        }
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let batch: Vec<String> = paths
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect();

    let (bar, progress_task) = spawn_progress(&orchestrator, batch.len() as u64)?;
    let result = orchestrator
        .submit_with_cancel(&batch, orchestrator.default_options(), cancel.clone())
        .await;
    progress_task.abort();
    bar.finish_and_clear();
    let report = result?;

    print_summary(&report);

    if cli_args.non_interactive || cancel.is_cancelled() {
        if cancel.is_cancelled() {
            notify(Tone::Info, "Batch interrupted; skipping review");
        }
    } else {
        let mut rl = DefaultEditor::new()?;
        if let Err(e) = interact(&orchestrator, &mut rl).await {
            warn!("Interactive session ended: {}", e);
            notify(Tone::Error, &format!("Interactive session ended: {}", e));
        }
    }

    print_comparisons(&orchestrator);
    print_failures(&orchestrator);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Batch progress
// ═══════════════════════════════════════════════════════════════════════════════

fn spawn_progress(
    orchestrator: &RemediationOrchestrator,
    total: u64,
) -> Result<(ProgressBar, JoinHandle<()>)> {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {wide_msg}")?
            .progress_chars("█▓░"),
    );

    let mut progress_rx = orchestrator.subscribe_progress();
    let task_bar = bar.clone();
    let handle = tokio::spawn(async move {
        loop {
            match progress_rx.recv().await {
                Ok(progress) => {
                    task_bar.set_length(progress.total as u64);
                    task_bar.set_position(progress.current.saturating_sub(1) as u64);
                    task_bar.set_message(file_label(&progress.path));
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
    Ok((bar, handle))
}

fn file_label(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn describe(outcome: &ItemOutcome) -> String {
    match outcome {
        ItemOutcome::Replaced(record) => format!(
            "replaced by {}",
            file_label(&record.replaced_path.to_string_lossy())
        ),
        ItemOutcome::NeedsReview(entry) => {
            format!("duration differs by {:.1}s, needs review", entry.duration_diff_secs())
        }
        ItemOutcome::NoMatch => "no replacement found".to_string(),
        ItemOutcome::QueueFull(message) | ItemOutcome::Failed(message) => message.clone(),
    }
}

fn print_summary(report: &BatchReport) {
    open_section("Summary");

    let mut table = Table::new(&["File", "Status", "Detail"]);
    for (path, outcome) in &report.outcomes {
        let status = outcome.status();
        let name = file_label(path);
        let detail = describe(outcome);
        table.row(&[
            (name.as_str(), colors::TEXT),
            (status.as_str(), status_color(status)),
            (detail.as_str(), colors::MUTED),
        ]);
    }
    for path in &report.rejected {
        let name = file_label(path);
        table.row(&[
            (name.as_str(), colors::TEXT),
            ("REJECTED", colors::WARN),
            ("busy or awaiting review", colors::MUTED),
        ]);
    }
    for path in &report.skipped {
        let name = file_label(path);
        table.row(&[
            (name.as_str(), colors::TEXT),
            ("SKIPPED", colors::MUTED),
            ("batch interrupted", colors::MUTED),
        ]);
    }
    table.print();

    print_field("Replaced or in review", &report.count(WorkStatus::Done).to_string());
    print_field("No match", &report.count(WorkStatus::NoMatch).to_string());
    print_field("Queue full", &report.count(WorkStatus::QueueFull).to_string());
    print_field("Errors", &report.count(WorkStatus::Error).to_string());
    close_section();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Interactive resolution
// ═══════════════════════════════════════════════════════════════════════════════

/// Read one trimmed answer. `None` means the user asked to stop.
fn ask(rl: &mut DefaultEditor, label: &str) -> Result<Option<String>> {
    match rl.readline(&prompt(label)) {
        Ok(line) => {
            let line = line.trim().to_string();
            if !line.is_empty() {
                let _ = rl.add_history_entry(line.as_str());
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn interact(orchestrator: &RemediationOrchestrator, rl: &mut DefaultEditor) -> Result<()> {
    if !walk_review_queue(orchestrator, rl).await? {
        return Ok(());
    }
    if !walk_manual_queue(orchestrator, rl).await? {
        return Ok(());
    }
    // Manual downloads can land new entries in review
    if !orchestrator.snapshot().review_queue().is_empty() {
        walk_review_queue(orchestrator, rl).await?;
    }
    Ok(())
}

/// Returns false when the user quit.
async fn walk_review_queue(
    orchestrator: &RemediationOrchestrator,
    rl: &mut DefaultEditor,
) -> Result<bool> {
    let entries = orchestrator.snapshot().review_queue().to_vec();
    if entries.is_empty() {
        return Ok(true);
    }

    open_section("Review");
    notify(
        Tone::Info,
        &format!(
            "{} candidate(s) differ in duration from the original",
            entries.len()
        ),
    );

    for entry in entries {
        println!();
        print_file_heading(&entry.path());
        print_field(
            "Original",
            &format_duration(entry.candidate.original_duration_secs),
        );
        print_field(
            "Candidate",
            &format_duration(entry.candidate.new_duration_secs),
        );
        print_field(
            "Difference",
            &format!("{:.1}s", entry.duration_diff_secs()),
        );
        if let Some(bitrate) = entry.candidate.new_bitrate {
            print_field("Bitrate", &format!("{} kbps", bitrate));
        }
        print_field(
            "Downloaded to",
            &entry.candidate.new_path.display().to_string(),
        );

        loop {
            let Some(answer) = ask(rl, "[a]ccept / [i]gnore / [s]kip")? else {
                close_section();
                return Ok(false);
            };
            match answer.to_lowercase().as_str() {
                "a" | "accept" => {
                    match orchestrator.accept(entry.id).await {
                        Ok(record) => notify(
                            Tone::Success,
                            &format!("Replaced with {}", record.replaced_path.display()),
                        ),
                        Err(e) => notify(Tone::Error, &e.to_string()),
                    }
                    break;
                }
                "i" | "ignore" => {
                    match orchestrator.ignore(entry.id).await {
                        Ok(()) => notify(
                            Tone::Info,
                            "Candidate discarded, file moved to manual queue",
                        ),
                        Err(e) => notify(Tone::Error, &e.to_string()),
                    }
                    break;
                }
                "" | "s" | "skip" => break,
                other => notify(Tone::Warning, &format!("Unknown answer '{}'", other)),
            }
        }
    }

    close_section();
    Ok(true)
}

/// Returns false when the user quit.
async fn walk_manual_queue(
    orchestrator: &RemediationOrchestrator,
    rl: &mut DefaultEditor,
) -> Result<bool> {
    let paths = orchestrator.snapshot().manual_queue().to_vec();
    if paths.is_empty() {
        return Ok(true);
    }

    open_section("Manual");
    notify(Tone::Info, "Paste a tidal.com or soundcloud.com URL, or leave empty to skip");

    for path in paths {
        println!();
        print_file_heading(&path);

        loop {
            let Some(answer) = ask(rl, "URL")? else {
                close_section();
                return Ok(false);
            };
            if answer.is_empty() {
                break;
            }
            match orchestrator.submit_manual_url(&path, &answer).await {
                Ok(outcome) => {
                    print_outcome(&outcome);
                    break;
                }
                Err(RemediationError::InvalidUrl(message)) => {
                    notify(Tone::Error, &format!("{}, try again", message));
                }
                Err(e) => {
                    notify(Tone::Error, &e.to_string());
                    break;
                }
            }
        }
    }

    close_section();
    Ok(true)
}

fn print_outcome(outcome: &ItemOutcome) {
    notify(Tone::of_outcome(outcome), &describe(outcome));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Final report
// ═══════════════════════════════════════════════════════════════════════════════

fn print_comparisons(orchestrator: &RemediationOrchestrator) {
    let state = orchestrator.snapshot();
    open_section("Replaced");

    if state.comparisons().is_empty() {
        print_nothing("Nothing was replaced");
        close_section();
        return;
    }

    let mut table = Table::new(&["File", "Original", "New", "Bitrate", "Backup"]);
    for record in state.comparisons() {
        let bitrate = record
            .new_bitrate
            .map(|b| format!("{} kbps", b))
            .unwrap_or_else(|| "-".to_string());
        let name = file_label(&record.replaced_path.to_string_lossy());
        let original = format_duration(record.original_duration_secs);
        let new = format_duration(record.new_duration_secs);
        table.plain_row(&[
            name.as_str(),
            original.as_str(),
            new.as_str(),
            bitrate.as_str(),
            if record.backup_kept { "yes" } else { "no" },
        ]);
    }
    table.print();
    close_section();
}

fn print_failures(orchestrator: &RemediationOrchestrator) {
    let state = orchestrator.snapshot();

    let failed: Vec<_> = state
        .items()
        .filter(|item| matches!(item.status, WorkStatus::QueueFull | WorkStatus::Error))
        .collect();
    if !failed.is_empty() {
        open_section("Failed");
        for item in failed {
            let reason = item.last_error.as_deref().unwrap_or("unknown error");
            print_path_item(
                &format!("{} [{}] {}", file_label(&item.path), item.status, reason),
                false,
            );
        }
        close_section();
    }

    let manual = state.manual_queue();
    if !manual.is_empty() {
        notify(
            Tone::Warning,
            &format!("{} file(s) still need a manual source", manual.len()),
        );
        for path in manual {
            print_path_item(&file_label(path), true);
        }
    }
}
