use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::{
    analysis::ImentivClient,
    capture::FfmpegRecorder,
    db::Database,
    models::Summary,
    session::{RunnerConfig, RunnerPhase, SessionRunner, StopOutcome},
    settings::{SettingsStore, StorageBackend, TrackerSettings},
    store::{FileStore, SessionStore},
};

const DEBUG_ENV: &str = "LUMORA_DEBUG";

#[derive(Parser, Debug)]
#[command(name = "lumora", version, about = "Webcam emotion sampling sessions")]
struct Cli {
    /// Directory holding settings, clips and session data
    #[arg(long, default_value = "lumora-data")]
    data_dir: PathBuf,

    /// Settings file (defaults to <data-dir>/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Interactive prompt: start / stop / status / exit
    Track,
    /// Run one session until its time budget elapses or Ctrl-C
    Session {
        /// Session length; falls back to the configured budget
        #[arg(long)]
        minutes: Option<u64>,
    },
    /// List past sessions and their summaries (SQLite storage only)
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn init_logging() {
    let debug_mode = std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Info);
    if debug_mode {
        builder.filter_module("lumora_lib::session", log::LevelFilter::Debug);
    }
    builder.parse_default_env();
    builder.init();
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    info!("Lumora starting up...");

    let settings_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.data_dir.join("settings.json"));
    let settings = SettingsStore::new(settings_path)?;
    if !settings.path().exists() {
        settings.save()?;
        info!("Wrote default settings to {}", settings.path().display());
    }
    let tracker = settings.tracker();

    match cli.command.clone().unwrap_or(Command::Track) {
        Command::History { limit } => show_history(&cli.data_dir, &tracker, limit).await,
        Command::Track => {
            let mut runner = build_runner(&cli.data_dir, &settings, &tracker).await?;
            let config = RunnerConfig::from_settings(&tracker.runner);
            interactive(&mut runner, config).await
        }
        Command::Session { minutes } => {
            let mut runner = build_runner(&cli.data_dir, &settings, &tracker).await?;
            let mut config = RunnerConfig::from_settings(&tracker.runner);
            if let Some(minutes) = minutes {
                config.session_budget = Some(Duration::from_secs(minutes.saturating_mul(60)));
            }
            timed_session(&mut runner, config).await
        }
    }
}

async fn open_database(data_dir: &std::path::Path) -> Result<Database> {
    let database = Database::new(data_dir.join("lumora.sqlite3"))?;

    // Close out sessions that were running when the process last died.
    for session in database.get_incomplete_sessions().await? {
        warn!(
            "Recovered incomplete session {}; marking as Interrupted",
            session.id
        );
        database
            .mark_session_interrupted(&session.id, Utc::now())
            .await?;
    }

    Ok(database)
}

async fn build_runner(
    data_dir: &std::path::Path,
    settings: &SettingsStore,
    tracker: &TrackerSettings,
) -> Result<SessionRunner> {
    let store: Arc<dyn SessionStore> = match tracker.storage {
        StorageBackend::Sqlite => Arc::new(open_database(data_dir).await?),
        StorageBackend::Files => Arc::new(FileStore::new(data_dir.join("sessions"))),
    };

    let api_key = settings.api_key();
    if api_key.is_none() {
        warn!(
            "No API key configured; set {} or analysis.api_key in {}",
            crate::settings::API_KEY_ENV,
            settings.path().display()
        );
    }

    let recorder = FfmpegRecorder::new(tracker.camera.clone(), data_dir.join("clips"));
    let analyzer = ImentivClient::new(&tracker.analysis, api_key)?;

    Ok(SessionRunner::new(
        Arc::new(recorder),
        Arc::new(analyzer),
        store,
    ))
}

async fn interactive(runner: &mut SessionRunner, config: RunnerConfig) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        stdout
            .write_all(b"\nEnter command (start / stop / status / exit): ")
            .await?;
        stdout.flush().await?;

        let line = loop {
            tokio::select! {
                line = lines.next_line() => break line.context("failed to read command")?,
                _ = ticker.tick() => {
                    if runner.has_exited() {
                        report_stop(runner.stop().await);
                    }
                }
            }
        };

        let Some(line) = line else {
            info!("Input stream closed. Exiting.");
            break;
        };

        match line.trim().to_lowercase().as_str() {
            "start" => match runner.start(config.clone()).await {
                Ok(session_id) => println!("Session {session_id} started."),
                Err(err) => println!("{err}"),
            },
            "stop" => report_stop(runner.stop().await),
            "status" => print_status(runner),
            "exit" | "quit" => {
                if runner.phase() != RunnerPhase::Idle {
                    report_stop(runner.stop().await);
                }
                break;
            }
            "" => {}
            other => println!("Unknown command '{other}'. Use start / stop / status / exit."),
        }
    }

    info!("Exiting.");
    Ok(())
}

async fn timed_session(runner: &mut SessionRunner, config: RunnerConfig) -> Result<()> {
    match config.session_budget {
        Some(budget) => info!("Starting {:.1}-minute session", budget.as_secs_f64() / 60.0),
        None => info!("Starting session without a time budget; Ctrl-C to stop"),
    }
    runner.start(config).await?;

    let finished = tokio::select! {
        finished = runner.wait() => Some(finished),
        _ = tokio::signal::ctrl_c() => None,
    };

    let summary = match finished {
        Some(result) => result?,
        None => loop {
            match runner.stop().await? {
                StopOutcome::Stopped(summary) => break summary,
                StopOutcome::Unconfirmed { session_id } => {
                    warn!("Session {session_id} still shutting down; waiting");
                }
            }
        },
    };

    println!("{}", format_summary(&summary));
    Ok(())
}

async fn show_history(
    data_dir: &std::path::Path,
    tracker: &TrackerSettings,
    limit: usize,
) -> Result<()> {
    if tracker.storage != StorageBackend::Sqlite {
        println!(
            "History is read from SQLite; file sessions live in {}",
            data_dir.join("sessions").display()
        );
        return Ok(());
    }

    let database = open_database(data_dir).await?;
    info!("Reading history from {}", database.path().display());
    let entries = database.list_sessions(limit).await?;
    if entries.is_empty() {
        println!("No sessions recorded yet.");
    }
    for entry in entries {
        match entry.summary {
            Some(summary) => println!("{}\n", format_summary(&summary)),
            None => println!(
                "Session {} ({}) started {} - no summary\n",
                entry.session.id,
                entry.session.status.as_str(),
                entry.session.started_at.format("%Y-%m-%d %H:%M:%S")
            ),
        }
    }
    Ok(())
}

fn report_stop(result: Result<StopOutcome, crate::error::TrackerError>) {
    match result {
        Ok(StopOutcome::Stopped(summary)) => println!("{}", format_summary(&summary)),
        Ok(StopOutcome::Unconfirmed { session_id }) => println!(
            "Session {session_id} was asked to stop but has not exited yet; try 'stop' again."
        ),
        Err(err) => println!("{err}"),
    }
}

fn print_status(runner: &SessionRunner) {
    match (runner.phase(), runner.active_session_id()) {
        (RunnerPhase::Idle, _) => println!("Idle."),
        (phase, Some(id)) => println!("{phase:?}: session {id}"),
        (phase, None) => println!("{phase:?}"),
    }
    if let Some(summary) = runner.last_summary() {
        println!(
            "Last session: {} ({})",
            summary.session_id,
            summary.state.as_str()
        );
    }
}

fn format_summary(summary: &Summary) -> String {
    let mut out = String::from("===== SESSION SUMMARY =====\n");
    out.push_str(&format!("Session  : {}\n", summary.session_id));
    out.push_str(&format!(
        "Period   : {} -> {} ({:.2} min)\n",
        summary.started_at.format("%Y-%m-%d %H:%M:%S"),
        summary.ended_at.format("%Y-%m-%d %H:%M:%S"),
        summary.duration_minutes()
    ));
    out.push_str(&format!(
        "Cycles   : {} succeeded, {} failed\n",
        summary.succeeded_cycles, summary.failed_cycles
    ));
    for (name, score) in summary.mean_scores.iter() {
        out.push_str(&format!("  {name:<10}: {score:.3}\n"));
    }
    out.push_str(&format!(
        "Dominant : {}\n",
        summary.dominant.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!("State    : {}", summary.state.as_str()));
    out
}
