mod cli;
mod ui;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use jobtrack::activities::{
    Activities, ActivityWorker, AnthropicGenerator, ContentGenerator, GenerationRequest, LogNotifier,
};
use jobtrack::application::{ApplicationRecord, ApplicationStatus, ApplicationSubmission};
use jobtrack::config::TrackerConfig;
use jobtrack::error::ActivityError;
use jobtrack::host::WorkflowHost;
use jobtrack::store::{FileStore, HistoryStore, MemoryStore};
use ui::InstanceProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = TrackerConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Command::Run { file } => {
            let submission = read_submission(&file)?;
            let host = file_host(&config)?;
            let record = submission.into_record()?;
            run_one(&host, record).await
        }
        Command::Resume => {
            let host = file_host(&config)?;
            let resumed = host.recover().await?;
            if resumed.is_empty() {
                println!("Nothing to resume.");
                return Ok(());
            }
            for application_id in &resumed {
                println!("Resumed {application_id}");
            }
            for application_id in &resumed {
                match host.wait(application_id).await {
                    Ok(summary) => ui::print_json("Summary", &summary),
                    Err(e) => warn!(%application_id, error = %e, "instance did not complete"),
                }
            }
            Ok(())
        }
        Command::Status {
            application_id,
            content,
        } => {
            let host = file_host(&config)?;
            let snapshot = host.snapshot(&application_id).await?;
            println!("Phase: {}", snapshot.phase);
            ui::print_json("Status", &host.query_status(&application_id).await?);
            if content {
                let view = host.query_content(&application_id).await?;
                println!();
                println!("{}", view.as_text().unwrap_or("(cover letter not yet available)"));
            }
            Ok(())
        }
        Command::List => {
            let host = file_host(&config)?;
            ui::print_listing(&host.list().await?);
            Ok(())
        }
        Command::Demo => {
            if config.api_key.is_empty() {
                info!("no API key configured, demo uses a local draft generator");
                demo(DraftGenerator).await
            } else {
                demo(AnthropicGenerator::from_config(&config)?).await
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "jobtrack=debug" } else { "jobtrack=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_submission(path: &Path) -> Result<ApplicationSubmission> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let submission = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&contents)?,
        Some("toml") => toml::from_str(&contents)?,
        _ => bail!("unsupported submission format {}; use .json or .toml", path.display()),
    };
    Ok(submission)
}

fn file_host(config: &TrackerConfig) -> Result<WorkflowHost<AnthropicGenerator, LogNotifier>> {
    let store: Arc<dyn HistoryStore> = Arc::new(FileStore::open(&config.store_dir)?);
    let activities = Activities::new(
        ActivityWorker::new(config.activity_workers),
        AnthropicGenerator::from_config(config)?,
        LogNotifier,
    );
    Ok(WorkflowHost::new(store, Arc::new(activities), config.grace_period()))
}

/// Starts one application and follows it to the end, or until interrupted.
async fn run_one<G: ContentGenerator>(
    host: &WorkflowHost<G, LogNotifier>,
    record: ApplicationRecord,
) -> Result<()> {
    let description = format!("{} at {}", record.role, record.company);
    let handle = host.start(record).await?;
    println!("Tracking application {}", handle.application_id);
    follow(host, &handle.application_id, &description).await
}

async fn follow<G: ContentGenerator>(
    host: &WorkflowHost<G, LogNotifier>,
    application_id: &str,
    description: &str,
) -> Result<()> {
    let progress = InstanceProgress::start(description);
    let snapshots = host.subscribe(application_id).await?;

    let finished = tokio::select! {
        result = async {
            progress.follow(snapshots).await;
            host.wait(application_id).await
        } => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(result) = finished else {
        progress.complete(&Err("interrupted".to_string()));
        println!("Progress is journaled. Continue later with `jobtrack resume`.");
        return Ok(());
    };

    let outcome = result.map_err(|e| e.to_string());
    progress.complete(&outcome);
    if let Ok(summary) = outcome {
        ui::print_json("Summary", &summary);
        ui::print_json("Content", &host.query_content(application_id).await?);
    }
    Ok(())
}

/// A compressed lifecycle: a three second deadline, a reminder, then a
/// malformed update and an offer arriving during a three second grace period.
async fn demo<G: ContentGenerator>(generator: G) -> Result<()> {
    let store: Arc<dyn HistoryStore> = Arc::new(MemoryStore::new());
    let activities = Activities::new(ActivityWorker::new(2), generator, LogNotifier);
    let host = Arc::new(WorkflowHost::new(store, Arc::new(activities), Duration::from_secs(3)));

    let record = ApplicationRecord::new(
        "Acme Robotics",
        "Senior Backend Engineer",
        "Design and operate the fleet telemetry pipeline in Rust.",
        "Eight years building distributed systems; led a migration to async Rust.",
        "candidate@example.com",
        0,
    )
    .with_deadline(Duration::from_secs(3));
    let description = format!("{} at {}", record.role, record.company);
    let handle = host.start(record).await?;
    let application_id = handle.application_id.clone();
    println!("Tracking demo application {application_id}");

    let script = {
        let host = Arc::clone(&host);
        let application_id = application_id.clone();
        async move {
            let mut snapshots = host.subscribe(&application_id).await?;
            snapshots
                .wait_for(|s| s.state.status == ApplicationStatus::ReminderSent)
                .await?;
            host.signal(&application_id, "HIRED").await?;
            tokio::time::sleep(Duration::from_millis(500)).await;
            host.signal(&application_id, vec!["OFFER".to_string()]).await?;
            anyhow::Ok(())
        }
    };

    let (run_result, script_result) =
        tokio::join!(follow(host.as_ref(), &application_id, &description), script);
    if let Err(e) = script_result {
        warn!(error = %e, "demo script stopped early");
    }
    run_result
}

/// Offline stand-in used by `demo` when no API key is configured.
struct DraftGenerator;

impl ContentGenerator for DraftGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ActivityError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(format!(
            "Dear {company} hiring team,\n\n\
             I am writing to apply for the {role} position. {resume}\n\n\
             Your description, \"{description}\", matches what I do best, and I \
             would welcome the chance to discuss it.\n\nSincerely,\nThe applicant",
            company = request.company,
            role = request.role,
            resume = request.resume,
            description = request.job_description,
        ))
    }
}
