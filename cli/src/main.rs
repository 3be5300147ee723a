mod config;

use buildfeed::backup::BackupChain;
use buildfeed::cache::{CacheStore, FilesystemStore, KeyValueStore, MemoryStore, StoreError};
use buildfeed::contributors::{ContributorStore, major_contributors, minor_contributors};
use buildfeed::datefmt::{Locale, format_release_date};
use buildfeed::geo::{DEFAULT_GEO_URL, is_china_user};
use buildfeed::primary::GitHubSource;
use buildfeed::{BuildFeed, FeedOutcome};
use clap::{Parser, Subcommand};
use config::{Config, ConfigError, LocaleSetting, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(version, about = "Release and build metadata with mirror fallback")]
struct Cli {
    #[arg(long, short, default_value = "buildfeed.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// List build records for the configured (or given) repositories
    Builds {
        /// owner/project, may be repeated. Defaults to the configured repos.
        #[arg(long = "repo")]
        repos: Vec<String>,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// List contributors of the configured repository
    Contributors,
    /// Show mirrors in failover order
    Mirrors,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("could not open cache: {0}")]
    Store(#[from] StoreError),
    #[error("could not encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("no contributors repository configured")]
    NoContributorsRepo,
}

fn init_logging(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let level = logging.map(|l| l.level.as_str()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let sentry_guard = logging
        .and_then(|l| l.sentry_dsn.as_deref())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ))
        });
    let sentry_layer = sentry_guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_layer)
        .init();

    sentry_guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some("buildfeed"))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;
    buildfeed::metrics_defs::describe_all();
    Ok(())
}

async fn resolve_locale(setting: LocaleSetting, client: &reqwest::Client) -> Locale {
    match setting {
        LocaleSetting::En => Locale::En,
        LocaleSetting::Zh => Locale::Zh,
        LocaleSetting::Auto => {
            if is_china_user(client, DEFAULT_GEO_URL).await {
                Locale::Zh
            } else {
                Locale::En
            }
        }
    }
}

async fn run(command: CliCommand, config: Config) -> Result<ExitCode, CliError> {
    let client = buildfeed::http_client()?;

    match command {
        CliCommand::Builds { repos, json } => {
            let repos = if repos.is_empty() {
                config.github.repos.clone()
            } else {
                repos
            };

            let store: Arc<dyn KeyValueStore> = match &config.cache.dir {
                Some(dir) => Arc::new(FilesystemStore::new(dir)?),
                None => Arc::new(MemoryStore::new()),
            };
            let feed = BuildFeed::new(
                GitHubSource::new(client.clone(), &config.github.api_base),
                BackupChain::new(client.clone(), config.mirrors.clone()),
                CacheStore::new(store),
            );

            let builds = match feed.builds(&repos).await {
                FeedOutcome::Available(builds) => builds,
                FeedOutcome::Unavailable { cooling_down } => {
                    eprintln!("Release data is unavailable (cooling down: {cooling_down})");
                    return Ok(ExitCode::FAILURE);
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&builds)?);
                return Ok(ExitCode::SUCCESS);
            }

            let locale = resolve_locale(config.locale, &client).await;
            tracing::info!(origin = ?builds.origin, count = builds.records.len(), "loaded builds");
            for record in &builds.records {
                let published = format_release_date(&record.end_time, locale)
                    .unwrap_or_else(|_| record.end_time.clone());
                println!(
                    "{:<12} {:<28} {:<10} {:<30} {:<8} {}",
                    record.project_name,
                    record.version,
                    record.release_type.as_str(),
                    published,
                    record.commit_hash,
                    record.branch,
                );
            }
        }
        CliCommand::Contributors => {
            let repo = config
                .github
                .contributors_repo
                .as_deref()
                .ok_or(CliError::NoContributorsRepo)?;
            let store = ContributorStore::new(client, &config.github.api_base, repo);
            let contributors = store.fetch_contributors().await;
            if let Some(error) = store.error() {
                eprintln!("Could not load contributors: {error}");
                return Ok(ExitCode::FAILURE);
            }

            println!("Major contributors:");
            for c in major_contributors(&contributors) {
                println!("  {:<24} {:>6}  {}", c.login, c.contributions, c.html_url);
            }
            println!("Contributors:");
            for c in minor_contributors(&contributors) {
                println!("  {:<24} {:>6}  {}", c.login, c.contributions, c.html_url);
            }
        }
        CliCommand::Mirrors => {
            for (position, mirror) in config.mirrors.iter().enumerate() {
                let state = if mirror.disabled { "disabled" } else { "enabled" };
                println!("{}. {} ({state})", position + 1, mirror.name);
                println!("   {}", mirror.url);
                if let Some(old_url) = &mirror.old_url {
                    println!("   {old_url} (fallback)");
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry = init_logging(config.logging.as_ref());
    if let Some(metrics) = &config.metrics
        && let Err(e) = init_metrics(metrics)
    {
        tracing::warn!(error = %e, "metrics disabled");
    }

    // Requests are issued one at a time, a single-threaded runtime is enough.
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: could not start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli.command, config)) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
