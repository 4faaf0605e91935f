//! bkh - Backhaul
//!
//! Sync a site's platform backups into object storage, powered by backhaul.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use backhaul::{
    BackupCatalog, BackupItem, DirStore, EnvReport, Error as BackhaulError, HttpFetcher,
    ObjectStore, S3Store, SiteEnvironments, StoreOptions, SyncJob, SyncReport, Syncer,
    format_bytes, resolve_client_config, status_line,
};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// bkh - Sync site backups into object storage
///
/// Reads a backup-listing manifest (the platform CLI's `backup:list
/// --format=json` output collected per environment), skips everything the
/// destination already holds, and streams the rest with bounded
/// concurrency.
///
/// Usage:
///   bkh SITE --manifest backups.json --bucket BUCKET
///   bkh SITE --manifest backups.json --bucket BUCKET --env live --concurrent 4
#[derive(Parser, Debug)]
#[command(name = "bkh", version, about, long_about = None)]
struct Args {
    /// Site identifier
    site: String,

    /// Path to the backup-listing manifest (JSON)
    #[arg(short, long)]
    manifest: PathBuf,

    /// Destination bucket name
    #[arg(short, long)]
    bucket: String,

    /// Sync a single environment instead of all environments
    #[arg(short, long)]
    env: Option<String>,

    /// Destination path prefix
    #[arg(long)]
    save_path: Option<String>,

    /// Local staging directory for spool files
    #[arg(long)]
    tmp_location: Option<PathBuf>,

    /// Number of simultaneous transfers
    #[arg(short, long, default_value = "2")]
    concurrent: usize,

    /// Only sync backups of this element kind (e.g. files, db, code)
    #[arg(long)]
    elements: Option<String>,

    /// Only sync backups created after this RFC 3339 timestamp
    #[arg(long)]
    after: Option<String>,

    /// Additional attempts per failed item
    #[arg(long, default_value = "0")]
    retries: u32,

    /// Named credential profile for the destination store
    #[arg(long)]
    profile: Option<String>,

    /// Destination-store region override
    #[arg(long)]
    region: Option<String>,

    /// Explicit access key (only used together with --aws-secret)
    #[arg(long)]
    aws_key: Option<String>,

    /// Explicit secret key (only used together with --aws-key)
    #[arg(long)]
    aws_secret: Option<String>,

    /// Write objects under this local directory instead of S3
    #[arg(long, value_name = "DIRECTORY")]
    local_root: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    output: OutputMode,

    /// Disable the activity spinner
    #[arg(short, long)]
    quiet: bool,

    /// Per-item progress output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

// =============================================================================
// Manifest-backed catalog
// =============================================================================

/// Backup-listing manifest: one entry per environment, in platform order.
#[derive(Debug, Deserialize)]
struct Manifest {
    /// Site the listing was collected for, if recorded
    #[serde(default)]
    site: Option<String>,
    environments: Vec<ManifestEnvironment>,
}

#[derive(Debug, Deserialize)]
struct ManifestEnvironment {
    id: String,
    backups: Vec<ManifestBackup>,
}

#[derive(Debug, Deserialize)]
struct ManifestBackup {
    filename: String,
    url: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    element: Option<String>,
}

/// Serves both collaborator traits from one parsed manifest.
struct ManifestCatalog {
    manifest: Manifest,
}

impl SiteEnvironments for ManifestCatalog {
    fn list_environment_ids(&self, _site: &str) -> backhaul::Result<Vec<String>> {
        // Document order is the platform's lifecycle order; keep it.
        Ok(self
            .manifest
            .environments
            .iter()
            .map(|e| e.id.clone())
            .collect())
    }
}

impl BackupCatalog for ManifestCatalog {
    fn list_finished_backups(
        &self,
        environment: &str,
        element: Option<&str>,
        after: Option<DateTime<Utc>>,
    ) -> backhaul::Result<Vec<BackupItem>> {
        let env = self
            .manifest
            .environments
            .iter()
            .find(|e| e.id == environment)
            .ok_or_else(|| BackhaulError::CatalogListing {
                environment: environment.to_string(),
                reason: "environment not present in manifest".to_string(),
            })?;

        Ok(env
            .backups
            .iter()
            .filter(|b| element.is_none_or(|kind| b.element.as_deref() == Some(kind)))
            .filter(|b| after.is_none_or(|after| b.created_at > after))
            .map(|b| BackupItem {
                filename: b.filename.clone(),
                url: b.url.clone(),
                created_at: b.created_at,
                environment: environment.to_string(),
                size: b.size,
            })
            .collect())
    }
}

// =============================================================================
// CLI errors and exit codes
// =============================================================================

type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to read manifest {path}: {source}")]
    ManifestRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Manifest was collected for site '{manifest_site}', not '{site}'")]
    ManifestSiteMismatch { manifest_site: String, site: String },

    #[error("Invalid --after timestamp '{value}': {source}")]
    InvalidAfter {
        value: String,
        source: chrono::format::ParseError,
    },

    #[error("{source}")]
    Sync { source: BackhaulError },

    #[error("Sync completed with failures ({failed} backups, {failed_environments} environment listings)")]
    Partial {
        failed: u64,
        failed_environments: u64,
    },

    #[error("Failed to serialize JSON output: {source}")]
    JsonSerialize { source: serde_json::Error },
}

#[derive(Debug, Clone, Copy)]
enum ErrorCode {
    InvalidInput,
    Configuration,
    NoEnvironments,
    Cancelled,
    PartialFailure,
    IoError,
    Internal,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Configuration => "configuration",
            Self::NoEnvironments => "no_environments",
            Self::Cancelled => "cancelled",
            Self::PartialFailure => "partial_failure",
            Self::IoError => "io_error",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CliError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::ManifestRead { .. }
            | Self::ManifestParse { .. }
            | Self::ManifestSiteMismatch { .. }
            | Self::InvalidAfter { .. } => ErrorCode::InvalidInput,
            Self::Sync { source } => match source {
                BackhaulError::Configuration { .. } => ErrorCode::Configuration,
                BackhaulError::NoEnvironments { .. } => ErrorCode::NoEnvironments,
                BackhaulError::Cancelled { .. } => ErrorCode::Cancelled,
                BackhaulError::Staging { .. } | BackhaulError::Io(_) => ErrorCode::IoError,
                _ => ErrorCode::Internal,
            },
            Self::Partial { .. } => ErrorCode::PartialFailure,
            Self::JsonSerialize { .. } => ErrorCode::Internal,
        }
    }
}

fn exit_code_for(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::InvalidInput => 2,
        _ => 1,
    }
}

fn main() {
    if let Err(error) = run() {
        if let CliError::Sync {
            source:
                BackhaulError::Cancelled {
                    uploaded,
                    bytes_transferred,
                    ..
                },
        } = &error
        {
            eprintln!(
                "Cancelled after uploading {} backups ({}).",
                uploaded,
                format_bytes(*bytes_transferred)
            );
            eprintln!("Re-run with the same command to resume.");
            std::process::exit(130);
        }
        eprintln!("error[{}]: {}", error.code(), error);
        std::process::exit(exit_code_for(error.code()));
    }
}

fn run() -> CliResult<()> {
    let args = Args::parse();

    let after = args
        .after
        .as_deref()
        .map(|value| {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|source| CliError::InvalidAfter {
                    value: value.to_string(),
                    source,
                })
        })
        .transpose()?;

    let catalog = load_manifest(&args)?;
    let job = build_job(&args, after);

    let fetcher = HttpFetcher::new().map_err(|source| CliError::Sync { source })?;

    let store: Box<dyn ObjectStore> = match &args.local_root {
        Some(root) => Box::new(DirStore::new(root.join(&args.bucket))),
        None => {
            let options = StoreOptions {
                region: args.region.clone(),
                profile: args.profile.clone(),
                access_key: args.aws_key.clone(),
                secret_key: args.aws_secret.clone(),
            };
            let config =
                resolve_client_config(&options).map_err(|source| CliError::Sync { source })?;
            Box::new(S3Store::new(&args.bucket, config))
        }
    };

    let mut syncer = Syncer::new(&catalog, &catalog, store.as_ref(), &fetcher);
    if args.verbose && args.output == OutputMode::Human {
        syncer = syncer.with_progress(Box::new(|name, done, expected| {
            eprintln!("  {}", status_line(name, done, expected));
        }));
    }

    let spinner = if args.output == OutputMode::Human && !args.quiet && !args.verbose {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner().template("{spinner:.green} {msg}");
        if let Ok(style) = style {
            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb.set_message(format!("Syncing {}...", args.site));
            Some(pb)
        } else {
            None
        }
    } else {
        None
    };

    let result = syncer.sync(&job);

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let report = result.map_err(|source| CliError::Sync { source })?;

    match args.output {
        OutputMode::Human => print_report(&report),
        OutputMode::Json => print_json_report(&args.site, &report)?,
    }

    let failed = report.failed();
    let failed_environments = report
        .environments
        .iter()
        .filter(|env| env.error.is_some())
        .count() as u64;
    if failed > 0 || failed_environments > 0 {
        return Err(CliError::Partial {
            failed,
            failed_environments,
        });
    }
    Ok(())
}

fn load_manifest(args: &Args) -> CliResult<ManifestCatalog> {
    let raw = fs::read_to_string(&args.manifest).map_err(|source| CliError::ManifestRead {
        path: args.manifest.clone(),
        source,
    })?;
    let manifest: Manifest =
        serde_json::from_str(&raw).map_err(|source| CliError::ManifestParse {
            path: args.manifest.clone(),
            source,
        })?;

    if let Some(manifest_site) = &manifest.site {
        if manifest_site != &args.site {
            return Err(CliError::ManifestSiteMismatch {
                manifest_site: manifest_site.clone(),
                site: args.site.clone(),
            });
        }
    }

    Ok(ManifestCatalog { manifest })
}

fn build_job(args: &Args, after: Option<DateTime<Utc>>) -> SyncJob {
    let mut job = SyncJob::new(&args.site, &args.bucket)
        .with_concurrent(args.concurrent)
        .with_retries(args.retries);

    if let Some(env) = &args.env {
        job = job.with_environment(env);
    }
    if let Some(prefix) = &args.save_path {
        job = job.with_prefix(prefix);
    }
    if let Some(tmp) = &args.tmp_location {
        job = job.with_staging_dir(tmp);
    }
    if let Some(elements) = &args.elements {
        job = job.with_element(elements);
    }
    if let Some(after) = after {
        job = job.with_after(after);
    }
    if args.verbose {
        job = job.verbose();
        if args.output == OutputMode::Human {
            job = job.with_warn_handler(|msg| {
                eprintln!("warning: {}", msg);
            });
        }
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel_clone = cancel.clone();
        ctrlc::set_handler(move || {
            if cancel_clone.load(Ordering::Relaxed) {
                eprintln!("\nForce quit.");
                std::process::exit(130);
            }
            cancel_clone.store(true, Ordering::Relaxed);
            eprintln!(
                "\nCancelling... letting in-flight transfers drain. Press Ctrl+C again to abort immediately."
            );
        })
        .ok();
    }
    job.with_cancel_token(cancel)
}

// =============================================================================
// Output
// =============================================================================

fn print_report(report: &SyncReport) {
    for env in &report.environments {
        match &env.error {
            Some(error) => println!("{}: listing failed ({})", env.environment, error),
            None => {
                println!(
                    "{}: {} uploaded, {} skipped, {} failed ({})",
                    env.environment,
                    env.uploaded(),
                    env.skipped(),
                    env.failed(),
                    format_bytes(env.bytes_transferred())
                );
                for failure in env.failures() {
                    match &failure.error {
                        Some(error) => println!("  {}: {}", failure.filename, error),
                        None => println!("  {}: failed", failure.filename),
                    }
                }
            }
        }
    }

    if report.uploaded() == 0 && report.failed() == 0 {
        if report.skipped() > 0 {
            println!(
                "Nothing to sync ({} backups already exist)",
                report.skipped()
            );
        } else {
            println!("Nothing to sync");
        }
        return;
    }

    println!(
        "Synced {} backups ({}) in {:?}",
        report.uploaded(),
        format_bytes(report.bytes_transferred()),
        report.duration
    );
}

fn env_to_json_value(env: &EnvReport) -> Value {
    let failures: Vec<Value> = env
        .failures()
        .map(|failure| {
            json!({
                "filename": failure.filename,
                "key": failure.key,
                "error": failure.error.as_ref().map(|e| e.to_string()),
            })
        })
        .collect();

    json!({
        "environment": env.environment,
        "uploaded": env.uploaded(),
        "skipped": env.skipped(),
        "failed": env.failed(),
        "bytes_transferred": env.bytes_transferred(),
        "error": env.error.as_ref().map(|e| e.to_string()),
        "failures": failures,
    })
}

fn print_json_report(site: &str, report: &SyncReport) -> CliResult<()> {
    let environments: Vec<Value> = report.environments.iter().map(env_to_json_value).collect();

    let value = json!({
        "site": site,
        "environments": environments,
        "uploaded": report.uploaded(),
        "skipped": report.skipped(),
        "failed": report.failed(),
        "bytes_transferred": report.bytes_transferred(),
        "duration_ms": report.duration.as_millis() as u64,
    });

    let serialized =
        serde_json::to_string(&value).map_err(|source| CliError::JsonSerialize { source })?;
    println!("{serialized}");
    Ok(())
}
