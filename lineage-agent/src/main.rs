//! Lineage Agent - Main entry point
//!
//! Invoked by the replicator's backup orchestration with `--backup` or
//! `--restore`, a `--properties` result handle and an URL-encoded
//! `--options` list.

use anyhow::{anyhow, Context, Result};
use clap::{ArgGroup, Parser};
use lineage_agent::config::{parse_options, Config};
use lineage_agent::executor::{read_handle, BackupExecutor, BackupMode, RestoreExecutor};
use lineage_agent::lineage::inspect;
use lineage_agent::storage::{existing_root, latest_artifact, StorageLock};
use lineage_agent::tool::ProcessRunner;
use lineage_agent::{retention, utils, ArtifactId};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["backup", "restore", "inspect", "prune", "print_config"])
))]
struct Args {
    /// Take a backup (incremental when enabled and possible)
    #[arg(long)]
    backup: bool,

    /// Replay the backup named by --properties into a staging directory
    #[arg(long)]
    restore: bool,

    /// Print the lineage of an artifact (default: the latest) as JSON
    #[arg(long, value_name = "ARTIFACT", num_args = 0..=1)]
    inspect: Option<Option<PathBuf>>,

    /// Remove backups outside the retention policy
    #[arg(long)]
    prune: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Result handle file (written on backup, read on restore)
    #[arg(long, value_name = "FILE")]
    properties: Option<PathBuf>,

    /// URL-encoded key=value options joined by '&'
    #[arg(long, value_name = "LIST")]
    options: Option<String>,

    /// Staging directory for --restore
    #[arg(long, value_name = "DIR")]
    staging: Option<PathBuf>,

    /// Force a full backup even when incremental backups are enabled
    #[arg(long)]
    full: bool,

    /// With --prune, only report what would be removed
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration (file + environment)
    let loaded = Config::load(args.config.as_deref());

    // Initialize logging
    let log_level = args
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.log.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    if let Err(e) = utils::logger::init(&log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let result = match loaded {
        Ok(config) => run(&args, config).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args, mut config: Config) -> Result<()> {
    if let Some(raw) = &args.options {
        let options = parse_options(raw)?;
        config.apply_options(&options)?;
    }
    config.validate()?;

    tracing::debug!(
        "lineage-agent v{} (storage root: {})",
        env!("CARGO_PKG_VERSION"),
        config.storage.root.display()
    );

    if args.print_config {
        print!("{}", config.to_toml_masked()?);
        return Ok(());
    }

    if args.backup {
        let mode = if config.backup.incremental && !args.full {
            BackupMode::IncrementalIfPossible
        } else {
            BackupMode::Full
        };
        let executor = BackupExecutor::new(&config, ProcessRunner);
        let artifact = executor
            .create_backup(mode, args.properties.as_deref())
            .await
            .context("backup failed")?;
        tracing::info!(
            "Backup {} ({}) stored in {}",
            artifact.id,
            artifact.kind,
            artifact.directory.display()
        );
        return Ok(());
    }

    if args.restore {
        let staging = args
            .staging
            .clone()
            .or_else(|| config.storage.staging_dir.clone())
            .unwrap_or_else(|| config.storage.root.join(ArtifactId::generate_restore().as_str()));
        let executor = RestoreExecutor::new(&config, ProcessRunner);
        let target = executor
            .restore(&staging, args.properties.as_deref())
            .await
            .context("restore failed")?;
        tracing::info!(
            "Restored {} into {}",
            target.lineage.tip().id,
            target.staging_directory.display()
        );
        println!("{}", target.staging_directory.display());
        return Ok(());
    }

    if let Some(artifact) = &args.inspect {
        let dir = match artifact {
            Some(dir) => dir.clone(),
            None => latest_artifact(&config.storage.root)?
                .map(|latest| latest.directory)
                .ok_or_else(|| anyhow!("no backups in {}", config.storage.root.display()))?,
        };
        let report = inspect(&dir, config.storage.max_lineage_depth);
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !report.valid {
            anyhow::bail!("lineage of {} is broken", dir.display());
        }
        return Ok(());
    }

    if args.prune {
        if config.retention.keep_full == 0 {
            tracing::warn!("Retention is disabled (keep_full = 0), nothing to prune");
            return Ok(());
        }
        let root = existing_root(&config.storage.root)?;
        let _lock = if config.storage.lock {
            Some(StorageLock::acquire(&root)?)
        } else {
            None
        };
        let referenced = match &args.properties {
            Some(handle) => match read_handle(handle).await {
                Ok(target) => Some(target),
                Err(e) => {
                    tracing::warn!("Ignoring result handle: {}", e);
                    None
                }
            },
            None => None,
        };
        let report = retention::prune(
            &root,
            config.retention.keep_full,
            config.storage.max_lineage_depth,
            referenced.as_deref(),
            args.dry_run,
        )?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    Err(anyhow!("no action given"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_backup_flags() {
        let args = Args::try_parse_from([
            "lineage-agent",
            "--backup",
            "--properties",
            "/tmp/backup.properties",
            "--options",
            "host=db1&incremental=true",
        ])
        .unwrap();
        assert!(args.backup);
        assert!(!args.restore);
        assert_eq!(args.properties, Some(PathBuf::from("/tmp/backup.properties")));
        assert_eq!(args.options.as_deref(), Some("host=db1&incremental=true"));
    }

    #[test]
    fn test_inspect_value_is_optional() {
        let bare = Args::try_parse_from(["lineage-agent", "--inspect"]).unwrap();
        assert_eq!(bare.inspect, Some(None));

        let named = Args::try_parse_from(["lineage-agent", "--inspect", "/bk/incr_x"]).unwrap();
        assert_eq!(named.inspect, Some(Some(PathBuf::from("/bk/incr_x"))));
    }

    #[test]
    fn test_exactly_one_action() {
        assert!(Args::try_parse_from(["lineage-agent"]).is_err());
        assert!(Args::try_parse_from(["lineage-agent", "--backup", "--restore"]).is_err());
    }
}
