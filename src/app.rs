//! Application orchestrator.
//! Loads/merges config, initializes logging, validates paths, takes the run
//! lock, runs the migration and reports the outcome.

use anyhow::Result;
use std::process::ExitCode;
use tracing::{debug, error, info};

use usr_merge::cli::Args;
use usr_merge::config::{Config, load_settings, locate_config, validate_and_normalize};
use usr_merge::errors::UsrMergeError;
use usr_merge::fs_ops::acquire_run_lock;
use usr_merge::logging::init_tracing;
use usr_merge::merge::{MappingStatus, Migration, RunSummary};
use usr_merge::output as out;

pub const EXIT_CONFLICTS: u8 = 1;
pub const EXIT_SETUP_FAILURE: u8 = 2;

/// Run the CLI application. Setup failures come back as `Err`; a run with
/// conflicts is a normal return with a non-zero exit code.
pub fn run(args: Args) -> Result<ExitCode> {
    // Handle --print-config before logging init
    if args.print_config {
        print_config_location(&args);
        return Ok(ExitCode::SUCCESS);
    }

    // Precedence: defaults < config file < CLI.
    let mut cfg = Config::default();
    if let Some(settings) = load_settings(args.config.as_deref())? {
        settings.apply_to(&mut cfg);
    }
    args.apply_overrides(&mut cfg);

    // Hold the guard until return so file logs are flushed.
    let _guard = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json)?;
    debug!(?args, "starting usr_merge");

    if let Err(e) = validate_and_normalize(&mut cfg) {
        error!(code = e.code(), error = %e, "invalid configuration");
        return Err(e.into());
    }

    let _lock = if cfg.disable_locks {
        debug!("run lock disabled");
        None
    } else {
        match acquire_run_lock(&cfg.root) {
            Ok(lock) => Some(lock),
            Err(e) => {
                if let Some(known) = e.downcast_ref::<UsrMergeError>() {
                    error!(code = known.code(), error = %known, "cannot lock root");
                }
                return Err(e);
            }
        }
    };

    let migration = Migration::from_config(&cfg)?;
    info!(
        root = %cfg.root.display(),
        base = %migration.base().display(),
        dry_run = cfg.dry_run,
        mappings = cfg.mappings.len(),
        "starting merge"
    );
    let summary = migration.run();
    report(&summary);

    if summary.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_CONFLICTS))
    }
}

fn print_config_location(args: &Args) {
    match locate_config(args.config.as_deref()) {
        Some((path, true)) => {
            out::print_info("Using explicit config file:");
            out::print_user(&format!("  {}", path.display()));
        }
        Some((path, false)) => {
            out::print_info("Default usr_merge config path:");
            out::print_user(&format!("  {}", path.display()));
            if !path.exists() {
                out::print_info("No config file exists there yet; built-in defaults apply.");
            }
        }
        None => out::print_error("Could not determine a default config path"),
    }
}

/// One line per mapping, then totals.
fn report(summary: &RunSummary) {
    for o in &summary.outcomes {
        let line = format!("{}: {}", o.mapping, o.status);
        match o.status {
            MappingStatus::Merged | MappingStatus::Validated => out::print_success(&line),
            MappingStatus::Failed => out::print_error(&format!(
                "{line} ({} conflict(s); {} left unchanged)",
                o.report.conflicts.len(),
                o.source.display()
            )),
            MappingStatus::NotADirectory => out::print_warn(&line),
            MappingStatus::AlreadyMerged | MappingStatus::Missing => out::print_info(&line),
        }
    }

    let totals = summary.totals();
    let prefix = if summary.dry_run { "Dry-run: would merge" } else { "Merged" };
    out::print_info(&format!(
        "{prefix} {} file(s) ({} copied), {} symlink(s); {} already merged, {} ignored, {} conflict(s)",
        totals.files,
        totals.files_copied,
        totals.symlinks,
        totals.skipped,
        totals.ignored,
        summary.conflict_count()
    ));
}
