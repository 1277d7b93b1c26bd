//! icon-detect CLI

use anyhow::{Context, Result};
use clap::Parser;
use icondetect::cli::{Args, Command};
use icondetect::{
    APP_NAME, AppConfig, Hive, RunOptions, RunOutcome, Snapshot, SystemProcesses, logging,
    notify, run_repair, run_restart, run_restore, scheme, settings,
};
use icondetect_store::KeyStore;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();

    if args.version {
        println!("{} {}", APP_NAME, env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let config = match settings::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.print_config {
        return match config.to_yaml() {
            Ok(yaml) => {
                print!("{}", yaml);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let _log = match logging::init(&config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error initializing log file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("{}: {:#}", APP_NAME, e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, config: &AppConfig) -> Result<()> {
    match args.command() {
        Command::Version | Command::PrintConfig => Ok(()),
        Command::Register => {
            let exe = std::env::current_exe().context("cannot locate the running executable")?;
            scheme::reregister(&live_store(Hive::ClassesRoot)?, APP_NAME, &config.scheme, &exe)?;
            log::info!("URI scheme registered");
            Ok(())
        }
        Command::Unregister => {
            scheme::unregister(&live_store(Hive::ClassesRoot)?, &config.scheme)?;
            log::info!("URI scheme unregistered");
            Ok(())
        }
        Command::Restart(uri) => {
            run_restart(&SystemProcesses::default(), &uri, config)?;
            Ok(())
        }
        Command::Restore(path) => match &args.snapshot {
            Some(snapshot_path) => {
                let snapshot = Snapshot::load(snapshot_path)?;
                restore(snapshot.store(), &path)?;
                snapshot.save()?;
                Ok(())
            }
            None => restore(&live_store(config.detect.hive)?, &path),
        },
        Command::Repair => {
            let options = RunOptions {
                backup: args.backup,
                dry_run: args.dry_run,
            };
            match &args.snapshot {
                Some(snapshot_path) => {
                    let snapshot = Snapshot::load(snapshot_path)?;
                    let config = snapshot.config(config);
                    if repair(snapshot.store(), &config, &options, false)? {
                        snapshot.save()?;
                    }
                    Ok(())
                }
                None => {
                    let registered = live_store(Hive::ClassesRoot)
                        .map(|store| scheme::is_registered(&store, &config.scheme))
                        .unwrap_or(false);
                    repair(&live_store(config.detect.hive)?, config, &options, registered)?;
                    Ok(())
                }
            }
        }
    }
}

/// Returns whether the store was changed.
fn repair<S: KeyStore>(
    store: &S,
    config: &AppConfig,
    options: &RunOptions,
    scheme_registered: bool,
) -> Result<bool> {
    let notifier = notify::system_notifier();
    match run_repair(store, config, options, notifier.as_ref(), scheme_registered)? {
        RunOutcome::Unchanged => Ok(false),
        RunOutcome::DryRun(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(false)
        }
        RunOutcome::Repaired { report, .. } => {
            if !report.is_clean() {
                log::warn!("{} changes failed and are left for the next run", report.failed);
            }
            Ok(true)
        }
    }
}

fn restore<S: KeyStore>(store: &S, path: &std::path::Path) -> Result<()> {
    let report = run_restore(store, path)?;
    log::info!(
        "restore finished: {} restored, {} deleted, {} failed",
        report.restored,
        report.deleted,
        report.failed
    );
    Ok(())
}

#[cfg(windows)]
fn live_store(hive: Hive) -> Result<icondetect_store::RegistryStore> {
    Ok(icondetect_store::RegistryStore::new(hive))
}

#[cfg(not(windows))]
fn live_store(hive: Hive) -> Result<icondetect_store::MemoryStore> {
    anyhow::bail!(
        "{} is only reachable on Windows, use --snapshot <file.reg>",
        hive.export_name()
    )
}
