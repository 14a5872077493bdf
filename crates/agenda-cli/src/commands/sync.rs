use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use agenda_core::config::SyncConfig;
use agenda_core::sync::{ConnectivityMonitor, HttpCollaborator, PassReport, SyncEngine};

use crate::commands::common::{load_config, open_store};
use crate::error::CliError;

struct SyncSetup {
    engine: SyncEngine,
    remote: Arc<HttpCollaborator>,
}

async fn prepare(config: &SyncConfig, db_path: &Path) -> Result<SyncSetup, CliError> {
    let remote = Arc::new(HttpCollaborator::from_config(config)?);
    let store = open_store(db_path).await?;
    let connectivity = ConnectivityMonitor::new(remote.check_health().await);
    let engine = SyncEngine::new(store, remote.clone(), connectivity, config.max_retries);
    Ok(SyncSetup { engine, remote })
}

const MIN_WATCH_INTERVAL: Duration = Duration::from_secs(1);

pub async fn run_sync(watch: bool, interval: Option<u64>, db_path: &Path) -> Result<(), CliError> {
    let mut config = load_config()?;
    if let Some(secs) = interval {
        config = config.with_sync_interval(Duration::from_secs(secs));
    }
    let setup = prepare(&config, db_path).await?;

    if watch {
        return run_watch(&setup, watch_interval(&config)).await;
    }

    if !setup.engine.connectivity().is_online() {
        let pending = setup.engine.store().pending_count().await?;
        println!("Backend unreachable; {pending} mutation(s) still pending");
        return Ok(());
    }

    match setup.engine.run_pass().await? {
        Some(report) => println!("{}", format_pass_report(&report)),
        None => println!("Sync skipped"),
    }
    Ok(())
}

/// Interval for watch mode; `tokio::time::interval` panics on zero
pub fn watch_interval(config: &SyncConfig) -> Duration {
    config.sync_interval().max(MIN_WATCH_INTERVAL)
}

async fn run_watch(setup: &SyncSetup, interval: Duration) -> Result<(), CliError> {
    let engine = &setup.engine;
    engine.start(interval).await;
    println!("Watching for changes every {}s (Ctrl-C to stop)", interval.as_secs());

    let mut health = tokio::time::interval(interval);
    health.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    health.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            _ = health.tick() => {
                engine.connectivity().set_online(setup.remote.check_health().await);
            }
        }
    }

    engine.stop();
    let pending = engine.store().pending_count().await?;
    println!(
        "Stopped after {} pass(es); {pending} mutation(s) pending",
        engine.passes_completed()
    );
    Ok(())
}

pub fn format_pass_report(report: &PassReport) -> String {
    let mut summary = format!(
        "Synced {} of {} mutation(s)",
        report.synced, report.attempted
    );
    if report.failed > 0 {
        summary.push_str(&format!(", {} failed", report.failed));
    }
    if report.dead_lettered > 0 {
        summary.push_str(&format!(", {} dead-lettered", report.dead_lettered));
    }
    summary
}
