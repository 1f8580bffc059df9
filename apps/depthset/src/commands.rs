use depthset_application::config::{self, Config};
use depthset_application::export::export_data_set;
use depthset_application::processing::{process_symbols, CycleSummary};
use depthset_domain::value_objects::symbol::SymbolId;
use depthset_infrastructure::export::csv_export::CsvDataSetExporter;
use depthset_infrastructure::persistence::postgres_store::{PostgresDataSetRepository, TableNames};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

const DEFAULT_POOL_MAX_SIZE: u32 = 4;

pub fn open_repository(config: &Config) -> Result<PostgresDataSetRepository, String> {
    let db_url = resolve_db_url(config)?;
    let tables = TableNames {
        records: config.db.records_table.clone(),
        trade_runs: config.db.trade_runs_table.clone(),
        order_books: config.db.order_books_table.clone(),
        trades: config.db.trades_table.clone(),
    };
    PostgresDataSetRepository::new(
        &db_url,
        tables,
        config.db.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE),
    )
}

fn resolve_db_url(config: &Config) -> Result<String, String> {
    config
        .db
        .url
        .clone()
        .filter(|url| !url.trim().is_empty())
        .or_else(|| {
            std::env::var("DEPTHSET_DB_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
        })
        .ok_or_else(|| "missing db.url and env DEPTHSET_DB_URL is not set".to_string())
}

pub fn check_config(config: &Config) -> Result<(), String> {
    let symbols = config.symbols()?;
    let features = config.features();
    let mut printable = config.clone();
    if printable.db.url.is_some() {
        printable.db.url = Some("<redacted>".to_string());
    }
    println!("{}", config::to_toml_pretty(&printable)?);
    println!(
        "config ok: symbols={} data_set={} trade_runs={} start_stats={:?}",
        symbols.len(),
        features.data_set,
        features.trade_runs,
        config.start_stats_policy()
    );
    Ok(())
}

pub fn migrate(config: &Config, file: &Path) -> Result<(), String> {
    let sql = fs::read_to_string(file)
        .map_err(|err| format!("failed to read migration {}: {err}", file.display()))?;
    let repo = open_repository(config)?;
    repo.execute_script(&sql)
        .map_err(|err| format!("migration {} failed: {err}", file.display()))?;
    tracing::info!(file = %file.display(), "migration applied");
    Ok(())
}

pub fn export(
    config: &Config,
    symbol: &str,
    data_set_idx: Option<i32>,
    out: &Path,
) -> Result<(), String> {
    let symbol = SymbolId::from_name(symbol).map_err(|err| err.to_string())?;
    let repo = open_repository(config)?;
    let summary = export_data_set(
        &repo,
        &CsvDataSetExporter,
        symbol,
        data_set_idx,
        out,
        config.division_scale(),
    )?;
    print_json(&summary)
}

pub fn once(config: &Config) -> Result<(), String> {
    let repo = open_repository(config)?;
    let summary = process_symbols(config, &repo, &repo, &std::thread::sleep)?;
    print_json(&summary)
}

/// Runs processing cycles every `service.processing_interval_ms` until Ctrl-C or SIGTERM.
pub fn run(config: Config) -> Result<(), String> {
    let repo = Arc::new(open_repository(&config)?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("failed to init tokio runtime: {err}"))?;
    // The pool owns blocking postgres clients; the last handle must be dropped outside the runtime.
    let result = runtime.block_on(run_loop(Arc::new(config), Arc::clone(&repo)));
    drop(runtime);
    drop(repo);
    result
}

async fn run_loop(config: Arc<Config>, repo: Arc<PostgresDataSetRepository>) -> Result<(), String> {
    let interval = Duration::from_millis(config.service.processing_interval_ms);
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown = std::pin::pin!(shutdown_signal());
    let mut cycles: u64 = 0;

    tracing::info!(interval_ms = interval.as_millis() as u64, "depthset service started");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(cycles, "shutdown requested; stopping");
                return Ok(());
            }
            _ = tick.tick() => {}
        }

        let (cycle_config, cycle_repo) = (Arc::clone(&config), Arc::clone(&repo));
        let outcome = run_cycle(move || {
            process_symbols(
                &cycle_config,
                cycle_repo.as_ref(),
                cycle_repo.as_ref(),
                &std::thread::sleep,
            )
        })
        .await?;

        cycles += 1;
        metrics::counter!("depthset.service.cycles_total").increment(1);
        if let Some(summary) = outcome {
            tracing::debug!(
                cycle = cycles,
                records = summary.records_saved(),
                runs = summary.runs_upserted(),
                failures = summary.failures.len(),
                "cycle done"
            );
        }
    }
}

/// Runs one cycle on the blocking pool.
///
/// A panicking cycle is logged and counted, and the service keeps ticking; `None` stands for
/// that cycle. Only an `Err` from the cycle itself (an unusable config) stops the service.
async fn run_cycle<F>(cycle: F) -> Result<Option<CycleSummary>, String>
where
    F: FnOnce() -> Result<CycleSummary, String> + Send + 'static,
{
    match tokio::task::spawn_blocking(cycle).await {
        Ok(result) => result.map(Some),
        Err(err) => {
            metrics::counter!("depthset.service.cycle_panics_total").increment(1);
            tracing::error!(error = %err, "processing cycle panicked; waiting for the next tick");
            Ok(None)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let line = serde_json::to_string(value)
        .map_err(|err| format!("failed to serialize output: {err}"))?;
    println!("{line}");
    Ok(())
}
