use crate::config::Config;
use crate::data_set::{save_data_set, DataSetCycleReport};
use crate::errors::CycleError;
use crate::trade_runs::{save_trade_runs, TradeRunCycleReport};
use depthset_domain::repositories::data_set::DataSetRepository;
use depthset_domain::repositories::trade_runs::TradeRunRepository;
use depthset_domain::services::data_set_calculator::DataSetCalculator;
use depthset_domain::value_objects::symbol::SymbolId;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info_span;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolFailure {
    pub symbol: SymbolId,
    pub family: &'static str,
    pub kind: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub data_sets: Vec<DataSetCycleReport>,
    pub trade_runs: Vec<TradeRunCycleReport>,
    pub failures: Vec<SymbolFailure>,
}

impl CycleSummary {
    pub fn records_saved(&self) -> usize {
        self.data_sets.iter().map(|report| report.records_saved).sum()
    }

    pub fn runs_upserted(&self) -> usize {
        self.trade_runs.iter().map(|report| report.runs_upserted).sum()
    }
}

/// Runs one processing cycle over every configured symbol and enabled aggregate family.
///
/// A failing symbol never aborts the cycle: storage errors are retried up to
/// `service.max_retries` times with linear backoff (`sleep` is called between attempts), then
/// the failure is logged and recorded in the summary. Only an invalid configuration is an `Err`.
pub fn process_symbols(
    config: &Config,
    data_sets: &dyn DataSetRepository,
    trade_runs: &dyn TradeRunRepository,
    sleep: &dyn Fn(Duration),
) -> Result<CycleSummary, String> {
    let symbols = config.symbols()?;
    let features = config.features();
    let calculator = DataSetCalculator::new(config.start_stats_policy());
    let retry = RetryPolicy {
        max_retries: config.service.max_retries,
        backoff_ms: config.retry_backoff_ms(),
    };

    let _span = info_span!("processing.cycle", symbols = symbols.len()).entered();
    let cycle_start = Instant::now();
    let mut summary = CycleSummary::default();

    for symbol in symbols {
        if features.data_set {
            match retry.run(symbol, "data_set", sleep, || {
                save_data_set(data_sets, &calculator, symbol)
            }) {
                Ok(report) => summary.data_sets.push(report),
                Err(err) => summary.failures.push(failure(symbol, "data_set", &err)),
            }
        }
        if features.trade_runs {
            let batch_size = config.trade_runs_batch_size();
            match retry.run(symbol, "trade_runs", sleep, || {
                save_trade_runs(trade_runs, symbol, batch_size)
            }) {
                Ok(report) => summary.trade_runs.push(report),
                Err(err) => summary.failures.push(failure(symbol, "trade_runs", &err)),
            }
        }
    }

    metrics::histogram!("depthset.processing.cycle_ms")
        .record(cycle_start.elapsed().as_millis() as f64);
    metrics::gauge!("depthset.processing.failed_symbols").set(summary.failures.len() as f64);
    tracing::info!(
        records = summary.records_saved(),
        runs = summary.runs_upserted(),
        failures = summary.failures.len(),
        "processing cycle finished"
    );

    Ok(summary)
}

fn failure(symbol: SymbolId, family: &'static str, err: &CycleError) -> SymbolFailure {
    tracing::error!(%symbol, family, kind = err.kind(), error = %err, "symbol cycle failed; skipping");
    metrics::counter!("depthset.processing.failures_total", "family" => family, "kind" => err.kind())
        .increment(1);
    SymbolFailure {
        symbol,
        family,
        kind: err.kind(),
        error: err.to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    backoff_ms: u64,
}

impl RetryPolicy {
    fn run<T>(
        &self,
        symbol: SymbolId,
        family: &'static str,
        sleep: &dyn Fn(Duration),
        mut op: impl FnMut() -> Result<T, CycleError>,
    ) -> Result<T, CycleError> {
        let mut attempt: u32 = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt)));
                    tracing::warn!(
                        %symbol,
                        family,
                        attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying after storage error"
                    );
                    metrics::counter!("depthset.processing.retries_total", "family" => family)
                        .increment(1);
                    sleep(backoff);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
