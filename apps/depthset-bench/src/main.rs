use clap::{Parser, ValueEnum};
use depthset_application::benchmarking::{run_bench, BenchSummary};
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "depthset-bench")]
#[command(about = "Times the data set calculator on a synthetic order book (dev)")]
struct Args {
    /// Book updates generated after the initial snapshot.
    #[arg(long, default_value_t = 200_000)]
    updates: usize,

    /// Trades spread evenly over the update span.
    #[arg(long, default_value_t = 400_000)]
    trades: usize,

    #[arg(long, value_enum, default_value_t = ModeArg::Calculate)]
    mode: ModeArg,

    /// Print the report as one JSON line.
    #[arg(long)]
    json: bool,

    /// Serve Prometheus metrics on host:port while the bench runs.
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,

    /// Write an SVG flamegraph of the run (feature `pprof`).
    #[arg(long)]
    profile_svg: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Full data set calculation, trade windows included.
    Calculate,
    /// Book replay and side statistics only.
    Book,
}

impl ModeArg {
    fn as_str(self) -> &'static str {
        match self {
            ModeArg::Calculate => "calculate",
            ModeArg::Book => "book",
        }
    }
}

fn main() {
    let args = Args::parse();
    if let Err(err) = execute(&args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn execute(args: &Args) -> Result<(), String> {
    init_observability(args.metrics_addr)?;

    let profiler = Profiler::start(args.profile_svg.as_deref())?;
    let summary = run_bench(args.updates, args.trades, args.mode.as_str())?;
    profiler.finish()?;

    let report = BenchReport::from(&summary);
    report.record_metrics();
    if args.json {
        let line = serde_json::to_string(&report)
            .map_err(|err| format!("failed to serialize report: {err}"))?;
        println!("{line}");
    } else {
        println!("{report}");
    }
    Ok(())
}

/// Logs go to stderr so `--json` output stays machine readable. `DEPTHSET_LOG` sets the filter.
fn init_observability(metrics_addr: Option<SocketAddr>) -> Result<(), String> {
    let filter = match std::env::var("DEPTHSET_LOG") {
        Ok(raw) => EnvFilter::try_new(&raw).map_err(|err| format!("invalid DEPTHSET_LOG: {err}"))?,
        Err(_) => EnvFilter::new("info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match metrics_addr {
        None => Ok(()),
        Some(addr) => install_prometheus(addr),
    }
}

#[cfg(feature = "prometheus")]
fn install_prometheus(addr: SocketAddr) -> Result<(), String> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;
    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(())
}

#[cfg(not(feature = "prometheus"))]
fn install_prometheus(_addr: SocketAddr) -> Result<(), String> {
    Err("--metrics-addr needs depthset-bench feature `prometheus`".to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct BenchReport {
    mode: &'static str,
    updates_requested: usize,
    trades_requested: usize,
    events_processed: u64,
    records: usize,
    elapsed_ms: u64,
    events_per_sec: f64,
}

impl From<&BenchSummary> for BenchReport {
    fn from(summary: &BenchSummary) -> Self {
        Self {
            mode: summary.mode.as_str(),
            updates_requested: summary.updates_requested,
            trades_requested: summary.trades_requested,
            events_processed: summary.events_processed,
            records: summary.records,
            elapsed_ms: summary.elapsed_ms,
            events_per_sec: summary.events_per_sec,
        }
    }
}

impl BenchReport {
    fn record_metrics(&self) {
        let mode = self.mode;
        metrics::histogram!("depthset.bench.elapsed_ms", "mode" => mode)
            .record(self.elapsed_ms as f64);
        metrics::gauge!("depthset.bench.events_per_sec", "mode" => mode).set(self.events_per_sec);
        metrics::gauge!("depthset.bench.records", "mode" => mode).set(self.records as f64);
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bench: mode={} events={} records={} elapsed_ms={} events_per_sec={:.2}",
            self.mode, self.events_processed, self.records, self.elapsed_ms, self.events_per_sec
        )
    }
}

/// CPU sampling for the duration of the bench; a no-op without `--profile-svg`.
struct Profiler {
    #[cfg(feature = "pprof")]
    active: Option<(pprof::ProfilerGuard<'static>, PathBuf)>,
}

impl Profiler {
    #[cfg(feature = "pprof")]
    fn start(svg: Option<&Path>) -> Result<Self, String> {
        let Some(path) = svg else {
            return Ok(Self { active: None });
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|err| format!("failed to create {}: {err}", parent.display()))?;
        }
        let guard = pprof::ProfilerGuard::new(100)
            .map_err(|err| format!("failed to start profiler: {err}"))?;
        Ok(Self {
            active: Some((guard, path.to_path_buf())),
        })
    }

    #[cfg(not(feature = "pprof"))]
    fn start(svg: Option<&Path>) -> Result<Self, String> {
        match svg {
            Some(_) => Err("--profile-svg needs depthset-bench feature `pprof`".to_string()),
            None => Ok(Self {}),
        }
    }

    #[cfg(feature = "pprof")]
    fn finish(self) -> Result<(), String> {
        let Some((guard, path)) = self.active else {
            return Ok(());
        };
        let report = guard
            .report()
            .build()
            .map_err(|err| format!("failed to build profile report: {err}"))?;
        let file = std::fs::File::create(&path)
            .map_err(|err| format!("failed to create {}: {err}", path.display()))?;
        report
            .flamegraph(file)
            .map_err(|err| format!("failed to write flamegraph: {err}"))?;
        tracing::info!(profile_svg = %path.display(), "wrote cpu profile flamegraph");
        Ok(())
    }

    #[cfg(not(feature = "pprof"))]
    fn finish(self) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> BenchReport {
        BenchReport {
            mode: "calculate",
            updates_requested: 100,
            trades_requested: 50,
            events_processed: 101,
            records: 42,
            elapsed_ms: 7,
            events_per_sec: 14428.571,
        }
    }

    #[test]
    fn json_report_keeps_field_names() {
        let value = serde_json::to_value(report()).unwrap();
        assert_eq!(value["mode"], "calculate");
        assert_eq!(value["events_processed"], 101);
        assert_eq!(value["records"], 42);
        assert_eq!(value.as_object().unwrap().len(), 7);
    }

    #[test]
    fn human_report_is_one_line() {
        assert_eq!(
            report().to_string(),
            "bench: mode=calculate events=101 records=42 elapsed_ms=7 events_per_sec=14428.57"
        );
    }

    #[test]
    fn cli_modes_map_to_bench_modes() {
        let args = Args::try_parse_from(["depthset-bench", "--mode", "book", "--updates", "10"])
            .unwrap();
        assert_eq!(args.mode, ModeArg::Book);
        assert_eq!(args.updates, 10);
        assert!(Args::try_parse_from(["depthset-bench", "--mode", "stream"]).is_err());
        assert!(Args::try_parse_from(["depthset-bench", "--metrics-addr", "nope"]).is_err());

        let summary = run_bench(args.updates, 0, args.mode.as_str()).unwrap();
        assert_eq!(BenchReport::from(&summary).mode, "book");
    }
}
