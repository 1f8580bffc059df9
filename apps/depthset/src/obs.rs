use depthset_application::config::{LogFormat, LoggingConfig};
use std::net::SocketAddr;

/// `DEPTHSET_LOG` wins over the configured level so a single run can be made verbose.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    let filter = std::env::var("DEPTHSET_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    match logging.format.unwrap_or_default() {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init(),
    }
    Ok(())
}

#[cfg(feature = "prometheus")]
pub fn init_metrics(metrics_addr: Option<&str>) -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(raw) = metrics_addr.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .parse()
        .map_err(|err| format!("invalid --metrics-addr (expected host:port): {err}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(metrics_addr: Option<&str>) -> Result<Option<SocketAddr>, String> {
    if metrics_addr.is_some() {
        return Err("metrics exporter requires depthset feature `prometheus`".to_string());
    }
    Ok(None)
}
