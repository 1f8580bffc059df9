use depthset_domain::services::data_set_calculator::StartStatsPolicy;
use depthset_domain::value_objects::decimal::MAX_SCALE;
use depthset_domain::value_objects::symbol::SymbolId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use depthset_domain::value_objects::decimal::DEFAULT_DIVISION_SCALE;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub service: ServiceConfig,
    pub db: DbConfig,
    pub calculator: Option<CalculatorConfig>,
    pub features: Option<FeaturesConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub symbols: Vec<String>,
    pub processing_interval_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DbConfig {
    pub url: Option<String>,
    pub pool_max_size: Option<u32>,
    #[serde(default = "default_records_table")]
    pub records_table: String,
    #[serde(default = "default_trade_runs_table")]
    pub trade_runs_table: String,
    #[serde(default = "default_order_books_table")]
    pub order_books_table: String,
    #[serde(default = "default_trades_table")]
    pub trades_table: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct CalculatorConfig {
    pub start_stats: Option<StartStatsPolicy>,
    pub division_scale: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FeaturesConfig {
    pub data_set: bool,
    pub trade_runs: bool,
    pub trade_runs_batch_size: Option<usize>,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            data_set: true,
            trade_runs: false,
            trade_runs_batch_size: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: Option<LogFormat>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
        }
    }
}

pub const DEFAULT_TRADE_RUNS_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1_000;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn default_records_table() -> String {
    "okx_data_set_record_data".to_string()
}

fn default_trade_runs_table() -> String {
    "okx_data_set_record_data_2".to_string()
}

fn default_order_books_table() -> String {
    "okx_order_book_data_2".to_string()
}

fn default_trades_table() -> String {
    "okx_trade_data_2".to_string()
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        self.symbols()?;
        if self.service.processing_interval_ms == 0 {
            return Err("service.processing_interval_ms must be > 0".to_string());
        }

        for (key, table) in [
            ("db.records_table", &self.db.records_table),
            ("db.trade_runs_table", &self.db.trade_runs_table),
            ("db.order_books_table", &self.db.order_books_table),
            ("db.trades_table", &self.db.trades_table),
        ] {
            validate_identifier(table).map_err(|err| format!("{key}: {err}"))?;
        }
        if self.db.pool_max_size == Some(0) {
            return Err("db.pool_max_size must be > 0".to_string());
        }

        let scale = self.division_scale();
        if scale > MAX_SCALE {
            return Err(format!(
                "calculator.division_scale must be <= {MAX_SCALE} (got {scale})"
            ));
        }
        if self.trade_runs_batch_size() == 0 {
            return Err("features.trade_runs_batch_size must be > 0".to_string());
        }

        let features = self.features();
        if !features.data_set && !features.trade_runs {
            return Err("at least one of features.data_set / features.trade_runs must be enabled"
                .to_string());
        }

        let level = self.logging().level.trim().to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(format!(
                "logging.level must be one of {} (got {})",
                LOG_LEVELS.join(", "),
                self.logging().level
            ));
        }
        Ok(())
    }

    pub fn symbols(&self) -> Result<Vec<SymbolId>, String> {
        if self.service.symbols.is_empty() {
            return Err("service.symbols must not be empty".to_string());
        }
        self.service
            .symbols
            .iter()
            .map(|raw| SymbolId::from_name(raw).map_err(|err| format!("service.symbols: {err}")))
            .collect()
    }

    pub fn start_stats_policy(&self) -> StartStatsPolicy {
        self.calculator
            .as_ref()
            .and_then(|calc| calc.start_stats)
            .unwrap_or_default()
    }

    pub fn division_scale(&self) -> u32 {
        self.calculator
            .as_ref()
            .and_then(|calc| calc.division_scale)
            .unwrap_or(DEFAULT_DIVISION_SCALE)
    }

    pub fn features(&self) -> FeaturesConfig {
        self.features.clone().unwrap_or_default()
    }

    pub fn trade_runs_batch_size(&self) -> usize {
        self.features
            .as_ref()
            .and_then(|features| features.trade_runs_batch_size)
            .unwrap_or(DEFAULT_TRADE_RUNS_BATCH_SIZE)
    }

    pub fn retry_backoff_ms(&self) -> u64 {
        self.service
            .retry_backoff_ms
            .unwrap_or(DEFAULT_RETRY_BACKOFF_MS)
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

/// Table names are interpolated into SQL, so only plain identifiers (optionally schema-qualified)
/// are accepted.
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("table name must not be empty".to_string());
    }
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| valid_part(part)) {
        return Err(format!("invalid table name: {name}"));
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let (config, _source) = load_config_with_source(path)?;
    Ok(config)
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    config
        .validate()
        .map_err(|err| format!("invalid config {}: {err}", path.display()))?;
    Ok((config, contents))
}

pub fn to_toml_pretty(config: &Config) -> Result<String, String> {
    toml::to_string_pretty(config)
        .map_err(|err| format!("failed to serialize config as TOML: {err}"))
}
