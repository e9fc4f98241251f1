use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordination::SchedulerConfig;
use crate::persistence::SinkConfig;

/// Main configuration structure
///
/// Every section falls back to its `Default` when absent, so an empty
/// config directory yields the built-in pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub markets: MarketsConfig,
    #[serde(default)]
    pub sheet: SheetConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Records generated per cycle, shared across markets
    pub total_per_cycle: usize,
    /// Pause between cycles in seconds
    pub cycle_delay_secs: u64,
    /// Rows annotated between rate-limit pauses
    pub rate_limit_batch_size: usize,
    pub rate_limit_pause_ms: u64,
    /// Pause between the bulk append and annotation
    pub post_append_pause_ms: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            total_per_cycle: 60,
            cycle_delay_secs: 5,
            rate_limit_batch_size: 10,
            rate_limit_pause_ms: 1000,
            post_append_pause_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketsConfig {
    /// JSON file maintained by the market configuration service
    pub path: PathBuf,
}

impl Default for MarketsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("db.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Target spreadsheet; required unless running dry
    pub spreadsheet_id: Option<String>,
    /// Worksheet holding the log
    pub sheet_name: String,
    pub api_base_url: String,
    /// Environment variable carrying the OAuth access token
    pub access_token_env: String,
    /// File holding the access token, re-read before every request so an
    /// external refresher can rotate it; takes precedence over the env var
    pub access_token_file: Option<PathBuf>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            sheet_name: "logs".to_string(),
            api_base_url: "https://sheets.googleapis.com/v4".to_string(),
            access_token_env: "GOOGLE_SHEETS_ACCESS_TOKEN".to_string(),
            access_token_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON formatted logs
    pub json: bool,
    /// Directory for daily rotated log files
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific file, e.g. config/production.toml
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TLOG_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // TLOG_SHEET__SPREADSHEET_ID, TLOG_LOGGER__TOTAL_PER_CYCLE, ...
            .add_source(
                Environment::with_prefix("TLOG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values; `dry_run` skips the sheet checks
    pub fn validate(&self, dry_run: bool) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.logger.total_per_cycle == 0 {
            errors.push("logger.total_per_cycle must be positive".to_string());
        }

        if self.logger.rate_limit_batch_size == 0 {
            errors.push("logger.rate_limit_batch_size must be positive".to_string());
        }

        if !dry_run {
            let missing_id = self
                .sheet
                .spreadsheet_id
                .as_deref()
                .map_or(true, |id| id.trim().is_empty());
            if missing_id {
                errors.push("sheet.spreadsheet_id is required unless --dry-run".to_string());
            }

            if self.sheet.sheet_name.trim().is_empty() {
                errors.push("sheet.sheet_name must not be empty".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn scheduler_config(&self, max_cycles: Option<u64>) -> SchedulerConfig {
        SchedulerConfig {
            total_per_cycle: self.logger.total_per_cycle,
            cycle_delay: Duration::from_secs(self.logger.cycle_delay_secs),
            max_cycles,
        }
    }

    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            rate_limit_batch_size: self.logger.rate_limit_batch_size,
            rate_limit_pause: Duration::from_millis(self.logger.rate_limit_pause_ms),
            post_append_pause: Duration::from_millis(self.logger.post_append_pause_ms),
        }
    }
}
