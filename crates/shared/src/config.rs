//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Receivable engine defaults.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Snapshot storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Unit used to space installment due dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    /// Fixed number of days.
    Days,
    /// Calendar months.
    Months,
}

/// Receivable engine defaults applied when a sale omits payment terms.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Days after the sale date when an unscheduled receivable falls due.
    #[serde(default = "default_due_days")]
    pub default_due_days: u32,
    /// Unit for the spacing between installments.
    #[serde(default = "default_interval_unit")]
    pub default_interval_unit: IntervalUnit,
    /// Number of units between consecutive installments.
    #[serde(default = "default_interval_every")]
    pub default_interval_every: u32,
    /// Largest installment count a sale may request.
    #[serde(default = "default_max_installments")]
    pub max_installments: u32,
}

fn default_due_days() -> u32 {
    30
}

fn default_interval_unit() -> IntervalUnit {
    IntervalUnit::Months
}

fn default_interval_every() -> u32 {
    1
}

fn default_max_installments() -> u32 {
    120
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_due_days: default_due_days(),
            default_interval_unit: default_interval_unit(),
            default_interval_every: default_interval_every(),
            max_installments: default_max_installments(),
        }
    }
}

/// Snapshot storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path of the JSON snapshot file.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

fn default_snapshot_path() -> String {
    "tally.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones win: `config/default`, `config/{RUN_MODE}`,
    /// then `TALLY__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("TALLY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.engine.default_due_days, 30);
        assert_eq!(config.engine.default_interval_unit, IntervalUnit::Months);
        assert_eq!(config.engine.default_interval_every, 1);
        assert_eq!(config.engine.max_installments, 120);
        assert_eq!(config.storage.snapshot_path, "tally.json");
    }

    #[test]
    fn test_load_without_sources_uses_defaults() {
        temp_env::with_vars_unset(
            [
                "TALLY__ENGINE__DEFAULT_DUE_DAYS",
                "TALLY__ENGINE__DEFAULT_INTERVAL_UNIT",
                "TALLY__ENGINE__MAX_INSTALLMENTS",
                "TALLY__STORAGE__SNAPSHOT_PATH",
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.engine.default_due_days, 30);
                assert_eq!(config.storage.snapshot_path, "tally.json");
            },
        );
    }

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("TALLY__ENGINE__DEFAULT_DUE_DAYS", Some("45")),
                ("TALLY__ENGINE__DEFAULT_INTERVAL_UNIT", Some("days")),
                ("TALLY__ENGINE__MAX_INSTALLMENTS", Some("24")),
                ("TALLY__STORAGE__SNAPSHOT_PATH", Some("/tmp/ledger.json")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.engine.default_due_days, 45);
                assert_eq!(config.engine.default_interval_unit, IntervalUnit::Days);
                assert_eq!(config.engine.max_installments, 24);
                assert_eq!(config.storage.snapshot_path, "/tmp/ledger.json");
            },
        );
    }
}
