//! Application settings loading.
//!
//! Settings come from two places: the `.env` file / process environment
//! (`DATABASE_URL`, `EXPENSE_LEDGER_CONFIG`) and an optional TOML file whose
//! `[ledger]` table tunes the wallet retry policy and default descriptions.
//! A missing TOML file means "use the defaults".

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const CONFIG_PATH_VAR: &str = "EXPENSE_LEDGER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level configuration of an embedding host.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database URL handed to `config::database::create_connection`
    pub database_url: String,
    /// Wallet ledger tuning
    pub ledger: LedgerSettings,
}

/// Structure of the TOML file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    ledger: LedgerSettings,
}

/// Tuning knobs of the wallet ledger.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// How many times a conflicting wallet write is attempted before giving up
    pub max_write_attempts: u32,
    /// Backoff after the first conflict; doubles with every further one
    pub retry_backoff_ms: u64,
    /// Upper bound on a single backoff
    pub max_backoff_ms: u64,
    /// Description stored on deposits entered without one
    pub deposit_description: String,
    /// Description stored on withdrawals entered without one
    pub withdrawal_description: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_write_attempts: 32,
            retry_backoff_ms: 5,
            max_backoff_ms: 250,
            deposit_description: "Added funds".to_string(),
            withdrawal_description: "Withdrawn funds".to_string(),
        }
    }
}

impl LedgerSettings {
    /// Backoff to wait after the given failed attempt (1-based).
    ///
    /// The ceiling doubles per attempt up to `max_backoff_ms`; the wait is
    /// the upper half of that ceiling, offset by `entropy`. Writers that lost
    /// the same round therefore wake at different times instead of colliding
    /// again.
    #[must_use]
    pub fn backoff(&self, attempt: u32, entropy: u64) -> Duration {
        let doublings = attempt.saturating_sub(1).min(20);
        let ceiling = self
            .retry_backoff_ms
            .saturating_mul(1_u64 << doublings)
            .min(self.max_backoff_ms.max(self.retry_backoff_ms));
        let floor = ceiling / 2;
        Duration::from_millis(floor + entropy % (ceiling - floor + 1))
    }

    /// Checks the settings for values the ledger cannot work with.
    ///
    /// # Errors
    /// Returns `Config` for zero write attempts or blank default descriptions.
    pub fn validate(self) -> Result<Self> {
        if self.max_write_attempts == 0 {
            return Err(Error::Config {
                message: "ledger.max_write_attempts must be at least 1".to_string(),
            });
        }
        if self.deposit_description.trim().is_empty()
            || self.withdrawal_description.trim().is_empty()
        {
            return Err(Error::Config {
                message: "ledger default descriptions cannot be empty".to_string(),
            });
        }
        Ok(self)
    }
}

/// Parses ledger settings from TOML text.
pub fn parse_config(contents: &str) -> Result<LedgerSettings> {
    let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse ledger configuration: {e}"),
    })?;
    file.ledger.validate()
}

/// Loads ledger settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML is invalid or a
/// value is out of range.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LedgerSettings> {
    let path = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;
    parse_config(&contents)
}

/// Loads `.env`, then assembles the application configuration.
///
/// The TOML path is taken from `EXPENSE_LEDGER_CONFIG` (default
/// `config.toml`); when that file does not exist the defaults are used.
pub fn load_app_configuration() -> Result<AppConfig> {
    // Non-fatal, env vars can be set externally
    dotenvy::dotenv().ok();

    let config_path =
        std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let ledger = if Path::new(&config_path).exists() {
        load_config(&config_path)?
    } else {
        debug!("No configuration file at {config_path}, using defaults.");
        LedgerSettings::default()
    };

    let database_url = super::database::get_database_url();
    info!(
        max_write_attempts = ledger.max_write_attempts,
        "Ledger configuration loaded."
    );

    Ok(AppConfig {
        database_url,
        ledger,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_ledger_config() {
        let toml_str = r#"
            [ledger]
            max_write_attempts = 3
            retry_backoff_ms = 5
            max_backoff_ms = 40
            deposit_description = "Top up"
        "#;

        let settings = parse_config(toml_str).unwrap();
        assert_eq!(settings.max_write_attempts, 3);
        assert_eq!(settings.retry_backoff_ms, 5);
        assert_eq!(settings.max_backoff_ms, 40);
        assert_eq!(settings.deposit_description, "Top up");
        // Unset keys keep their defaults
        assert_eq!(settings.withdrawal_description, "Withdrawn funds");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings = parse_config("").unwrap();
        assert_eq!(settings, LedgerSettings::default());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = parse_config("[ledger]\nmax_write_attempts = 0\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = parse_config("[ledger\nmax_write_attempts = ");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_config("/nonexistent/expense-ledger.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let settings = LedgerSettings {
            retry_backoff_ms: 10,
            max_backoff_ms: 100,
            ..LedgerSettings::default()
        };
        // Zero entropy gives the lower bound, half the ceiling
        assert_eq!(settings.backoff(1, 0), Duration::from_millis(5));
        assert_eq!(settings.backoff(3, 0), Duration::from_millis(20));
        assert_eq!(settings.backoff(30, 0), Duration::from_millis(50));
        assert_eq!(settings.backoff(u32::MAX, 0), Duration::from_millis(50));

        // Entropy spreads the wait over the upper half of the ceiling
        assert_eq!(settings.backoff(3, 20), Duration::from_millis(40));
        assert_eq!(settings.backoff(3, 21), Duration::from_millis(20));
        for entropy in 0..500 {
            let wait = settings.backoff(4, entropy);
            assert!(wait >= Duration::from_millis(40) && wait <= Duration::from_millis(80));
        }
    }

    #[test]
    fn test_default_retry_budget_covers_contention() {
        let settings = LedgerSettings::default();
        assert!(settings.max_write_attempts >= 32);
        let worst: Duration = (1..settings.max_write_attempts)
            .map(|attempt| settings.backoff(attempt, u64::MAX))
            .sum();
        assert!(worst < Duration::from_secs(10));
    }
}
