/// Database connection and schema provisioning
pub mod database;

/// Ledger settings loading from config.toml and the environment
pub mod settings;

pub use settings::{AppConfig, LedgerSettings, load_app_configuration, load_config};
