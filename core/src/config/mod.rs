//! Application configuration management

pub mod app_config;
pub mod migration;

pub use app_config::{AppConfig, AuthConfig, MonitoringConfig, ServerConfig, SyncConfig};
pub use migration::Migrate;
