/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Database defaults
pub const DEFAULT_DATABASE_DSN: &str = "sqlite://./brick.db";
pub const DEFAULT_POOL_SIZE: u32 = 15;
pub const DEFAULT_MIGRATIONS_PATH: &str = "dbmigrations";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

// Config file defaults
pub const DEFAULT_CONFIG_FILE: &str = "brick.toml";
pub const CONFIG_FILE_ENV: &str = "BRICK_CONFIG";
pub const ENV_PREFIX: &str = "BRICK_";

// Logging defaults
pub const DEFAULT_LOG_LEVEL: &str = "info";
