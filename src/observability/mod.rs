//! Tracing subscriber setup for binaries embedding the facade

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Filter used when `RUST_LOG` is not set
///
/// sqlx statement logs stay at `warn` unless the configured level asks for
/// more; `database.debug` raises them to `info` through SeaORM instead.
pub fn default_filter(logging: &LoggingConfig) -> String {
    format!("{level},sqlx=warn,sea_orm={level}", level = logging.level)
}

/// Install the global subscriber; `RUST_LOG` overrides the configured level
pub fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(logging)))?;

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_uses_configured_level() {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            json: false,
        };
        let filter = default_filter(&logging);
        assert_eq!(filter, "debug,sqlx=warn,sea_orm=debug");
        assert!(EnvFilter::try_new(filter).is_ok());
    }
}
