use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    AnalyticsSettings, CacheSettings, LoggingSettings, ProviderSettings, ProviderSource,
    RetrySettings, ServerSettings, Settings,
};

/// Default file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
/// Prefix of environment overrides, e.g. `CORRELATION__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "CORRELATION";

/// Loads the application configuration.
///
/// Sources, lowest priority first: built-in defaults, the TOML file (required
/// only when a path is given explicitly), then `CORRELATION__*` environment
/// variables. The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

    finish(builder)
}

fn finish(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<Settings, ConfigError> {
    let settings = builder.build()?.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn from_toml(raw: &str) -> Result<Settings, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml));
        finish(builder)
    }

    #[test]
    fn shipped_config_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config.toml");
        let settings: Settings = load_config(Some(&path)).unwrap();
        assert_eq!(settings.provider.request_timeout, Duration::from_secs(20));
        assert_eq!(settings.cache.coin_list_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let settings = from_toml("").unwrap();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.analytics.allowed_days, vec![7, 30, 90]);
        assert_eq!(settings.analytics.benchmark, "bitcoin");
        assert_eq!(settings.provider.retry.max_retries, 4);
        assert_eq!(settings.cache.result_ttl, Duration::from_secs(600));
        assert_eq!(
            settings.provider.sources,
            vec![
                ProviderSource::Binance,
                ProviderSource::CoinGecko,
                ProviderSource::Bitget
            ]
        );
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let settings = from_toml(
            r#"
            [provider]
            sources = ["coingecko"]
            request_timeout = "5s"

            [provider.retry]
            initial_backoff = "250ms"

            [cache]
            result_ttl = "1h"
            "#,
        )
        .unwrap();

        assert_eq!(settings.provider.sources, vec![ProviderSource::CoinGecko]);
        assert_eq!(settings.provider.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.provider.retry.initial_backoff, Duration::from_millis(250));
        assert_eq!(settings.provider.retry.max_retries, 4);
        assert_eq!(settings.cache.result_ttl, Duration::from_secs(3600));
        assert_eq!(settings.cache.max_entries, 256);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let err = from_toml("[analytics]\nbenchmark = \"not a coin!\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = from_toml("[provider]\nsources = []").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = from_toml("[analytics]\nallowed_days = [7, 90]").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }
}
