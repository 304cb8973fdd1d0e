//! Lookup configuration, read from the environment.

use anyhow::{Context, anyhow};
use tracing::warn;

use taxrecon_observability::LogFormat;
use taxrecon_taxes::SourceType;

pub const ENV_DEFAULT_PROVIDER: &str = "TAXRECON_DEFAULT_PROVIDER";
pub const ENV_PERSIST_NEW_TAXES: &str = "TAXRECON_PERSIST_NEW_TAXES";
pub const ENV_LOG_FORMAT: &str = "TAXRECON_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupConfig {
    /// Provider used when a lookup does not name one.
    pub default_provider: SourceType,
    /// Store rates that matched no persisted tax, so the next lookup reuses them.
    pub persist_new_taxes: bool,
    pub log_format: LogFormat,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            default_provider: SourceType::Avalara,
            persist_new_taxes: true,
            log_format: LogFormat::Json,
        }
    }
}

impl LookupConfig {
    /// Read from process environment, falling back to defaults on bad values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Lenient variant of [`LookupConfig::try_from_lookup`]: each invalid value is
    /// logged and replaced by its default.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut config = defaults;

        if let Some(raw) = get(ENV_DEFAULT_PROVIDER) {
            match parse_provider(&raw) {
                Ok(provider) => config.default_provider = provider,
                Err(e) => warn!(error = %e, "{ENV_DEFAULT_PROVIDER} invalid; using {}", defaults.default_provider),
            }
        }
        if let Some(raw) = get(ENV_PERSIST_NEW_TAXES) {
            match parse_flag(&raw) {
                Ok(flag) => config.persist_new_taxes = flag,
                Err(e) => warn!(error = %e, "{ENV_PERSIST_NEW_TAXES} invalid; using {}", defaults.persist_new_taxes),
            }
        }
        if let Some(raw) = get(ENV_LOG_FORMAT) {
            match parse_log_format(&raw) {
                Ok(format) => config.log_format = format,
                Err(e) => warn!(error = %e, "{ENV_LOG_FORMAT} invalid; using json"),
            }
        }

        config
    }

    /// Strict variant: the first invalid value is an error.
    pub fn try_from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = get(ENV_DEFAULT_PROVIDER) {
            config.default_provider = parse_provider(&raw).context(ENV_DEFAULT_PROVIDER)?;
        }
        if let Some(raw) = get(ENV_PERSIST_NEW_TAXES) {
            config.persist_new_taxes = parse_flag(&raw).context(ENV_PERSIST_NEW_TAXES)?;
        }
        if let Some(raw) = get(ENV_LOG_FORMAT) {
            config.log_format = parse_log_format(&raw).context(ENV_LOG_FORMAT)?;
        }

        Ok(config)
    }
}

fn parse_provider(raw: &str) -> anyhow::Result<SourceType> {
    Ok(SourceType::parse(raw)?)
}

fn parse_flag(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("expected a boolean, got {other:?}")),
    }
}

fn parse_log_format(raw: &str) -> anyhow::Result<LogFormat> {
    LogFormat::parse(raw).ok_or_else(|| anyhow!("expected json or pretty, got {:?}", raw.trim()))
}
