use std::path::Path;

use crate::errors::ConfigError;

use super::types::{AppConfig, OracleConfig};

const DEFAULT_CONFIG_FILE: &str = "ctvp.toml";

/// Reads `ctvp.toml` from the working directory if present, otherwise
/// defaults, then applies `CTVP_*` environment overrides.
pub fn load_default() -> Result<AppConfig, ConfigError> {
    let mut cfg = if Path::new(DEFAULT_CONFIG_FILE).exists() {
        read_file(Path::new(DEFAULT_CONFIG_FILE))?
    } else {
        AppConfig::default()
    };
    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    let mut cfg = read_file(path)?;
    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

pub fn parse_str(s: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str::<AppConfig>(s).map_err(|e| ConfigError::Parse(e.into()))
}

fn read_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse(e.into()))?;
    parse_str(&s)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_value(key) {
        Some(v) => v.trim().parse::<T>().map(Some).map_err(|e| ConfigError::EnvInvalid {
            key: key.to_string(),
            source: e.into(),
        }),
        None => Ok(None),
    }
}

pub fn apply_env_overrides(cfg: &mut AppConfig) -> Result<(), ConfigError> {
    if let Some(v) = env_parse::<bool>("CTVP_ENABLED")? {
        cfg.enabled = v;
    }
    if let Some(v) = env_parse::<u64>("CTVP_TIMEOUT_MS")? {
        cfg.timeout_ms = v;
    }
    if let Some(v) = env_value("CTVP_THRESHOLD_STATE_PATH") {
        cfg.threshold.state_path = v;
    }

    if let OracleConfig::Http(ref mut http) = cfg.oracle {
        if let Some(v) = env_value("CTVP_ORACLE_URL") {
            http.base_url = v;
        }
        if let Some(v) = env_value("CTVP_ORACLE_API_KEY") {
            http.api_key = v;
        }
        if let Some(v) = env_value("CTVP_ORACLE_MODEL") {
            http.model = v;
        }
    }

    Ok(())
}
