//! Config loader: reads `~/.conduit/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.conduit/config.json`
//! 3. Environment variables `CONDUIT_<SECTION>__<FIELD>` (override JSON)
//! 4. `GEMINI_API_KEY`, only when no API key was configured otherwise

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to deserialize config: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `CONDUIT_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `CONDUIT_AGENT__MODEL` → `agent.model`
/// - `CONDUIT_AGENT__SYSTEM_INSTRUCTION` → `agent.system_instruction`
/// - `CONDUIT_MODEL__API_KEY` → `model.api_key`
/// - `CONDUIT_MODEL__API_BASE` → `model.api_base`
/// - `CONDUIT_GATEWAY__HOST` → `gateway.host`
/// - `CONDUIT_GATEWAY__PORT` → `gateway.port`
/// - `CONDUIT_GATEWAY__STATIC_DIR` → `gateway.static_dir`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("CONDUIT_AGENT__MODEL") {
        config.agent.model = val;
    }
    if let Ok(val) = std::env::var("CONDUIT_AGENT__SYSTEM_INSTRUCTION") {
        config.agent.system_instruction = val;
    }

    if let Ok(val) = std::env::var("CONDUIT_MODEL__API_KEY") {
        config.model.api_key = val;
    }
    if let Ok(val) = std::env::var("CONDUIT_MODEL__API_BASE") {
        config.model.api_base = Some(val);
    }
    if !config.model.is_configured() {
        if let Ok(val) = std::env::var("GEMINI_API_KEY") {
            config.model.api_key = val;
        }
    }

    if let Ok(val) = std::env::var("CONDUIT_GATEWAY__HOST") {
        config.gateway.host = val;
    }
    if let Ok(val) = std::env::var("CONDUIT_GATEWAY__PORT") {
        match val.parse::<u16>() {
            Ok(p) => config.gateway.port = p,
            Err(_) => warn!("Ignoring invalid CONDUIT_GATEWAY__PORT: {}", val),
        }
    }
    if let Ok(val) = std::env::var("CONDUIT_GATEWAY__STATIC_DIR") {
        config.gateway.static_dir = val;
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
