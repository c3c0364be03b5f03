#![forbid(unsafe_code)]

//! Runtime settings for the audio mirroring tools.
//!
//! Values are resolved with a fixed precedence: explicit overrides (usually
//! CLI flags) win over process environment variables, which win over the
//! `.env` file, which wins over the built-in defaults. Only `DATA_ROOT` has
//! no default because it decides where downloads land on disk.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_CHANNEL_API: &str = "https://backendmix-emergeny.vercel.app/list";
pub const DEFAULT_COBALT_API: &str = "https://cobalt-api.kwiatekmiki.com";
pub const DEFAULT_CHANNEL_ID: &str = "UCEEi1lDCkKi1ukmTAgc9-zA";
pub const DEFAULT_FILE_BASE_URL: &str = "https://sioyt.netlify.app/sio/";

/// Prefix that wraps the conversion endpoint in a CORS proxy. Some
/// deployments are only reachable through it.
pub const CORS_PROXY_PREFIX: &str = "https://api.allorigins.win/raw?url=";

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub data_root: PathBuf,
    pub channel_api: String,
    pub cobalt_api: String,
    pub channel_id: String,
    pub file_base_url: String,
}

pub fn load_runtime_settings() -> Result<RuntimeSettings> {
    resolve_runtime_settings(SettingsOverrides::default())
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub data_root: Option<PathBuf>,
    pub channel_api: Option<String>,
    pub cobalt_api: Option<String>,
    pub channel_id: Option<String>,
    pub file_base_url: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_settings(overrides: SettingsOverrides) -> Result<RuntimeSettings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_runtime_settings(&file_vars, env_var_string, overrides)
}

fn build_runtime_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Result<RuntimeSettings> {
    let data_root = overrides
        .data_root
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("DATA_ROOT", file_vars, &env_lookup))
        .ok_or_else(|| anyhow!("DATA_ROOT not set"))?;
    let channel_api = resolve_string(
        overrides.channel_api,
        "CHANNEL_API",
        DEFAULT_CHANNEL_API,
        file_vars,
        &env_lookup,
    );
    let cobalt_api = resolve_string(
        overrides.cobalt_api,
        "COBALT_API",
        DEFAULT_COBALT_API,
        file_vars,
        &env_lookup,
    );
    let channel_id = resolve_string(
        overrides.channel_id,
        "CHANNEL_ID",
        DEFAULT_CHANNEL_ID,
        file_vars,
        &env_lookup,
    );
    let file_base_url = resolve_string(
        overrides.file_base_url,
        "FILE_BASE_URL",
        DEFAULT_FILE_BASE_URL,
        file_vars,
        &env_lookup,
    );

    Ok(RuntimeSettings {
        data_root: PathBuf::from(data_root),
        channel_api,
        cobalt_api,
        channel_id,
        file_base_url,
    })
}

fn resolve_string(
    override_value: Option<String>,
    key: &str,
    default: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> String {
    override_value
        .and_then(|value| {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        })
        .or_else(|| lookup_value(key, file_vars, env_lookup))
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

/// Parses a `.env`-style file. Missing files are treated as empty so a bare
/// checkout works with environment variables alone.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

/// Returns the conversion API base, optionally wrapped in the CORS proxy.
pub fn conversion_api_base(cobalt_api: &str, via_proxy: bool) -> String {
    if via_proxy {
        format!("{CORS_PROXY_PREFIX}{cobalt_api}")
    } else {
        cobalt_api.to_string()
    }
}
