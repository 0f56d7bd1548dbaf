use crate::config::Config;
use crate::utils::{ensure_dir, get_concierge_home};
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding `guard.dailyLimit`. An empty value or
/// `none` disables the quota.
pub const DAILY_LIMIT_ENV: &str = "CONCIERGE_DAILY_LIMIT";

pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_concierge_home()?.join("config.json"))
}

/// Resolve where the state database lives for this config.
pub fn get_db_path(config: &Config) -> Result<PathBuf> {
    match config.storage.db_path.as_deref() {
        Some(p) if !p.trim().is_empty() => Ok(crate::utils::expand_home(p)),
        _ => Ok(get_concierge_home()?.join("state.db")),
    }
}

pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let default_path = get_config_path().unwrap_or_else(|_| PathBuf::from("config.json"));
    let path = config_path.unwrap_or(default_path.as_path());

    let mut config = if path.exists() {
        // Shared lock: concurrent readers are fine, writers wait
        let file = fs::File::open(path)
            .with_context(|| format!("Failed to open config at {}", path.display()))?;
        file.lock_shared()
            .with_context(|| "Failed to acquire shared lock on config file")?;

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str::<Config>(&content)
            .with_context(|| format!("Failed to parse config JSON from {}", path.display()))?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config);

    config
        .validate()
        .with_context(|| "Configuration validation failed")?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    let Ok(raw) = std::env::var(DAILY_LIMIT_ENV) else {
        return;
    };
    config.guard.daily_limit = parse_daily_limit(&raw).unwrap_or_else(|| {
        warn!(
            "ignoring {}={:?}: expected a positive integer or 'none'",
            DAILY_LIMIT_ENV, raw
        );
        config.guard.daily_limit
    });
}

/// `Some(None)` disables the quota, `Some(Some(n))` sets it, `None` is invalid.
fn parse_daily_limit(raw: &str) -> Option<Option<u32>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Some(None);
    }
    match trimmed.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(Some(n)),
    }
}

pub fn save_config(config: &Config, config_path: Option<&Path>) -> Result<()> {
    let default_path = get_config_path().unwrap_or_else(|_| PathBuf::from("config.json"));
    let path = config_path.unwrap_or(default_path.as_path());

    ensure_dir(path.parent().context("Config path has no parent")?)?;

    // atomic_write renames over the target, which drops any flock held on the
    // old inode, so writers serialize on a sibling lock file instead.
    let lock_path = path.with_extension("json.lock");
    let lock_file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&lock_path)
        .with_context(|| format!("Failed to create lock file at {}", lock_path.display()))?;
    lock_file
        .lock_exclusive()
        .with_context(|| "Failed to acquire exclusive lock on config lock file")?;

    let content = serde_json::to_string_pretty(config)?;
    crate::utils::atomic_write(path, &content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }

    Ok(())
}

#[cfg(test)]
mod tests;
