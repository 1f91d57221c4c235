use std::{
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::PrayerwallConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "prayerwall.toml",
    "prayerwall.yaml",
    "prayerwall.yml",
    "prayerwall.json",
];

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Set a custom config directory. When set, config discovery only looks in
/// this directory (project-local and user-global paths are skipped).
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(path);
}

/// Clear the config directory override, restoring default discovery.
pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = None;
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<PrayerwallConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./prayerwall.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/prayerwall/prayerwall.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `PrayerwallConfig::default()` if no file is found or it fails to parse.
pub fn discover_and_load() -> PrayerwallConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                PrayerwallConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            PrayerwallConfig::default()
        },
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

/// Apply `WHATSAPP_GROUP_ID`, `DATABASE_URL` and `PRAYERWALL_MODE` on top of `config`.
pub fn apply_env_overrides(config: &mut PrayerwallConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(group) = lookup("WHATSAPP_GROUP_ID").filter(|g| !g.trim().is_empty()) {
        config.whatsapp.group_id = Some(group);
    }
    if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
        config.database.url = url;
    }
    if let Some(mode) = lookup("PRAYERWALL_MODE") {
        match mode.parse() {
            Ok(mode) => config.mode = mode,
            Err(e) => warn!(error = %e, "ignoring PRAYERWALL_MODE"),
        }
    }
}

/// Find the first config file in standard locations.
///
/// When a config dir override is set, only that directory is searched.
fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return first_existing(&dir);
    }

    // Project-local
    if let Some(p) = first_existing(Path::new(".")) {
        return Some(p);
    }

    config_dir().and_then(|dir| first_existing(&dir))
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory: override, or `~/.config/prayerwall/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return Some(dir);
    }
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join("prayerwall"))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<PrayerwallConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
