//! Configuration loading for prayerwall.
//!
//! Config is read once at startup from `prayerwall.{toml,yaml,yml,json}`,
//! with `${ENV_VAR}` substitution and a small set of env overrides.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        apply_env_overrides, clear_config_dir, config_dir, discover_and_load, load_config,
        set_config_dir,
    },
    schema::{DatabaseConfig, Mode, PrayerwallConfig, ServerConfig, WhatsAppConfig},
};
