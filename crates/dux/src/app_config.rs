//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." Fine. Every field has a default. 🦆
//!
//! 🏗️ Powered by Figment. `DUX_*` environment variables first, then the TOML file on top.
//! Nested keys use a double underscore: `DUX_RUNTIME__WORKERS=32`.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::ProviderConfig;
use crate::supervisors::config::{RetryConfig, RuntimeConfig};

/// 📦 One struct to rule them all: which tree, how many walkers, how patient.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// 🌲 Which provider to walk. Unset means the local filesystem.
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// 🚀 Load the config from `DUX_*` env vars, plus `config_file_name` when one is given.
///
/// - `None`: env vars only.
/// - `Some(path)`: env vars + TOML file, merged. TOML wins on conflicts.
///
/// 💀 Errors carry the file name, so the 3am reader knows which file to glare at.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("DUX_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (DUX_*).",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (DUX_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    // -- ✅ validate the retry numbers now, not three hours into a walk
    app_config
        .retry
        .to_policy()
        .context("💀 The [retry] section doesn't add up")?;
    Ok(app_config)
}
