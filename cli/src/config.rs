use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tissue_core::repository::remote::is_unset;

const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_DEBOUNCE_MS: u64 = 2500;
const DEFAULT_LOG_LEVEL: &str = "warn";

pub const DATA_DIR_ENV: &str = "TISSUE_DATA_DIR";
pub const REMOTE_DIR_ENV: &str = "TISSUE_REMOTE_DIR";
pub const EXTRACTOR_ENV: &str = "TISSUE_EXTRACTOR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Shared directory holding the sync table. Unset means local-only.
    pub remote_dir: Option<String>,
    pub debounce_ms: u64,
    /// argv of the image extraction command.
    pub extractor_command: Option<Vec<String>>,
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            remote_dir: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            extractor_command: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl CliConfig {
    /// Environment values win over the file. Placeholder values such as
    /// "undefined" leave the file value alone.
    pub fn apply_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let remote = lookup(REMOTE_DIR_ENV);
        if !is_unset(remote.as_deref()) {
            self.remote_dir = remote;
        }
        if let Some(command) = lookup(EXTRACTOR_ENV) {
            let argv: Vec<String> = command.split_whitespace().map(str::to_string).collect();
            if !argv.is_empty() {
                self.extractor_command = Some(argv);
            }
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: CliConfig,
    pub file: PathBuf,
    pub created: bool,
}

pub fn load_or_create(data_dir: &Path) -> Result<ConfigLoad> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("create data dir {}", data_dir.display()))?;
    let file = data_dir.join(CONFIG_FILE_NAME);

    if file.exists() {
        let contents = fs::read_to_string(&file)
            .with_context(|| format!("read config {}", file.display()))?;
        let config: CliConfig = toml::from_str(&contents)
            .with_context(|| format!("parse config {}", file.display()))?;
        return Ok(ConfigLoad {
            config,
            file,
            created: false,
        });
    }

    let config = CliConfig::default();
    let contents = toml::to_string_pretty(&config).context("serialize config")?;
    fs::write(&file, contents).with_context(|| format!("write config {}", file.display()))?;

    Ok(ConfigLoad {
        config,
        file,
        created: true,
    })
}

/// `--data-dir`, then `TISSUE_DATA_DIR`, then `~/.tissue-tracker`.
pub fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    let from_env = std::env::var(DATA_DIR_ENV).ok();
    if !is_unset(from_env.as_deref()) {
        if let Some(dir) = from_env {
            return Ok(PathBuf::from(dir.trim()));
        }
    }
    Ok(tissue_core::repository::local::default_data_dir()?)
}
