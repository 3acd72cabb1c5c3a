use anyhow::{Context, Result};
use config::{Config, Environment, File as ConfigFile};
use filemart_market::MarketConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "filemart.toml";
pub const ENV_PREFIX: &str = "FILEMART";

/// Settings for one CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub market: MarketConfig,
    /// Enables the `fund` command.
    pub dev_faucet: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
            market: MarketConfig::default(),
            dev_faucet: false,
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("filemart"))
        .unwrap_or_else(|| PathBuf::from("./filemart-data"))
}

impl CliConfig {
    /// Layer the optional TOML file under `FILEMART_*` environment variables.
    ///
    /// Without `--config`, `<data_dir>/filemart.toml` is read when present.
    /// An explicit `data_dir` argument always wins over both sources.
    pub fn load(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let search_dir = data_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(default_data_dir);
        let resolved_path = match config_path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => Some(search_dir.join(CONFIG_FILE_NAME)).filter(|path| path.exists()),
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: CliConfig = builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        if let Some(dir) = data_dir {
            loaded.data_dir = dir.to_path_buf();
        }
        Ok(loaded)
    }
}
