use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::StoreError;
use crate::forward::TunnelSpec;
use crate::sshargs::ConnectionConfig;

const CONFIG_DIR: &str = ".config/tunelssh";
const CONFIG_FILE: &str = "config.json";

/// What an interactive session remembers for the next run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedConfig {
    pub connection: ConnectionConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<TunnelSpec>,
}

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.config/tunelssh/config.json`
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .ok_or(StoreError::NoHome)?;
        Ok(PathBuf::from(home).join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the last session, falling back to defaults when the file is
    /// missing or unreadable.
    pub async fn load(&self) -> PersistedConfig {
        match self.try_load().await {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!("no saved config at {}", self.path.display());
                PersistedConfig::default()
            }
            Err(err) => {
                warn!("{err}; using defaults");
                PersistedConfig::default()
            }
        }
    }

    pub async fn try_load(&self) -> Result<Option<PersistedConfig>, StoreError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(StoreError::Load {
                    path: self.path.clone(),
                    source: err.into(),
                })
            }
        };
        let config = serde_json::from_str(&contents).map_err(|err| StoreError::Load {
            path: self.path.clone(),
            source: err.into(),
        })?;
        debug!("loaded saved config from {}", self.path.display());
        Ok(Some(config))
    }

    /// Replaces the file with `config`.
    pub async fn save(&self, config: &PersistedConfig) -> Result<(), StoreError> {
        let save_err = |source: Box<dyn std::error::Error + Send + Sync>| StoreError::Save {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|err| save_err(err.into()))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
                    .await
                    .ok();
            }
        }
        let mut json = serde_json::to_string_pretty(config).map_err(|err| save_err(err.into()))?;
        json.push('\n');
        fs::write(&self.path, json)
            .await
            .map_err(|err| save_err(err.into()))?;
        debug!("saved config to {}", self.path.display());
        Ok(())
    }
}
