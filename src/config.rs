use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::{Error, CHUNK_SIZE, DB_NAME, DEFAULT_MIME_TYPE};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct VaultConfig {
    pub database: Option<String>,
    pub chunk_size: Option<usize>,
    pub mime_type: Option<String>,
    pub quota_bytes: Option<u64>,
}

/// Validated configuration with defaults filled in
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database: PathBuf,
    pub chunk_size: NonZeroUsize,
    pub mime_type: String,
    pub quota_bytes: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: default_database_path_in(Path::new(".")),
            chunk_size: NonZeroUsize::new(CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            quota_bytes: None,
        }
    }
}

impl VaultConfig {
    pub fn resolve(&self) -> crate::Result<Settings> {
        let defaults = Settings::default();

        let chunk_size = match self.chunk_size {
            Some(n) => NonZeroUsize::new(n)
                .ok_or_else(|| Error::Config("chunk_size must be greater than zero".to_string()))?,
            None => defaults.chunk_size,
        };

        let mime_type = match &self.mime_type {
            Some(m) if m.trim().is_empty() => {
                return Err(Error::Config("mime_type must not be empty".to_string()));
            }
            Some(m) => m.clone(),
            None => defaults.mime_type,
        };

        Ok(Settings {
            database: self
                .database
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(defaults.database),
            chunk_size,
            mime_type,
            quota_bytes: self.quota_bytes,
        })
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("chunkvault.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(format!("{}.sqlite", DB_NAME))
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<VaultConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: VaultConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &VaultConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
