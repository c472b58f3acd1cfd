use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::model::CACHE_TTL_SECONDS;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IssuelensConfig {
    pub db_path: Option<String>,
    pub blob_path: Option<String>,
    pub ttl_secs: Option<u64>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("issuelens.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<IssuelensConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: IssuelensConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

/// Resolved runtime settings: CLI flags win over the config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub blob_path: Option<PathBuf>,
    pub ttl: f64,
}

pub fn resolve_settings(
    config: Option<&IssuelensConfig>,
    db_flag: Option<PathBuf>,
    blob_flag: Option<PathBuf>,
) -> anyhow::Result<Settings> {
    let db_path = db_flag
        .or_else(|| {
            config
                .and_then(|c| c.db_path.as_deref())
                .map(PathBuf::from)
        })
        .ok_or_else(|| {
            anyhow::anyhow!("no tracker cache path: pass --db or set db_path in issuelens.toml")
        })?;
    let blob_path = blob_flag.or_else(|| {
        config
            .and_then(|c| c.blob_path.as_deref())
            .map(PathBuf::from)
    });
    let ttl = config
        .and_then(|c| c.ttl_secs)
        .map_or(CACHE_TTL_SECONDS, |secs| secs as f64);
    Ok(Settings {
        db_path,
        blob_path,
        ttl,
    })
}
