// src/config.rs

use std::{env, fs, path::PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Keys the runtime understands:
/// - `WAYPOINT_LOCATION_INTERVAL_MS` — synthetic location feeder cadence
#[async_trait::async_trait]
#[typetag::serde]
pub trait ConfigStoreType: Send + Sync {
    async fn keys(&self) -> Vec<String>;
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str) -> Result<(), String>;
    async fn del(&self, key: &str);
    fn clone_box(&self) -> Box<dyn ConfigStoreType>;
    fn debug_box(&self) -> String;

    async fn as_vec(&self) -> Vec<(String, String)> {
        let mut entries = vec![];
        for key in self.keys().await {
            if let Some(value) = self.get(&key).await {
                entries.push((key, value));
            }
        }
        entries
    }
}

#[derive(Serialize, Deserialize)]
pub struct ConfigStore(pub Box<dyn ConfigStoreType>);

impl ConfigStore {
    pub fn into_inner(self) -> Box<dyn ConfigStoreType> {
        self.0
    }
}

impl Clone for ConfigStore {
    fn clone(&self) -> Self {
        ConfigStore(self.0.clone_box())
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.debug_box())
    }
}

/// Environment-backed store seeded from a `.env` file; `set`/`del` write
/// the file back so changes survive a restart.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvConfigStore {
    env_file: PathBuf,
}

impl EnvConfigStore {
    pub fn new(env_file: PathBuf) -> Box<Self> {
        if env_file.exists() {
            dotenvy::from_path(&env_file).ok();
            info!("loaded .env from {}", env_file.display());
        } else {
            warn!("no .env at {}", env_file.display());
        }
        Box::new(Self { env_file })
    }

    fn rewrite(&self, key: &str, value: Option<&str>) -> Result<(), String> {
        let current = fs::read_to_string(&self.env_file).unwrap_or_default();
        let mut lines: Vec<String> = current
            .lines()
            .filter(|line| {
                line.split_once('=')
                    .map_or(true, |(k, _)| k.trim() != key)
            })
            .map(|line| line.to_string())
            .collect();
        if let Some(value) = value {
            lines.push(format!("{key}={value}"));
        }
        fs::write(&self.env_file, lines.join("\n")).map_err(|e| e.to_string())
    }
}

#[typetag::serde]
#[async_trait]
impl ConfigStoreType for EnvConfigStore {
    async fn keys(&self) -> Vec<String> {
        env::vars().map(|(k, _)| k).collect()
    }

    async fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), String> {
        unsafe {
            env::set_var(key, value);
        }
        self.rewrite(key, Some(value))
    }

    async fn del(&self, key: &str) {
        unsafe {
            env::remove_var(key);
        }
        let _ = self.rewrite(key, None);
    }

    fn clone_box(&self) -> Box<dyn ConfigStoreType> {
        Box::new(self.clone())
    }

    fn debug_box(&self) -> String {
        format!("EnvConfigStore({})", self.env_file.display())
    }
}

/// In-memory store for tests and embedders that assemble config in code.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MapConfigStore {
    #[schemars(with = "std::collections::HashMap<String, String>")]
    map: DashMap<String, String>,
}

impl MapConfigStore {
    pub fn new() -> Box<Self> {
        Box::new(Self {
            map: DashMap::new(),
        })
    }
}

#[typetag::serde]
#[async_trait]
impl ConfigStoreType for MapConfigStore {
    async fn keys(&self) -> Vec<String> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).map(|v| v.clone())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) {
        self.map.remove(key);
    }

    fn clone_box(&self) -> Box<dyn ConfigStoreType> {
        Box::new(self.clone())
    }

    fn debug_box(&self) -> String {
        format!("MapConfigStore({} entries)", self.map.len())
    }
}
