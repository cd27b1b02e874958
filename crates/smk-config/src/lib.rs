//! smk-config
//!
//! Layered YAML configuration for the migration CLI.
//!
//! Each document is a partial [`SmkConfig`]: keys it sets override the
//! layers before it, keys it omits keep their earlier value. Unknown keys
//! are rejected per layer, and errors name the offending layer.

use anyhow::{Context, Result};
use serde::Deserialize;
use smk_core::{BackendConfig, DEFAULT_LOCK_KEY, DEFAULT_TABLE};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";
pub const DEFAULT_URL_ENV: &str = "SMK_DATABASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SmkConfig {
    pub migrations: MigrationsConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationsConfig {
    /// Directory holding `<id>.up.sql` / `<id>.down.sql` / `<id>.sql` files.
    pub dir: PathBuf,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Bookkeeping table name.
    pub table: String,
    /// Advisory lock key (PostgreSQL only).
    pub lock_key: i64,
    /// Name of the env var holding the database URL.
    pub url_env: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            lock_key: DEFAULT_LOCK_KEY,
            url_env: DEFAULT_URL_ENV.to_string(),
        }
    }
}

impl SmkConfig {
    /// Validated backend constructor parameters.
    pub fn backend_config(&self) -> Result<BackendConfig> {
        BackendConfig::new(self.database.table.clone(), self.database.lock_key)
            .context("invalid database.table")
    }

    fn apply(&mut self, layer: Layer) {
        if let Some(dir) = layer.migrations.dir {
            self.migrations.dir = dir;
        }
        let db = layer.database;
        if let Some(table) = db.table {
            self.database.table = table;
        }
        if let Some(lock_key) = db.lock_key {
            self.database.lock_key = lock_key;
        }
        if let Some(url_env) = db.url_env {
            self.database.url_env = url_env;
        }
    }
}

/// One YAML document: every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Layer {
    migrations: MigrationsLayer,
    database: DatabaseLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MigrationsLayer {
    dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DatabaseLayer {
    table: Option<String>,
    lock_key: Option<i64>,
    url_env: Option<String>,
}

fn parse_layer(raw: &str) -> Result<Option<Layer>> {
    let value: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
    // An empty file parses as null: no overrides.
    if value.is_null() {
        return Ok(None);
    }
    let layer = serde_yaml::from_value(value).context("invalid migration config")?;
    Ok(Some(layer))
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<SmkConfig> {
    let mut config = SmkConfig::default();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        if let Some(layer) = parse_layer(&raw).with_context(|| format!("config layer {p}"))? {
            config.apply(layer);
        }
    }
    config.backend_config()?;
    Ok(config)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<SmkConfig> {
    let mut config = SmkConfig::default();
    for (i, raw) in yaml_docs.iter().enumerate() {
        if let Some(layer) = parse_layer(raw).with_context(|| format!("config layer #{i}"))? {
            config.apply(layer);
        }
    }
    config.backend_config()?;
    Ok(config)
}
