use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Service configuration: `config.toml` (or `$DATES_CONFIG`), then environment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: Backend,
    pub uri: String,
    pub name: String,
    pub collection: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Mongo,
            uri: "mongodb://localhost:27017".to_string(),
            name: "dates-in-sg".to_string(),
            collection: "dates".to_string(),
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Mongo,
    Memory,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(Self::Mongo),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown storage backend {:?} (expected mongo or memory)", other),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mongo => f.write_str("mongo"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

impl AppConfig {
    /// Load `.env`, the TOML file if present, then environment overrides
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("DATES_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Apply overrides looked up through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT must be a port number, got {:?}", port))?;
        }
        if let Some(backend) = var("DATES_BACKEND") {
            self.database.backend = backend.parse()?;
        }
        if let Some(uri) = var("MONGODB_URI") {
            self.database.uri = uri;
        }
        if let Some(name) = var("MONGODB_DB") {
            self.database.name = name;
        }
        if let Some(collection) = var("MONGODB_COLLECTION") {
            self.database.collection = collection;
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_local_mongo() {
        let config = AppConfig::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:8000");
        assert_eq!(config.database.backend, Backend::Mongo);
        assert_eq!(config.database.name, "dates-in-sg");
        assert_eq!(config.database.collection, "dates");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9090

            [database]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.backend, Backend::Memory);
        assert_eq!(config.database.uri, "mongodb://localhost:27017");
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("PORT", "5000"),
                ("MONGODB_URI", "mongodb://db.internal:27017"),
                ("DATES_BACKEND", "Memory"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.database.uri, "mongodb://db.internal:27017");
        assert_eq!(config.database.backend, Backend::Memory);
    }

    #[test]
    fn bad_env_values_are_errors() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("PORT", "eighty")])).is_err());
        assert!(config.apply_env(env(&[("DATES_BACKEND", "sqlite")])).is_err());
    }
}
