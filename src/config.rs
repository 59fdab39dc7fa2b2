// src/config.rs - Configuration management
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use anyhow::{Context, Result};
use rand::{thread_rng, Rng, distributions::Alphanumeric};
use std::path::Path;
use std::fs;

use crate::ledger::TolerancePolicy;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub ledger: LedgerConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub keep_alive: u64,
    pub client_timeout: u64,
    pub client_shutdown: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiration_hours: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub max_request_size: usize,
    pub require_https: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

/// Slack above the remaining quantity, per stage name. Stages not listed
/// get none.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LedgerConfig {
    pub tolerances: HashMap<String, i64>,
}

/// Settings for department screens talking to the ledger backend.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub debounce_ms: u64,
    pub timeout_seconds: u64,
}

const DUMMY_JWT_SECRET: &str = "dummy_32_chars_for_tests_only!!!";

// Dummy defaults for tests (no ENV read here)
impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DUMMY_JWT_SECRET.to_string(),
            token_expiration_hours: 12,
            bcrypt_cost: 10,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            keep_alive: 30,
            client_timeout: 30,
            client_shutdown: 5,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:ledger.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: 30,
            idle_timeout: 600,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            max_request_size: 1024 * 1024,
            require_https: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            debounce_ms: 300,
            timeout_seconds: 30,
        }
    }
}

pub fn generate_jwt_secret() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

pub fn load_config() -> Result<Config> {
    load_env_file()?;

    let mut config = match env::var("CONFIG_FILE") {
        Ok(config_file) => Config::from_file(Path::new(&config_file))?,
        Err(_) => Config::default(),
    };

    config.override_with(|key| env::var(key).ok())?;

    if config.auth.jwt_secret == DUMMY_JWT_SECRET && !config.is_production() {
        log::warn!("JWT_SECRET not set; using a generated secret, tokens will not survive a restart");
        config.auth.jwt_secret = generate_jwt_secret();
    }

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Applies environment-style overrides. `lookup` is `env::var` in
    /// production and a map in tests.
    pub fn override_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("BIND_ADDRESS") {
            self.server.host = host;
        }
        if let Some(port) = lookup("LEDGER_PORT").and_then(|v| v.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(workers) = lookup("LEDGER_WORKERS").and_then(|v| v.parse::<usize>().ok()) {
            self.server.workers = Some(workers);
        }
        if let Some(jwt_secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = jwt_secret;
        }
        if let Some(hours) = lookup("AUTH_TOKEN_EXPIRATION_HOURS").and_then(|v| v.parse::<i64>().ok()) {
            self.auth.token_expiration_hours = hours;
        }
        if let Some(cost) = lookup("AUTH_BCRYPT_COST").and_then(|v| v.parse::<u32>().ok()) {
            self.auth.bcrypt_cost = cost;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(max_conn) = lookup("DATABASE_MAX_CONNECTIONS").and_then(|v| v.parse::<u32>().ok()) {
            self.database.max_connections = max_conn;
        }
        if let Some(min_conn) = lookup("DATABASE_MIN_CONNECTIONS").and_then(|v| v.parse::<u32>().ok()) {
            self.database.min_connections = min_conn;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.security.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
        // LEDGER_TOLERANCES=heat_treatment=100,visual=5
        if let Some(raw) = lookup("LEDGER_TOLERANCES") {
            for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let (name, slack) = pair
                    .split_once('=')
                    .with_context(|| format!("Invalid LEDGER_TOLERANCES entry: {}", pair))?;
                let slack = slack
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("Invalid tolerance for {}", name))?;
                self.ledger.tolerances.insert(name.trim().to_string(), slack);
            }
        }
        if let Some(base_url) = lookup("LEDGER_CLIENT_BASE_URL") {
            self.client.base_url = base_url;
        }
        if let Some(debounce) = lookup("LEDGER_CLIENT_DEBOUNCE_MS").and_then(|v| v.parse::<u64>().ok()) {
            self.client.debounce_ms = debounce;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long (current: {})",
                self.auth.jwt_secret.len()
            ));
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(anyhow::anyhow!(
                "max_connections ({}) must be >= min_connections ({})",
                self.database.max_connections,
                self.database.min_connections
            ));
        }

        if self.is_production() {
            if self.auth.jwt_secret == DUMMY_JWT_SECRET {
                return Err(anyhow::anyhow!("JWT_SECRET must be set in production"));
            }
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(anyhow::anyhow!("Wildcard CORS origins not allowed in production"));
            }
        }

        self.tolerance_policy()?;

        if self.client.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("client.timeout_seconds must be positive"));
        }

        Ok(())
    }

    pub fn tolerance_policy(&self) -> Result<TolerancePolicy> {
        TolerancePolicy::from_config(&self.ledger.tolerances).map_err(|e| anyhow::anyhow!(e))
    }

    pub fn is_production(&self) -> bool {
        env::var("LEDGER_ENV").map(|v| v == "production").unwrap_or(false)
    }

    pub fn print_startup_info(&self) {
        log::info!("Plant ledger starting up...");
        log::info!("Server: {}:{}", self.server.host, self.server.port);
        log::info!("Database: {}", self.database.url);
        log::info!("Auth: JWT ({}h expiration)", self.auth.token_expiration_hours);
        log::info!("Logging: {} level", self.logging.level);
        if self.ledger.tolerances.is_empty() {
            log::info!("Tolerances: none");
        } else {
            log::warn!("Tolerances above remaining quantity: {:?}", self.ledger.tolerances);
        }

        if !self.is_production() {
            log::warn!("Running in development mode");
        }
    }
}

pub fn load_env_file() -> Result<()> {
    if let Ok(env_file) = env::var("ENV_FILE") {
        dotenvy::from_filename(&env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file))?;
    } else if Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env file")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Process;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.client.debounce_ms, 300);
        assert!(config.ledger.tolerances.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.auth.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = "a".repeat(32);
        assert!(config.validate().is_ok());

        config.database.max_connections = 1;
        config.database.min_connections = 5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ledger.tolerances.insert("painting".to_string(), 10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_loading() -> Result<()> {
        let toml_content = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [auth]
        jwt_secret = "test_secret_123456789012345678901234567890"

        [ledger.tolerances]
        heat_treatment = 100
        "#;

        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(toml_content.as_bytes())?;

        let config = Config::from_file(temp_file.path())?;
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.jwt_secret, "test_secret_123456789012345678901234567890");
        assert_eq!(config.database.url, "sqlite:ledger.db");

        let policy = config.tolerance_policy()?;
        assert_eq!(policy.for_process(Process::HeatTreatment), 100);
        assert_eq!(policy.for_process(Process::Machining), 0);

        Ok(())
    }

    #[test]
    fn test_env_override() -> Result<()> {
        let mut config = Config::default();
        config.override_with(lookup(&[
            ("LEDGER_PORT", "9090"),
            ("JWT_SECRET", "env_secret_123456789012345678901234567890"),
            ("ALLOWED_ORIGINS", "http://a.local, ,http://b.local"),
            ("LEDGER_TOLERANCES", "ht=100, visual=5"),
            ("LEDGER_CLIENT_DEBOUNCE_MS", "150"),
        ]))?;

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.auth.jwt_secret, "env_secret_123456789012345678901234567890");
        assert_eq!(config.security.allowed_origins, vec!["http://a.local", "http://b.local"]);
        assert_eq!(config.client.debounce_ms, 150);

        let policy = config.tolerance_policy()?;
        assert_eq!(policy.for_process(Process::HeatTreatment), 100);
        assert_eq!(policy.for_process(Process::Visual), 5);

        assert!(config
            .override_with(lookup(&[("LEDGER_TOLERANCES", "visual")]))
            .is_err());
        Ok(())
    }

    #[test]
    fn test_generate_jwt_secret() {
        let secret = generate_jwt_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
