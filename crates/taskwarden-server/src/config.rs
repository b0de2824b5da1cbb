use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// Created (or promoted) as an admin at startup when set.
    pub bootstrap_admin_email: Option<String>,
}

/// How a request's principal is established.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Trusts the `x-user-id` header. Local development only.
    #[default]
    Dev,
    /// `Authorization: Bearer taskwarden_<key_id>_<secret>`.
    ApiKey,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/taskwarden".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = var("TASKWARDEN_HTTP_HOST") {
            self.http.host = v;
        }
        if let Some(v) = var("TASKWARDEN_HTTP_PORT")
            && let Ok(port) = v.parse()
        {
            self.http.port = port;
        }
        if let Some(v) = var("TASKWARDEN_STORAGE_BACKEND") {
            self.storage.backend = match v.as_str() {
                "memory" => StorageBackend::Memory,
                "postgres" => StorageBackend::Postgres,
                other => return Err(unknown_value("TASKWARDEN_STORAGE_BACKEND", other)),
            };
        }
        if let Some(v) = var("TASKWARDEN_DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = var("TASKWARDEN_DATABASE_MAX_CONNECTIONS")
            && let Ok(n) = v.parse()
        {
            self.database.max_connections = n;
        }
        if let Some(v) = var("TASKWARDEN_AUTH_MODE") {
            self.auth.mode = match v.as_str() {
                "dev" => AuthMode::Dev,
                "api_key" => AuthMode::ApiKey,
                other => return Err(unknown_value("TASKWARDEN_AUTH_MODE", other)),
            };
        }
        if let Some(v) = var("TASKWARDEN_AUTH_BOOTSTRAP_ADMIN_EMAIL") {
            self.auth.bootstrap_admin_email = Some(v);
        }
        if let Some(v) = var("TASKWARDEN_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Some(v) = var("TASKWARDEN_LOG_FORMAT") {
            self.log.format = match v.as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => return Err(unknown_value("TASKWARDEN_LOG_FORMAT", other)),
            };
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::Validation(
                "http.port must be non-zero".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be non-zero".to_string(),
            ));
        }
        if let Some(ref email) = self.auth.bootstrap_admin_email
            && email.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "auth.bootstrap_admin_email must not be blank".to_string(),
            ));
        }
        if self.auth.mode == AuthMode::ApiKey && self.storage.backend != StorageBackend::Postgres {
            return Err(ConfigError::Validation(
                "auth.mode = \"api_key\" requires storage.backend = \"postgres\"".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

fn unknown_value(var: &str, value: &str) -> ConfigError {
    ConfigError::Validation(format!("{var} has unknown value '{value}'"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}
