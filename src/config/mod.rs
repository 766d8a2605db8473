use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub allow_registration: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    /// URL prefix the upload directory is served under.
    pub public_prefix: String,
    pub max_bytes: usize,
}

impl AppConfig {
    /// Load configuration from the environment. Per-environment defaults are
    /// applied first, then overridden by specific env vars.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;
        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| ConfigError::MissingVar("JWT_SECRET"))?;

        let mut config = match environment {
            Environment::Production => Self::production(database_url, jwt_secret),
            Environment::Staging => Self::staging(database_url, jwt_secret),
            Environment::Development => Self::development(database_url, jwt_secret),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECT_TIMEOUT_SECS") {
            self.database.connect_timeout_secs =
                v.parse().unwrap_or(self.database.connect_timeout_secs);
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("ALLOW_REGISTRATION") {
            self.security.allow_registration =
                v.parse().unwrap_or(self.security.allow_registration);
        }
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("UPLOAD_DIR") {
            self.uploads.dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("UPLOAD_MAX_BYTES") {
            self.uploads.max_bytes = v.parse().unwrap_or(self.uploads.max_bytes);
        }
    }

    fn development(database_url: String, jwt_secret: String) -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: database_url,
                max_connections: 10,
                connect_timeout_secs: 30,
            },
            security: SecurityConfig {
                jwt_secret,
                jwt_expiry_hours: 24,
                allow_registration: true,
                cors_origins: vec![
                    "http://localhost:3001".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            uploads: UploadConfig {
                dir: PathBuf::from("./uploads"),
                public_prefix: "/uploads".to_string(),
                max_bytes: 10 * 1024 * 1024,
            },
        }
    }

    fn staging(database_url: String, jwt_secret: String) -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: database_url,
                max_connections: 20,
                connect_timeout_secs: 10,
            },
            security: SecurityConfig {
                jwt_secret,
                jwt_expiry_hours: 24,
                allow_registration: false,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            uploads: UploadConfig {
                dir: PathBuf::from("/var/www/uploads"),
                public_prefix: "/uploads".to_string(),
                max_bytes: 10 * 1024 * 1024,
            },
        }
    }

    fn production(database_url: String, jwt_secret: String) -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: database_url,
                max_connections: 50,
                connect_timeout_secs: 5,
            },
            security: SecurityConfig {
                jwt_secret,
                jwt_expiry_hours: 24,
                allow_registration: false,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            uploads: UploadConfig {
                dir: PathBuf::from("/var/www/uploads"),
                public_prefix: "/uploads".to_string(),
                max_bytes: 10 * 1024 * 1024,
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(env: Environment) -> AppConfig {
        let url = "postgres://localhost/cms".to_string();
        let secret = "test-secret".to_string();
        match env {
            Environment::Development => AppConfig::development(url, secret),
            Environment::Staging => AppConfig::staging(url, secret),
            Environment::Production => AppConfig::production(url, secret),
        }
    }

    #[test]
    fn development_allows_registration() {
        let config = base(Environment::Development);
        assert!(config.security.allow_registration);
        assert_eq!(config.security.jwt_expiry_hours, 24);
    }

    #[test]
    fn production_locks_down_registration() {
        let config = base(Environment::Production);
        assert!(!config.security.allow_registration);
        assert!(config.is_production());
    }

    #[test]
    fn upload_ceiling_is_ten_megabytes() {
        let config = base(Environment::Development);
        assert_eq!(config.uploads.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.uploads.public_prefix, "/uploads");
    }
}
