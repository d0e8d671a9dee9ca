//! Application configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::validation::PageDefaults;
use std::env;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database connection URL
    pub database_url: String,
    /// Session expiration in hours
    pub session_expiry_hours: i64,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Page size used when a list request gives none
    pub default_page_size: i64,
    /// Largest page size a list request may ask for
    pub max_page_size: i64,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Environment (development/production)
    pub environment: Environment,
    /// Admin account created at startup when absent
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        // DATABASE_URL, or the individual components
        let database_url = env::var("DATABASE_URL")
            .or_else(|_| -> Result<String, env::VarError> {
                let host = env::var("DATABASE_HOST")?;
                let port = env::var("DATABASE_PORT").unwrap_or_else(|_| "5432".to_string());
                let user = env::var("DATABASE_USER")?;
                let password = env::var("DATABASE_PASSWORD")?;
                let db = env::var("DATABASE_DB")?;
                Ok(format!(
                    "postgres://{}:{}@{}:{}/{}",
                    user, password, host, port, db
                ))
            })
            .map_err(|_| {
                ConfigError::Missing(
                    "DATABASE_URL, or DATABASE_HOST + DATABASE_USER + DATABASE_PASSWORD + DATABASE_DB is required".to_string(),
                )
            })?;

        let default_page_size = parse_var("DEFAULT_PAGE_SIZE", 10)?;
        let max_page_size = parse_var("MAX_PAGE_SIZE", 100)?;
        if default_page_size < 1 || max_page_size < default_page_size {
            return Err(ConfigError::Invalid(
                "DEFAULT_PAGE_SIZE must be positive and not exceed MAX_PAGE_SIZE".to_string(),
            ));
        }

        let bootstrap_admin = match (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.trim().is_empty() => {
                if password.len() < 12 {
                    return Err(ConfigError::Invalid(
                        "ADMIN_PASSWORD must be at least 12 characters".to_string(),
                    ));
                }
                let username = username.trim().to_string();
                let email = env::var("ADMIN_EMAIL")
                    .unwrap_or_else(|_| format!("{}@localhost", username));
                Some(BootstrapAdmin {
                    username,
                    email,
                    password,
                })
            }
            _ => None,
        };

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 8080)?,
            database_url,
            session_expiry_hours: parse_var("SESSION_EXPIRY_HOURS", 8)?,
            max_body_size: parse_var("MAX_BODY_SIZE", 1024 * 1024)?,
            default_page_size,
            max_page_size,
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| vec!["http://localhost:3000".to_string()]),
            environment,
            bootstrap_admin,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn page_defaults(&self) -> PageDefaults {
        PageDefaults {
            default_limit: self.default_page_size,
            max_limit: self.max_page_size,
        }
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
