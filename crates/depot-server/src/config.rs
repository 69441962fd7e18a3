//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 443;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default data directory (database, in-flight chunk uploads).
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default bearer-session lifetime in hours.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Default idle lifetime for chunked-upload sessions in hours.
pub const DEFAULT_UPLOAD_SESSION_TTL_HOURS: i64 = 24;

/// Default period of the expiry sweeps in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Groups whose members are administrators regardless of the stored flag.
pub const DEFAULT_ADMIN_GROUPS: &str = "wheel,sudo,admin,root";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

impl ServerConfig {
    pub fn tls_enabled(&self) -> bool {
        self.tls_cert.is_some() && self.tls_key.is_some()
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub use_pam: bool,
    pub admin_groups: Vec<String>,
}

/// Storage-plane configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub upload_session_ttl_hours: i64,
    pub sweep_interval_secs: u64,
}

impl StorageConfig {
    /// Metadata database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("depot.db")
    }

    /// Root for in-flight chunked uploads.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("chunked_uploads")
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: std::env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: std::env::var("SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
                tls_cert: std::env::var("TLS_CERT").ok().map(PathBuf::from),
                tls_key: std::env::var("TLS_KEY").ok().map(PathBuf::from),
            },
            database: DatabaseConfig {
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
            },
            auth: AuthConfig {
                jwt_secret: std::env::var("JWT_SECRET").unwrap_or_default(),
                session_ttl_hours: std::env::var("SESSION_TTL_HOURS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SESSION_TTL_HOURS),
                use_pam: std::env::var("USE_PAM")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
                admin_groups: std::env::var("ADMIN_GROUPS")
                    .unwrap_or_else(|_| DEFAULT_ADMIN_GROUPS.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from(
                    std::env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()),
                ),
                upload_session_ttl_hours: std::env::var("UPLOAD_SESSION_TTL_HOURS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_UPLOAD_SESSION_TTL_HOURS),
                sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: std::env::var("CORS_ALLOW_CREDENTIALS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.auth.jwt_secret.is_empty() {
            anyhow::bail!("JWT_SECRET must be set");
        }

        if self.auth.jwt_secret.len() < 32 {
            tracing::warn!("JWT_SECRET is shorter than 32 bytes; use a longer secret in production");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.auth.session_ttl_hours <= 0 {
            anyhow::bail!("SESSION_TTL_HOURS must be positive");
        }

        if self.server.tls_cert.is_some() != self.server.tls_key.is_some() {
            anyhow::bail!("TLS_CERT and TLS_KEY must be set together");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                tls_cert: None,
                tls_key: None,
            },
            database: DatabaseConfig {
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            },
            auth: AuthConfig {
                jwt_secret: String::new(),
                session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
                use_pam: true,
                admin_groups: DEFAULT_ADMIN_GROUPS
                    .split(',')
                    .map(|s| s.to_string())
                    .collect(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from(DEFAULT_DATA_DIR),
                upload_session_ttl_hours: DEFAULT_UPLOAD_SESSION_TTL_HOURS,
                sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec!["*".to_string()],
                allow_credentials: true,
            },
        }
    }
}
