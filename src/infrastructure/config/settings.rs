use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    /// Token lifetime in seconds. Expiry is the only termination; there
    /// is no server-side revocation list.
    #[serde(default = "default_token_expiry")]
    pub expiry_seconds: u64,
}

/// Registration policy knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Whether a client may self-register with the Admin role.
    /// Off by default; Student and Instructor are always self-assignable.
    #[serde(default)]
    pub allow_admin_registration: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Cache backend: "memory" (default) or "redis"
    #[serde(default = "default_cache_backend")]
    pub backend: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Service-level TTL for the course listing entry, in seconds.
    #[serde(default = "default_courses_ttl")]
    pub courses_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Bound of the in-process job queue.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    /// Bound of the enrollment event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_token_expiry() -> u64 {
    3600 // 1 hour
}

fn default_cache_backend() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_courses_ttl() -> u64 {
    300 // 5 minutes
}

fn default_queue_capacity() -> usize {
    256
}

fn default_event_capacity() -> usize {
    256
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("jwt.expiry_seconds", 3600)?
            .set_default("cache.backend", "memory")?
            .set_default("cache.redis_url", "redis://localhost:6379")?
            .set_default("cache.courses_ttl_seconds", 300)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, SERVER_PORT, JWT_SECRET, CACHE_BACKEND, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allow_admin_registration: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            redis_url: default_redis_url(),
            courses_ttl_seconds: default_courses_ttl(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);
    }

    #[test]
    fn test_admin_registration_defaults_off() {
        assert!(!AuthConfig::default().allow_admin_registration);
    }

    #[test]
    fn test_cache_defaults() {
        let cache = CacheConfig::default();
        assert_eq!(cache.backend, "memory");
        assert_eq!(cache.courses_ttl_seconds, 300);
    }
}
