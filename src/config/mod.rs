/*!
 * Configuration Module
 *
 * Handles application configuration loading from environment variables
 * and provides structured access to configuration values.
 */

use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis configuration (cache, queue, pub/sub)
    pub redis: RedisConfig,
    /// JWT authentication configuration
    pub jwt: JwtConfig,
    /// Per-IP rate limit tiers
    pub rate_limit: RateLimitConfig,
    /// AI pipeline configuration
    pub ai: AiConfig,
    /// TLS configuration (optional direct TLS serving)
    pub tls: TlsConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
    /// Environment (development, production)
    pub environment: String,
    /// Reject non-TLS requests (checked against x-forwarded-proto when proxied)
    pub https_enforce: bool,
    /// Allowed CORS origins
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    pub min_connections: u32,
    /// Connection acquire timeout
    pub acquire_timeout: Duration,
    /// Idle connection timeout
    pub idle_timeout: Duration,
    /// Maximum connection lifetime
    pub max_lifetime: Duration,
}

/// Redis configuration
///
/// TLS is selected by the URL scheme: `rediss://` connects over TLS,
/// `redis://` does not.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
    /// Structured-input cache TTL in seconds
    pub structured_input_ttl: u64,
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Signing key for bearer tokens (HS256, minimum 32 bytes)
    secret: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, expires_in: i64) -> Self {
        Self {
            secret: secret.into(),
            expires_in,
        }
    }

    /// Access the signing key. Kept behind a method so key access is
    /// explicit and the key never appears in Debug output.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Per-IP rate limit tiers (requests per minute)
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// All endpoints
    pub global_per_minute: u32,
    /// /auth/* endpoints
    pub auth_per_minute: u32,
    /// AI generation and chat endpoints
    pub ai_per_minute: u32,
}

/// AI pipeline configuration
#[derive(Clone)]
pub struct AiConfig {
    /// LLM provider API key; None disables external calls entirely
    llm_api_key: Option<String>,
    /// Chat-completions base URL
    pub llm_base_url: String,
    /// Model identifier
    pub llm_model: String,
    /// Worker pool size
    pub worker_concurrency: usize,
    /// Monthly summary quota for free-tier clinics
    pub quota_free: i32,
    /// Monthly summary quota for pro-tier clinics
    pub quota_pro: i32,
    /// Monthly summary quota for enterprise-tier clinics
    pub quota_enterprise: i32,
}

impl AiConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm_api_key: Option<String>,
        llm_base_url: impl Into<String>,
        llm_model: impl Into<String>,
        worker_concurrency: usize,
        quota_free: i32,
        quota_pro: i32,
        quota_enterprise: i32,
    ) -> Self {
        Self {
            llm_api_key,
            llm_base_url: llm_base_url.into(),
            llm_model: llm_model.into(),
            worker_concurrency,
            quota_free,
            quota_pro,
            quota_enterprise,
        }
    }

    pub fn llm_api_key(&self) -> Option<&str> {
        self.llm_api_key.as_deref()
    }
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field(
                "llm_api_key",
                &self.llm_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("worker_concurrency", &self.worker_concurrency)
            .field("quota_free", &self.quota_free)
            .field("quota_pro", &self.quota_pro)
            .field("quota_enterprise", &self.quota_enterprise)
            .finish()
    }
}

/// TLS configuration for direct HTTPS serving
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

impl TlsConfig {
    /// Whether both certificate and key paths are configured
    pub fn is_ready(&self) -> bool {
        self.enabled && self.cert_path.is_some() && self.key_path.is_some()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// contain invalid values. The signing key length is checked here so a
    /// weak key fails the boot rather than the first login.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;
        if secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 bytes");
        }

        let allowed_origins: Vec<String> = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if environment == "production" {
            for origin in &allowed_origins {
                if origin.contains("localhost") || origin.contains("127.0.0.1") {
                    anyhow::bail!(
                        "CORS_ALLOWED_ORIGINS contains loopback origin {} in production",
                        origin
                    );
                }
            }
        }

        let config = Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("SERVER_PORT", 8000),
                https_enforce: env_or("HTTPS_ENFORCE", environment == "production"),
                allowed_origins,
                environment,
            },

            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 20),
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", 5),
                acquire_timeout: Duration::from_secs(env_or("DATABASE_CONNECT_TIMEOUT", 30)),
                idle_timeout: Duration::from_secs(env_or("DATABASE_IDLE_TIMEOUT", 600)),
                max_lifetime: Duration::from_secs(env_or("DATABASE_MAX_LIFETIME", 1800)),
            },

            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
                structured_input_ttl: env_or("AI_INPUT_CACHE_TTL", 300),
            },

            jwt: JwtConfig {
                secret,
                expires_in: env_or("JWT_EXPIRES_IN", 86_400),
            },

            rate_limit: RateLimitConfig {
                global_per_minute: env_or("RATE_LIMIT_GLOBAL", 120),
                auth_per_minute: env_or("RATE_LIMIT_AUTH", 10),
                ai_per_minute: env_or("RATE_LIMIT_AI", 5),
            },

            ai: AiConfig {
                llm_api_key: std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
                llm_base_url: std::env::var("LLM_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                llm_model: std::env::var("LLM_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                worker_concurrency: env_or("AI_WORKER_CONCURRENCY", 2),
                quota_free: env_or("AI_QUOTA_FREE", 10),
                quota_pro: env_or("AI_QUOTA_PRO", 100),
                quota_enterprise: env_or("AI_QUOTA_ENTERPRISE", 1000),
            },

            tls: TlsConfig {
                enabled: env_or("TLS_ENABLED", false),
                cert_path: std::env::var("TLS_CERT_PATH").ok(),
                key_path: std::env::var("TLS_KEY_PATH").ok(),
            },
        };

        Ok(config)
    }
}
