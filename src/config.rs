//! Configuration management for Parley.
//!
//! Loads configuration from environment variables (a `.env` file is read
//! first when present) with support for:
//! - Multiple LLM providers with fallback priority
//! - Google sign-in credentials
//! - CORS origins for the web client

use std::env;
use std::sync::OnceLock;

use parley_llm::{default_endpoint, default_model, LlmConfig, LlmProviderConfig};

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub context: ContextConfig,
    pub users: UserConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_url: String,
    /// Web client, target of OAuth redirects.
    pub client_url: String,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub legacy_ttl_secs: i64,
    pub google: Option<GoogleConfig>,
    /// Set the `Secure` attribute on auth cookies.
    pub secure_cookies: bool,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub uploads_path: String,
    pub max_upload_size: usize,
}

#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Number of history turns sent to the model.
    pub history_limit: usize,
}

#[derive(Debug, Clone)]
pub struct UserConfig {
    pub default_credits: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let port: u16 = env_or("PORT", "3000").parse().unwrap_or(3000);
        let public_url = env_or("PUBLIC_URL", &format!("http://localhost:{}", port));
        let client_url = env_or("CLIENT_URL", "http://localhost:5174");
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| nanoid::nanoid!(32));

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port,
                allowed_origins: Self::parse_allowed_origins(&client_url),
                client_url,
                public_url: public_url.clone(),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/parley.db"),
            },
            auth: AuthConfig {
                jwt_refresh_secret: env::var("JWT_REFRESH_SECRET")
                    .unwrap_or_else(|_| jwt_secret.clone()),
                jwt_secret,
                access_ttl_secs: 15 * 60,
                refresh_ttl_secs: 30 * 24 * 60 * 60,
                legacy_ttl_secs: 30 * 24 * 60 * 60,
                google: Self::parse_google(&public_url),
                secure_cookies: public_url.starts_with("https://"),
            },
            llm: LlmConfig {
                providers: Self::parse_llm_providers(),
                timeout_secs: env_or("LLM_TIMEOUT_SECS", "60").parse().unwrap_or(60),
            },
            storage: StorageConfig {
                uploads_path: env_or("UPLOADS_PATH", "./uploads"),
                max_upload_size: env_or("MAX_UPLOAD_SIZE", "10485760")
                    .parse()
                    .unwrap_or(10 * 1024 * 1024), // 10MB
            },
            context: ContextConfig {
                history_limit: env_or("CONTEXT_HISTORY_LIMIT", "15").parse().unwrap_or(15),
            },
            users: UserConfig {
                default_credits: env_or("DEFAULT_CREDITS", "100").parse().unwrap_or(100),
            },
        }
    }

    /// Development clients plus CLIENT_URL plus the comma-separated
    /// ALLOWED_ORIGINS list.
    fn parse_allowed_origins(client_url: &str) -> Vec<String> {
        let mut origins = vec![
            "http://localhost:5173".to_string(),
            "http://localhost:5174".to_string(),
            client_url.to_string(),
        ];

        if let Ok(extra) = env::var("ALLOWED_ORIGINS") {
            origins.extend(
                extra
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from),
            );
        }

        origins.sort();
        origins.dedup();
        origins
    }

    fn parse_google(public_url: &str) -> Option<GoogleConfig> {
        let client_id = env::var("GOOGLE_CLIENT_ID").ok()?;
        let client_secret = env::var("GOOGLE_CLIENT_SECRET").ok()?;

        Some(GoogleConfig {
            client_id,
            client_secret,
            redirect_url: env::var("GOOGLE_CALLBACK_URL")
                .unwrap_or_else(|_| format!("{}/api/auth/google/callback", public_url)),
        })
    }

    /// Parse LLM providers from environment.
    /// Gemini first, then OpenAI, then OpenRouter.
    fn parse_llm_providers() -> Vec<LlmProviderConfig> {
        let mut providers = Vec::new();

        for (priority, (name, key_var, model_var)) in [
            ("gemini", "GEMINI_API_KEY", "GEMINI_MODEL"),
            ("openai", "OPENAI_API_KEY", "OPENAI_MODEL"),
            ("openrouter", "OPENROUTER_API_KEY", "OPENROUTER_MODEL"),
        ]
        .into_iter()
        .enumerate()
        {
            if let Ok(api_key) = env::var(key_var) {
                providers.push(LlmProviderConfig {
                    name: name.to_string(),
                    base_url: default_endpoint(name),
                    model: env_or(model_var, &default_model(name)),
                    api_key,
                    priority: priority as u8 + 1,
                });
            }
        }

        providers
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
