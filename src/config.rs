// config.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Client-side configuration. Holds only publishable credentials.
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub paystack_public_key: Option<String>,
    pub app_url: String,
    pub verify_payment_url: String,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        let supabase_url = required("SUPABASE_URL")?;
        let supabase_anon_key = required("SUPABASE_ANON_KEY")?;
        let paystack_public_key = optional("PAYSTACK_PUBLIC_KEY");

        let app_url = optional("APP_URL").unwrap_or_else(|| "http://localhost:8000".to_string());
        let verify_payment_url = optional("VERIFY_PAYMENT_URL")
            .unwrap_or_else(|| format!("{}/api/verify-payment", app_url.trim_end_matches('/')));

        if paystack_public_key.is_none() {
            tracing::warn!("PAYSTACK_PUBLIC_KEY is not set, wallet deposits will be unavailable");
        }

        Ok(Config {
            supabase_url,
            supabase_anon_key,
            paystack_public_key,
            app_url,
            verify_payment_url,
        })
    }
}

/// Configuration of the payment verification server. The only place secret
/// keys are read.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub paystack_secret_key: String,
    pub paystack_base_url: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn init() -> Result<ServerConfig, ConfigError> {
        let supabase_url = required("SUPABASE_URL")?;
        let supabase_service_key = required("SUPABASE_SERVICE_ROLE_KEY")?;
        let paystack_secret_key = required("PAYSTACK_SECRET_KEY")?;

        let paystack_base_url = optional("PAYSTACK_BASE_URL")
            .unwrap_or_else(|| "https://api.paystack.co".to_string());

        let port = match optional("PORT") {
            Some(port) => port.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: e.to_string(),
            })?,
            None => 8000,
        };

        let allowed_origins = optional("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173,http://localhost:8000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(ServerConfig {
            supabase_url,
            supabase_service_key,
            paystack_secret_key,
            paystack_base_url,
            port,
            allowed_origins,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
