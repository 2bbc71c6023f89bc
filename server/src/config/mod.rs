use std::env;
use std::net::SocketAddr;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CHECKIN_MAX_RETRIES: u32 = 5;
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

/// Signing keys shorter than this are refused at start-up.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub qr_signing_secret: String,
    pub scanner_auth_secret: String,
    pub checkin_max_retries: u32,
    pub allowed_origins: Vec<String>,
    pub production: bool,
    /// When set, payment confirmations must present it in
    /// `X-Payment-Confirmation-Secret`.
    pub payment_confirmation_secret: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("max_connections", &self.max_connections)
            .field("qr_signing_secret", &"<redacted>")
            .field("scanner_auth_secret", &"<redacted>")
            .field("checkin_max_retries", &self.checkin_max_retries)
            .field("allowed_origins", &self.allowed_origins)
            .field("production", &self.production)
            .field(
                "payment_confirmation_secret",
                &self.payment_confirmation_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let database_url = required("DATABASE_URL")?;
        let qr_signing_secret = secret(required("QR_SIGNING_SECRET")?, "QR_SIGNING_SECRET")?;
        let scanner_auth_secret =
            secret(required("SCANNER_AUTH_SECRET")?, "SCANNER_AUTH_SECRET")?;
        if qr_signing_secret == scanner_auth_secret {
            return Err(ConfigError::Invalid {
                name: "SCANNER_AUTH_SECRET",
                reason: "must differ from QR_SIGNING_SECRET".to_string(),
            });
        }

        let bind_addr = parsed(
            lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            "BIND_ADDR",
        )?;
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => parsed(v, "DATABASE_MAX_CONNECTIONS")?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let checkin_max_retries = match lookup("CHECKIN_MAX_RETRIES") {
            Some(v) => parsed(v, "CHECKIN_MAX_RETRIES")?,
            None => DEFAULT_CHECKIN_MAX_RETRIES,
        };
        if checkin_max_retries == 0 {
            return Err(ConfigError::Invalid {
                name: "CHECKIN_MAX_RETRIES",
                reason: "must be at least 1".to_string(),
            });
        }

        let allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        let payment_confirmation_secret = lookup("PAYMENT_CONFIRMATION_SECRET")
            .filter(|v| !v.trim().is_empty())
            .map(|v| secret(v, "PAYMENT_CONFIRMATION_SECRET"))
            .transpose()?;
        let production = lookup("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            qr_signing_secret,
            scanner_auth_secret,
            checkin_max_retries,
            allowed_origins,
            production,
            payment_confirmation_secret,
        })
    }
}

fn secret(value: String, name: &'static str) -> Result<String, ConfigError> {
    if value.len() < MIN_SECRET_LEN {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
        });
    }
    Ok(value)
}

fn parsed<T>(value: String, name: &'static str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}
