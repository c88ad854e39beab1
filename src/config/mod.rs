pub mod database;

use anyhow::{anyhow, Context};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

use crate::services::pricing::ServiceFeeRate;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_JWT_TTL_MINUTES: i64 = 480;
/// One year.
pub const MAX_JWT_TTL_MINUTES: i64 = 525_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_ttl_minutes: i64,
    pub service_fee_rate: ServiceFeeRate,
    /// Whether the service fee rate came from the environment or the fallback.
    pub service_fee_rate_explicit: bool,
    pub allow_revision_cycle: bool,
    pub functions_api_key: Option<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow!("Invalid PORT value {:?}: {}", raw, e))?,
            None => DEFAULT_PORT,
        };

        let jwt_secret = get("JWT_SECRET").ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;

        let jwt_ttl_minutes = match get("JWT_TTL_MINUTES") {
            Some(raw) => {
                let minutes: i64 = raw
                    .parse()
                    .map_err(|e| anyhow!("Invalid JWT_TTL_MINUTES value {:?}: {}", raw, e))?;
                if !(1..=MAX_JWT_TTL_MINUTES).contains(&minutes) {
                    return Err(anyhow!(
                        "JWT_TTL_MINUTES must be between 1 and {}, got {}",
                        MAX_JWT_TTL_MINUTES,
                        minutes
                    ));
                }
                minutes
            }
            None => DEFAULT_JWT_TTL_MINUTES,
        };

        let (service_fee_rate, service_fee_rate_explicit) = match get("SERVICE_FEE_RATE") {
            Some(raw) => {
                let value = Decimal::from_str(&raw)
                    .with_context(|| format!("Invalid SERVICE_FEE_RATE value {:?}", raw))?;
                (ServiceFeeRate::new(value).map_err(|e| anyhow!(e))?, true)
            }
            None => (ServiceFeeRate::default(), false),
        };

        let allow_revision_cycle = match get("ALLOW_REVISION_CYCLE") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| anyhow!("Invalid ALLOW_REVISION_CYCLE value {:?}", raw))?,
            None => false,
        };

        let bootstrap_admin = match (get("BOOTSTRAP_ADMIN_EMAIL"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"
                ))
            }
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            Some(other) => return Err(anyhow!("Invalid LOG_FORMAT value {:?}", other)),
        };

        Ok(Config {
            port,
            database_url: get("DATABASE_URL"),
            jwt_secret,
            jwt_ttl_minutes,
            service_fee_rate,
            service_fee_rate_explicit,
            allow_revision_cycle,
            functions_api_key: get("FUNCTIONS_API_KEY"),
            bootstrap_admin,
            log_format,
        })
    }

    /// Config for tests and local runs against the in-memory store.
    pub fn for_memory(jwt_secret: &str) -> Self {
        Config {
            port: DEFAULT_PORT,
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            jwt_ttl_minutes: DEFAULT_JWT_TTL_MINUTES,
            service_fee_rate: ServiceFeeRate::default(),
            service_fee_rate_explicit: true,
            allow_revision_cycle: false,
            functions_api_key: None,
            bootstrap_admin: None,
            log_format: LogFormat::Pretty,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
