use std::path::PathBuf;

use crate::schedule::generator::DEFAULT_LEAD_MIN;

pub const DEFAULT_CANCEL_TTL_HOURS: i64 = 48;
pub const DEFAULT_CANCEL_URL_BASE: &str = "https://ripair.shop/api/cancel";

/// Runtime settings read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub static_dir: PathBuf,
    pub cancel_token_secret: Option<String>,
    pub cancel_token_ttl_hours: i64,
    pub cancel_url_base: String,
    pub options_cache_token: Option<String>,
    pub reviews_ip_hash_secret: Option<String>,
    pub default_lead_min: i64,
    pub sms_default_country_code: String,
    /// Shop mailbox copied on booking confirmations
    pub mail_to: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env file loaded: {}", e);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let parsed = |key: &str| get(key).and_then(|v| v.parse::<i64>().ok());

        let cancel_token_secret = get("CANCEL_TOKEN_SECRET");
        let cancel_token_ttl_hours = parsed("CANCEL_TOKEN_TTL_HOURS")
            .filter(|hours| *hours > 0)
            .unwrap_or(DEFAULT_CANCEL_TTL_HOURS);
        let reviews_ip_hash_secret = get("REVIEWS_IP_HASH_SECRET").or_else(|| cancel_token_secret.clone());

        Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: get("PORT").and_then(|p| p.parse().ok()).unwrap_or(8080),
            data_dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "data".to_string())),
            cache_dir: PathBuf::from(get("CACHE_DIR").unwrap_or_else(|| "cache".to_string())),
            static_dir: PathBuf::from(get("STATIC_DIR").unwrap_or_else(|| "static".to_string())),
            cancel_token_secret,
            cancel_token_ttl_hours,
            cancel_url_base: get("CANCEL_URL_BASE").unwrap_or_else(|| DEFAULT_CANCEL_URL_BASE.to_string()),
            options_cache_token: get("OPTIONS_CACHE_TOKEN").or_else(|| get("RIPAIR_OPTIONS_CACHE_TOKEN")),
            reviews_ip_hash_secret,
            default_lead_min: parsed("DEFAULT_LEAD_MIN").unwrap_or(DEFAULT_LEAD_MIN),
            sms_default_country_code: get("SMS_DEFAULT_COUNTRY_CODE").unwrap_or_else(|| "+33".to_string()),
            mail_to: get("MAIL_TO"),
        }
    }
}
