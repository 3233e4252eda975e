//! Server configuration.
//!
//! Everything is read from environment variables (a `.env` file is loaded first, if present). Missing or invalid
//! values fall back to a default and log why, except for the fee schedule, which must be valid if it is given at all.
use std::{env, time::Duration};

use log::*;
use mkt_common::{parse_boolean_flag, Secret, DEFAULT_CURRENCY_CODE};
use settlement_engine::{
    fee_policy::FeeSchedule,
    helpers::RetryPolicy,
    settlement_api::notifications::DEFAULT_NOTIFICATION_ATTEMPTS,
    CheckoutConfig,
    NotificationMode,
};

use crate::errors::ServerError;

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/marketplace.db";
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
const DEFAULT_PAYMENT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SETTLEMENT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 5;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The currency that prices, fees and wallet balances are held in.
    pub canonical_currency: String,
    pub fee_schedule: FeeSchedule,
    pub payment: PaymentApiConfig,
    pub notifications: NotificationApiConfig,
    /// Attempts made for payment calls before giving up. Notifications always get three retries.
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub payment_timeout: Duration,
    pub settlement_timeout: Duration,
    pub max_conflict_retries: u32,
    /// Send order confirmations from a background task instead of before the checkout returns.
    pub background_notifications: bool,
    /// Required in the `X-Admin-Token` header of every `/admin` request. If it is empty, the admin routes refuse every
    /// request.
    pub admin_token: Secret<String>,
}

#[derive(Clone, Debug, Default)]
pub struct PaymentApiConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
    pub signing_secret: Secret<String>,
}

#[derive(Clone, Debug, Default)]
pub struct NotificationApiConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            canonical_currency: DEFAULT_CURRENCY_CODE.to_string(),
            fee_schedule: FeeSchedule::default(),
            payment: PaymentApiConfig::default(),
            notifications: NotificationApiConfig::default(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            payment_timeout: Duration::from_millis(DEFAULT_PAYMENT_TIMEOUT_MS),
            settlement_timeout: Duration::from_millis(DEFAULT_SETTLEMENT_TIMEOUT_MS),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            background_notifications: false,
            admin_token: Secret::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    /// Reads the configuration from the environment. An unreadable fee schedule is the only fatal problem, since
    /// charging with the wrong fees is worse than not starting.
    pub fn from_env_or_default() -> Result<Self, ServerError> {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = parse_env("MKT_PORT", DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ MKT_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let canonical_currency = env::var("MKT_CANONICAL_CURRENCY")
            .map(|s| s.trim().to_ascii_uppercase())
            .ok()
            .unwrap_or_else(|| {
                info!("🪛️ MKT_CANONICAL_CURRENCY is not set. Using {DEFAULT_CURRENCY_CODE}.");
                DEFAULT_CURRENCY_CODE.to_string()
            });
        let fee_schedule = match env::var("MKT_FEE_SCHEDULE") {
            Ok(path) => {
                let schedule = FeeSchedule::from_file(&path)
                    .map_err(|e| ServerError::ConfigurationError(format!("MKT_FEE_SCHEDULE ({path}): {e}")))?;
                info!("🪛️ Loaded the fee schedule from {path}");
                schedule
            },
            Err(_) => {
                warn!(
                    "🪛️ MKT_FEE_SCHEDULE is not set. Every category will pay 5% handling, 2% buyer protection and \
                     7.5% tax."
                );
                FeeSchedule::default()
            },
        };
        let payment = PaymentApiConfig::from_env_or_default();
        let notifications = NotificationApiConfig::from_env_or_default();
        let retry_attempts = parse_env("MKT_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS);
        let retry_base_delay = Duration::from_millis(parse_env("MKT_RETRY_BASE_DELAY_MS", DEFAULT_RETRY_BASE_DELAY_MS));
        let payment_timeout = Duration::from_millis(parse_env("MKT_PAYMENT_TIMEOUT_MS", DEFAULT_PAYMENT_TIMEOUT_MS));
        let settlement_timeout =
            Duration::from_millis(parse_env("MKT_SETTLEMENT_TIMEOUT_MS", DEFAULT_SETTLEMENT_TIMEOUT_MS));
        let max_conflict_retries = parse_env("MKT_SETTLEMENT_MAX_CONFLICT_RETRIES", DEFAULT_MAX_CONFLICT_RETRIES);
        let background_notifications = parse_boolean_flag(env::var("MKT_BACKGROUND_NOTIFICATIONS").ok(), false);
        let admin_token = Secret::from_env("MKT_ADMIN_TOKEN").unwrap_or_else(|| {
            warn!("🪛️ MKT_ADMIN_TOKEN is not set. All /admin requests will be refused.");
            Secret::default()
        });
        Ok(Self {
            host,
            port,
            database_url,
            canonical_currency,
            fee_schedule,
            payment,
            notifications,
            retry_attempts,
            retry_base_delay,
            payment_timeout,
            settlement_timeout,
            max_conflict_retries,
            background_notifications,
            admin_token,
        })
    }

    /// The tuning for the checkout flow that this configuration describes.
    pub fn checkout_config(&self) -> CheckoutConfig {
        let retry = RetryPolicy::new(self.retry_attempts, self.retry_base_delay);
        let notification_mode =
            if self.background_notifications { NotificationMode::Background } else { NotificationMode::Inline };
        CheckoutConfig {
            canonical_currency: self.canonical_currency.clone(),
            payment_retry: retry,
            payment_timeout: self.payment_timeout,
            notification_retry: retry.with_max_attempts(DEFAULT_NOTIFICATION_ATTEMPTS),
            settlement_retry: retry.with_max_attempts(self.max_conflict_retries),
            settlement_timeout: self.settlement_timeout,
            notification_mode,
        }
    }
}

impl PaymentApiConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("MKT_PAYMENT_API_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_PAYMENT_API_URL is not set. Please set it to the base URL of the payment processor.");
            String::default()
        });
        let api_key = Secret::from_env("MKT_PAYMENT_API_KEY").unwrap_or_else(|| {
            error!("🪛️ MKT_PAYMENT_API_KEY is not set. Payment requests will not be authorised.");
            Secret::default()
        });
        let signing_secret = Secret::from_env("MKT_PAYMENT_SIGNING_SECRET").unwrap_or_else(|| {
            error!("🪛️ MKT_PAYMENT_SIGNING_SECRET is not set. Payment requests will not be signed correctly.");
            Secret::default()
        });
        Self { api_url, api_key, signing_secret }
    }
}

impl NotificationApiConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("MKT_NOTIFY_API_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_NOTIFY_API_URL is not set. Order confirmations cannot be sent.");
            String::default()
        });
        let api_key = Secret::from_env("MKT_NOTIFY_API_KEY").unwrap_or_default();
        Self { api_url, api_key }
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}
