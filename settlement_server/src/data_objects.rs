use std::fmt::Display;

use serde::{Deserialize, Serialize};
use settlement_engine::db_types::{ExchangeRate, OrderStatusType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

/// `rate` is the number of `currency` units per canonical unit, multiplied by 1,000,000.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRateUpdate {
    pub currency: String,
    pub rate: i64,
    #[serde(default = "default_decimals")]
    pub decimals: i64,
}

fn default_decimals() -> i64 {
    2
}

impl From<ExchangeRateUpdate> for ExchangeRate {
    fn from(update: ExchangeRateUpdate) -> Self {
        ExchangeRate::new(update.currency.trim().to_string(), update.rate, update.decimals)
    }
}
