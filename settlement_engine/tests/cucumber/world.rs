use cucumber::World;
use mkt_common::Money;
use settlement_engine::{db_types::CartItem, CheckoutError, CheckoutOutcome};

use crate::support::Marketplace;

#[derive(Default, Debug, World)]
pub struct MarketWorld {
    pub system: Option<Marketplace>,
    pub cart: Vec<CartItem>,
    pub currency: Option<String>,
    pub results: Vec<Result<CheckoutOutcome, CheckoutError>>,
}

impl MarketWorld {
    pub fn market(&self) -> &Marketplace {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn last_result(&self) -> &Result<CheckoutOutcome, CheckoutError> {
        self.results.last().expect("No checkout has been submitted")
    }

    pub fn last_outcome(&self) -> &CheckoutOutcome {
        match self.last_result() {
            Ok(outcome) => outcome,
            Err(e) => panic!("Checkout failed: {e}"),
        }
    }
}

/// Parses "1000.00" or "72.5" or "12" as an amount with two decimal places.
pub fn parse_money(s: &str) -> Money {
    let (whole, frac) = s.split_once('.').unwrap_or((s, "0"));
    let whole = whole.parse::<i64>().expect("Invalid amount");
    let frac = format!("{frac:0<2}");
    let cents = frac[..2].parse::<i64>().expect("Invalid amount");
    Money::from(whole * 100 + cents)
}
