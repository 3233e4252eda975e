//! # Fee policy
//!
//! Every sub-order pays three marketplace fees out of its subtotal: a handling fee, a buyer-protection fee and tax.
//! Rates are configured per product category in basis points, with a default rate set for categories that have no
//! entry of their own.
//!
//! Rates are validated when a [`FeeSchedule`] is built. Each rate must be below 100% and the three rates together must
//! also stay below 100%, so that the seller's share of any subtotal is never negative.
use std::{collections::HashMap, fs, path::Path};

use log::*;
use mkt_common::{Money, BASIS_POINTS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::partitioner::SellerPartition;

#[derive(Debug, Clone, Error)]
pub enum FeePolicyError {
    #[error("The {rate} rate for '{category}' is {bps}bp, but must be below 10000bp")]
    RateOutOfRange { category: String, rate: &'static str, bps: u32 },
    #[error("The combined rates for '{category}' add up to {total}bp, but must be below 10000bp")]
    CombinedRateTooHigh { category: String, total: u32 },
    #[error("Could not read the fee schedule. {0}")]
    ReadError(String),
    #[error("Could not parse the fee schedule. {0}")]
    ParseError(String),
}

//--------------------------------------       FeeRates      ---------------------------------------------------------
/// The fee rates for one category, in basis points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRates {
    pub handling_bps: u32,
    pub buyer_protection_bps: u32,
    pub tax_bps: u32,
}

impl FeeRates {
    pub fn new(handling_bps: u32, buyer_protection_bps: u32, tax_bps: u32) -> Self {
        Self { handling_bps, buyer_protection_bps, tax_bps }
    }

    pub fn total_bps(&self) -> u32 {
        self.handling_bps.saturating_add(self.buyer_protection_bps).saturating_add(self.tax_bps)
    }

    fn validate(&self, category: &str) -> Result<(), FeePolicyError> {
        let rates = [
            ("handling", self.handling_bps),
            ("buyer protection", self.buyer_protection_bps),
            ("tax", self.tax_bps),
        ];
        for (rate, bps) in rates {
            if bps >= BASIS_POINTS {
                return Err(FeePolicyError::RateOutOfRange { category: category.to_string(), rate, bps });
            }
        }
        let total = self.total_bps();
        if total >= BASIS_POINTS {
            return Err(FeePolicyError::CombinedRateTooHigh { category: category.to_string(), total });
        }
        Ok(())
    }

    /// Applies the rates to `subtotal`, rounding each fee half-up to the nearest minor unit.
    pub fn apply(&self, subtotal: Money) -> FeeBreakdown {
        FeeBreakdown {
            handling_fee: subtotal.apply_bps(self.handling_bps),
            buyer_protection_fee: subtotal.apply_bps(self.buyer_protection_bps),
            tax_fee: subtotal.apply_bps(self.tax_bps),
        }
    }
}

//--------------------------------------     FeeBreakdown    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub handling_fee: Money,
    pub buyer_protection_fee: Money,
    pub tax_fee: Money,
}

impl FeeBreakdown {
    /// The marketplace's share: the sum of all the fees.
    pub fn admin_amount(&self) -> Money {
        self.handling_fee + self.buyer_protection_fee + self.tax_fee
    }

    /// The seller's share of `subtotal` once the fees have been taken out.
    pub fn seller_amount(&self, subtotal: Money) -> Money {
        subtotal - self.admin_amount()
    }
}

impl std::ops::Add for FeeBreakdown {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            handling_fee: self.handling_fee + rhs.handling_fee,
            buyer_protection_fee: self.buyer_protection_fee + rhs.buyer_protection_fee,
            tax_fee: self.tax_fee + rhs.tax_fee,
        }
    }
}

//--------------------------------------     FeeSchedule     ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
struct FeeScheduleFile {
    default: FeeRates,
    #[serde(default)]
    categories: HashMap<String, FeeRates>,
}

/// A validated set of fee rates, keyed by category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeSchedule {
    default: FeeRates,
    categories: HashMap<String, FeeRates>,
}

impl Default for FeeSchedule {
    /// The rates the marketplace has always charged: 5% handling, 2% buyer protection and 7.5% tax.
    fn default() -> Self {
        Self { default: FeeRates::new(500, 200, 750), categories: HashMap::new() }
    }
}

impl FeeSchedule {
    pub fn new(default: FeeRates) -> Result<Self, FeePolicyError> {
        default.validate("default")?;
        Ok(Self { default, categories: HashMap::new() })
    }

    pub fn with_category<S: Into<String>>(mut self, category: S, rates: FeeRates) -> Result<Self, FeePolicyError> {
        let category = category.into();
        rates.validate(&category)?;
        self.categories.insert(category, rates);
        Ok(self)
    }

    /// Parses and validates a schedule of the form
    /// `{ "default": { "handling_bps": 500, ... }, "categories": { "books": { ... } } }`.
    pub fn from_json(json: &str) -> Result<Self, FeePolicyError> {
        let file: FeeScheduleFile = serde_json::from_str(json).map_err(|e| FeePolicyError::ParseError(e.to_string()))?;
        file.categories.into_iter().try_fold(Self::new(file.default)?, |schedule, (category, rates)| {
            schedule.with_category(category, rates)
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FeePolicyError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| FeePolicyError::ReadError(format!("{}: {e}", path.display())))?;
        let schedule = Self::from_json(&json)?;
        info!("🧾 Loaded fee schedule with {} category overrides from {}", schedule.categories.len(), path.display());
        Ok(schedule)
    }

    pub fn rates_for(&self, category: &str) -> &FeeRates {
        self.categories.get(category).unwrap_or_else(|| {
            trace!("🧾 No fee rates for category '{category}'. Using the default rates.");
            &self.default
        })
    }

    /// Computes the fees owed on `subtotal` for goods in `category`. Never fails.
    pub fn compute_fees(&self, subtotal: Money, category: &str) -> FeeBreakdown {
        self.rates_for(category).apply(subtotal)
    }

    /// Computes the fees for a whole seller partition.
    ///
    /// Items are grouped by category and each group is charged its own category's rates, so a partition that mixes
    /// categories is never charged the rates of whichever item happened to come first.
    pub fn fees_for_partition(&self, partition: &SellerPartition) -> FeeBreakdown {
        let mut by_category: Vec<(&str, Money)> = Vec::new();
        for item in &partition.items {
            match by_category.iter_mut().find(|(c, _)| *c == item.category.as_str()) {
                Some((_, subtotal)) => *subtotal += item.line_total(),
                None => by_category.push((item.category.as_str(), item.line_total())),
            }
        }
        by_category
            .into_iter()
            .map(|(category, subtotal)| self.compute_fees(subtotal, category))
            .fold(FeeBreakdown::default(), |acc, fees| acc + fees)
    }
}
