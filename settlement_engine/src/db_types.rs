use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
pub use mkt_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

/// The status written to every ledger entry created by settlement.
pub const LEDGER_STATUS_COMPLETED: &str = "completed";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// The caller-supplied idempotency token for one checkout attempt.
    CheckoutId
);
string_id!(SellerId);
string_id!(ProductId);
string_id!(
    /// Order ids are derived from the checkout and the seller: `{checkout_id}-{seller_id}`.
    OrderId
);

impl OrderId {
    pub fn for_partition(checkout_id: &CheckoutId, seller_id: &SellerId) -> Self {
        Self(format!("{checkout_id}-{seller_id}"))
    }
}

//--------------------------------------      CartItem       ---------------------------------------------------------
/// A line in the buyer's cart. Prices are in the canonical currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    /// Optional on the wire so that items without a seller can be detected and rejected.
    #[serde(default)]
    pub seller_id: Option<SellerId>,
    pub quantity: u32,
    pub unit_price: Money,
    pub category: String,
}

impl CartItem {
    pub fn new<P, S, C>(product_id: P, seller_id: S, quantity: u32, unit_price: Money, category: C) -> Self
    where
        P: Into<ProductId>,
        S: Into<SellerId>,
        C: Into<String>,
    {
        Self {
            product_id: product_id.into(),
            seller_id: Some(seller_id.into()),
            quantity,
            unit_price,
            category: category.into(),
        }
    }

    pub fn without_seller(mut self) -> Self {
        self.seller_id = None;
        self
    }

    /// `None` if the line total does not fit in a [`Money`] amount.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

//--------------------------------------   ShippingContact   ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingContact {
    pub name: String,
    pub address: String,
    pub email: String,
}

impl ShippingContact {
    pub fn new<S: Into<String>>(name: S, address: S, email: S) -> Self {
        Self { name: name.into(), address: address.into(), email: email.into() }
    }

    /// The fields that are blank, by name.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [("name", &self.name), ("address", &self.address), ("email", &self.email)]
            .into_iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| k)
            .collect()
    }
}

//--------------------------------------      OrderItem      ---------------------------------------------------------
/// A cart line after it has been assigned to its seller's order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub category: String,
}

impl OrderItem {
    /// Saturates rather than overflowing. The partitioner rejects carts whose totals do not fit, so items of a
    /// settled order never reach the limit.
    pub fn line_total(&self) -> Money {
        self.unit_price.saturating_mul(i64::from(self.quantity))
    }
}

impl From<&CartItem> for OrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            category: item.category.clone(),
        }
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatusType {
    /// The order was settled and is waiting for the seller to accept and ship it.
    PendingApproval,
    /// The seller has shipped the order.
    Shipped,
    /// The order has been delivered to the buyer.
    Delivered,
    /// The order was cancelled during fulfilment.
    Cancelled,
}

impl OrderStatusType {
    /// Whether the fulfilment workflow may move an order from `self` to `next`.
    pub fn can_transition_to(self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!((self, next), (PendingApproval, Shipped) | (Shipped, Delivered) | (PendingApproval | Shipped, Cancelled))
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::PendingApproval => write!(f, "pending-approval"),
            OrderStatusType::Shipped => write!(f, "shipped"),
            OrderStatusType::Delivered => write!(f, "delivered"),
            OrderStatusType::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to pending-approval");
            OrderStatusType::PendingApproval
        })
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending-approval" => Ok(Self::PendingApproval),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
/// One seller's share of a settled checkout.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub checkout_id: CheckoutId,
    pub buyer_id: String,
    pub seller_id: SellerId,
    pub items: Json<Vec<OrderItem>>,
    pub subtotal: Money,
    pub handling_fee: Money,
    pub buyer_protection_fee: Money,
    pub tax_fee: Money,
    pub admin_amount: Money,
    pub seller_amount: Money,
    /// The canonical currency that `subtotal` and the fee amounts are denominated in.
    pub currency: String,
    /// This order's share of the payment, in the buyer's charge currency.
    pub charge_amount: Money,
    pub charge_currency: String,
    pub payment_reference: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|i| i.product_id.clone()).collect()
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order {} ({} items) buyer: {}, seller: {}, subtotal: {} {}, seller amount: {}, status: {}",
            self.id,
            self.items.len(),
            self.buyer_id,
            self.seller_id,
            self.subtotal,
            self.currency,
            self.seller_amount,
            self.status
        )
    }
}

//--------------------------------------   InventoryRecord   ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    pub stock: i64,
    /// Bumped on every write. Conditional updates use it to detect lost races.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     WalletRecord    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletRecord {
    pub seller_id: SellerId,
    pub available_balance: Money,
    pub pending_balance: Money,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl WalletRecord {
    /// The state of a wallet that has never been credited.
    pub fn empty(seller_id: SellerId) -> Self {
        Self {
            seller_id,
            available_balance: Money::default(),
            pending_balance: Money::default(),
            version: 0,
            updated_at: Utc::now(),
        }
    }
}

//--------------------------------------     LedgerEntry     ---------------------------------------------------------
/// Append-only audit record of one seller's share of one settled checkout.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub checkout_id: CheckoutId,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub seller_id: SellerId,
    pub product_ids: Json<Vec<ProductId>>,
    /// The sub-order subtotal
    pub amount: Money,
    pub seller_amount: Money,
    pub admin_fees: Money,
    pub currency: String,
    pub status: String,
    pub payment_reference: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    CheckoutRecord   ---------------------------------------------------------
/// Totals for a settled checkout, reconciling the charge against the sub-orders.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CheckoutRecord {
    pub checkout_id: CheckoutId,
    pub buyer_id: String,
    pub subtotal: Money,
    pub admin_amount: Money,
    pub seller_amount: Money,
    pub currency: String,
    pub charge_amount: Money,
    pub charge_currency: String,
    /// Currency conversion drift (in charge currency minor units) that is assigned to the admin share.
    pub rounding_adjustment: Money,
    pub payment_reference: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    PaymentAttempt   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentAttemptStatus {
    Succeeded,
    Declined,
    /// The charge succeeded, but settlement was aborted and the buyer was refunded.
    Refunded,
}

impl Display for PaymentAttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentAttemptStatus::Succeeded => write!(f, "Succeeded"),
            PaymentAttemptStatus::Declined => write!(f, "Declined"),
            PaymentAttemptStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

/// The terminal outcome of charging a checkout. Once recorded, the processor is never called again for the checkout.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub checkout_id: CheckoutId,
    pub status: PaymentAttemptStatus,
    pub reference: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     ExchangeRate    ---------------------------------------------------------
/// Number of fractional digits in [`ExchangeRate::rate`].
pub const RATE_SCALE: i64 = 1_000_000;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub currency: String,
    /// Units of `currency` per one unit of the canonical currency, multiplied by [`RATE_SCALE`].
    pub rate: i64,
    /// The number of minor-unit digits of `currency` (2 for USD, 0 for JPY).
    pub decimals: i64,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new<S: Into<String>>(currency: S, rate: i64, decimals: i64) -> Self {
        Self { currency: currency.into(), rate, decimals, updated_at: Utc::now() }
    }

    /// A 1:1 rate for a currency with two decimal places.
    pub fn parity<S: Into<String>>(currency: S) -> Self {
        Self::new(currency, RATE_SCALE, 2)
    }
}

impl Display for ExchangeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.rate / RATE_SCALE;
        let frac = (self.rate % RATE_SCALE).abs();
        write!(f, "1 => {whole}.{frac:06} {}", self.currency)
    }
}
