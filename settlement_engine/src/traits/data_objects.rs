use std::fmt::Display;

use mkt_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{CheckoutId, InventoryRecord, Order, OrderId, OrderItem, ProductId, SellerId},
    fee_policy::FeeBreakdown,
};

/// One sub-order, fully priced, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedOrder {
    pub order_id: OrderId,
    pub seller_id: SellerId,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub fees: FeeBreakdown,
    /// This order's share of the charge, in the charge currency.
    pub charge_amount: Money,
}

impl PlannedOrder {
    pub fn admin_amount(&self) -> Money {
        self.fees.admin_amount()
    }

    pub fn seller_amount(&self) -> Money {
        self.fees.seller_amount(self.subtotal)
    }

    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|i| i.product_id.clone()).collect()
    }
}

/// Everything the store needs to commit a checkout in one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub checkout_id: CheckoutId,
    pub buyer_id: String,
    /// The canonical currency of the subtotals and fees
    pub currency: String,
    pub charge_amount: Money,
    pub charge_currency: String,
    /// `charge_amount` minus the sum of the orders' charge amounts. Assigned to the marketplace.
    pub rounding_adjustment: Money,
    pub payment_reference: String,
    pub orders: Vec<PlannedOrder>,
}

impl SettlementPlan {
    /// The quantity of every product in the plan, summed across all orders, in order of first appearance.
    pub fn quantities(&self) -> Vec<(ProductId, i64)> {
        aggregate_quantities(self.orders.iter().flat_map(|o| o.items.iter()))
    }

    pub fn product_ids(&self) -> Vec<ProductId> {
        self.quantities().into_iter().map(|(p, _)| p).collect()
    }

    pub fn subtotal(&self) -> Money {
        self.orders.iter().map(|o| o.subtotal).sum()
    }

    pub fn admin_amount(&self) -> Money {
        self.orders.iter().map(PlannedOrder::admin_amount).sum()
    }

    pub fn seller_amount(&self) -> Money {
        self.orders.iter().map(PlannedOrder::seller_amount).sum()
    }
}

/// Sums the quantity per product, keeping products in order of first appearance.
pub fn aggregate_quantities<'a, I>(items: I) -> Vec<(ProductId, i64)>
where I: IntoIterator<Item = &'a OrderItem> {
    let mut result: Vec<(ProductId, i64)> = Vec::new();
    for item in items {
        match result.iter_mut().find(|(p, _)| p == &item.product_id) {
            Some((_, qty)) => *qty += i64::from(item.quantity),
            None => result.push((item.product_id.clone(), i64::from(item.quantity))),
        }
    }
    result
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub product_id: ProductId,
    pub requested: i64,
    pub available: i64,
}

impl Display for StockShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (requested {}, available {})", self.product_id, self.requested, self.available)
    }
}

/// Compares the requested quantities against the stock that is on hand. Products with no inventory record have no stock.
pub fn find_shortfalls(requested: &[(ProductId, i64)], stock: &[InventoryRecord]) -> Vec<StockShortfall> {
    requested
        .iter()
        .filter_map(|(product_id, qty)| {
            let available = stock.iter().find(|r| &r.product_id == product_id).map(|r| r.stock).unwrap_or(0);
            (available < *qty).then(|| StockShortfall { product_id: product_id.clone(), requested: *qty, available })
        })
        .collect()
}

/// The result of trying to commit a [`SettlementPlan`].
#[derive(Debug, Clone)]
pub enum CommitOutcome {
    /// The plan was written. These are the new orders.
    Settled(Vec<Order>),
    /// The checkout had already been settled. Nothing was written.
    AlreadySettled(Vec<Order>),
    /// At least one product no longer has enough stock. Nothing was written.
    InsufficientStock(Vec<StockShortfall>),
}
