//! Splits a cart into one partition per seller.
//!
//! A checkout can span several independent sellers. Each seller gets its own sub-order, fees and wallet credit, so the
//! cart is grouped by seller before anything else happens. Partitioning is pure and deterministic: partitions appear in
//! the order in which their seller is first seen in the cart, and items keep their cart order.
use log::*;
use mkt_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{CartItem, OrderItem, ProductId, SellerId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("The cart is empty")]
    EmptyCart,
    #[error("Product {product_id} is not associated with a seller")]
    MissingSeller { product_id: ProductId },
    #[error("Product {product_id} has a quantity of zero")]
    InvalidQuantity { product_id: ProductId },
    #[error("Product {product_id} has a negative unit price")]
    InvalidPrice { product_id: ProductId },
    #[error("The cart total is too large to be charged (at product {product_id})")]
    AmountOverflow { product_id: ProductId },
}

/// The subset of a cart belonging to one seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerPartition {
    pub seller_id: SellerId,
    pub items: Vec<OrderItem>,
    /// Σ unit_price × quantity over `items`
    pub subtotal: Money,
}

impl SellerPartition {
    fn new(seller_id: SellerId) -> Self {
        Self { seller_id, items: Vec::new(), subtotal: Money::default() }
    }

    fn push(&mut self, item: OrderItem, line_total: Money) -> Option<()> {
        self.subtotal = self.subtotal.checked_add(line_total)?;
        self.items.push(item);
        Some(())
    }
}

/// Groups `cart` by seller.
///
/// Every item must name its seller. An item without one is an error rather than being assigned to some default
/// seller, since that would credit the wrong wallet.
///
/// Line totals, partition subtotals and the cart total must all fit in a [`Money`] amount. Otherwise the cart is
/// rejected with [`PartitionError::AmountOverflow`].
pub fn partition(cart: &[CartItem]) -> Result<Vec<SellerPartition>, PartitionError> {
    if cart.is_empty() {
        return Err(PartitionError::EmptyCart);
    }
    let mut partitions: Vec<SellerPartition> = Vec::new();
    let mut cart_total = Money::default();
    for item in cart {
        let seller_id = match &item.seller_id {
            Some(s) if !s.is_blank() => s,
            _ => {
                warn!("🧾 Product {} has no seller. Rejecting the cart.", item.product_id);
                return Err(PartitionError::MissingSeller { product_id: item.product_id.clone() });
            },
        };
        if item.quantity == 0 {
            return Err(PartitionError::InvalidQuantity { product_id: item.product_id.clone() });
        }
        if item.unit_price.is_negative() {
            return Err(PartitionError::InvalidPrice { product_id: item.product_id.clone() });
        }
        let overflow = || {
            warn!("🧾 The cart total overflows at product {}. Rejecting the cart.", item.product_id);
            PartitionError::AmountOverflow { product_id: item.product_id.clone() }
        };
        let line_total = item.line_total().ok_or_else(overflow)?;
        cart_total = cart_total.checked_add(line_total).ok_or_else(overflow)?;
        let index = match partitions.iter().position(|p| &p.seller_id == seller_id) {
            Some(i) => i,
            None => {
                partitions.push(SellerPartition::new(seller_id.clone()));
                partitions.len() - 1
            },
        };
        if let Some(p) = partitions.get_mut(index) {
            // Cannot fail once the cart total fits
            p.push(OrderItem::from(item), line_total).ok_or_else(overflow)?;
        }
    }
    trace!("🧾 Cart of {} items split into {} seller partitions", cart.len(), partitions.len());
    Ok(partitions)
}
