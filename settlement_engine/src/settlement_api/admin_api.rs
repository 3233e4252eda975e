//! Operations that change state outside of settlement.
use std::fmt::Debug;

use log::*;
use thiserror::Error;

use crate::{
    db_types::{ExchangeRate, InventoryRecord, Order, OrderId, OrderStatusType, ProductId},
    events::{EventProducers, OrderStatusChangedEvent},
    traits::{ExchangeRateError, ExchangeRates, InventoryManagement, SettlementStore, StoreError},
};

#[derive(Debug, Clone, Error)]
pub enum AdminApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    ExchangeRate(#[from] ExchangeRateError),
}

pub struct AdminApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for AdminApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AdminApi")
    }
}

impl<B> AdminApi<B>
where B: SettlementStore + InventoryManagement + ExchangeRates
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    /// Adds stock for a product. The quantity must be positive.
    pub async fn restock(&self, product_id: &ProductId, quantity: u32) -> Result<InventoryRecord, AdminApiError> {
        if product_id.is_blank() {
            return Err(AdminApiError::InvalidRequest("product_id is required".into()));
        }
        if quantity == 0 {
            return Err(AdminApiError::InvalidRequest("restock quantity must be positive".into()));
        }
        Ok(self.db.restock(product_id, quantity).await?)
    }

    pub async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), AdminApiError> {
        let code = rate.currency.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(AdminApiError::InvalidRequest(format!("'{}' is not an upper-case currency code", rate.currency)));
        }
        if rate.rate <= 0 {
            return Err(AdminApiError::InvalidRequest("exchange rates must be positive".into()));
        }
        self.db.set_exchange_rate(rate).await?;
        Ok(())
    }

    /// Moves an order along the fulfilment workflow:
    /// `pending-approval → shipped → delivered`, or `pending-approval | shipped → cancelled`.
    ///
    /// Any other transition, including setting the status the order already has, is an error.
    pub async fn update_order_status(&self, order_id: &OrderId, status: OrderStatusType) -> Result<Order, AdminApiError> {
        let (old, new) = self.db.update_order_status(order_id, status).await?;
        debug!("📦️ Order {order_id} is now {}", new.status);
        self.producers.publish_status_changed(OrderStatusChangedEvent::new(new.clone(), old.status)).await;
        Ok(new)
    }
}
