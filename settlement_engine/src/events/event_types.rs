use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, ShippingContact};

/// Published once for every sub-order a checkout settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSettledEvent {
    pub order: Order,
    /// Where the confirmation for this order should go.
    pub contact: ShippingContact,
}

impl OrderSettledEvent {
    pub fn new(order: Order, contact: ShippingContact) -> Self {
        Self { order, contact }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType) -> Self {
        Self { order, old_status }
    }
}

#[derive(Debug, Clone)]
pub enum EventType {
    OrderSettled(OrderSettledEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
}
