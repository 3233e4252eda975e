use chrono::Utc;
use log::debug;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{CheckoutId, Order, OrderId, OrderStatusType},
    traits::{PlannedOrder, SettlementPlan},
};

/// Inserts one sub-order of the plan. Not atomic on its own: pass `&mut tx` to embed it in a transaction.
///
/// A second order for the same checkout and seller violates the `(checkout_id, seller_id)` unique key.
pub async fn insert_order(
    plan: &SettlementPlan,
    order: &PlannedOrder,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let now = Utc::now();
    let result: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                id,
                checkout_id,
                buyer_id,
                seller_id,
                items,
                subtotal,
                handling_fee,
                buyer_protection_fee,
                tax_fee,
                admin_amount,
                seller_amount,
                currency,
                charge_amount,
                charge_currency,
                payment_reference,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *;
        "#,
    )
    .bind(&order.order_id)
    .bind(&plan.checkout_id)
    .bind(&plan.buyer_id)
    .bind(&order.seller_id)
    .bind(Json(&order.items))
    .bind(order.subtotal)
    .bind(order.fees.handling_fee)
    .bind(order.fees.buyer_protection_fee)
    .bind(order.fees.tax_fee)
    .bind(order.admin_amount())
    .bind(order.seller_amount())
    .bind(&plan.currency)
    .bind(order.charge_amount)
    .bind(&plan.charge_currency)
    .bind(&plan.payment_reference)
    .bind(OrderStatusType::PendingApproval)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order [{}] inserted for seller {}", result.id, result.seller_id);
    Ok(result)
}

/// All orders for the checkout, in the order they were created.
pub async fn fetch_orders_for_checkout(
    checkout_id: &CheckoutId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE checkout_id = $1 ORDER BY rowid ASC")
        .bind(checkout_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await
}

/// Sets the order status without checking whether the transition is allowed. Callers do that.
pub async fn update_order_status(
    order_id: &OrderId,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(status)
        .bind(Utc::now())
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}
