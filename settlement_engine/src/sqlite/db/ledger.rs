use chrono::Utc;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{CheckoutId, LedgerEntry, SellerId, LEDGER_STATUS_COMPLETED},
    traits::{PlannedOrder, SettlementPlan},
};

pub async fn insert_entry(
    plan: &SettlementPlan,
    order: &PlannedOrder,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO ledger (
            checkout_id,
            order_id,
            buyer_id,
            seller_id,
            product_ids,
            amount,
            seller_amount,
            admin_fees,
            currency,
            status,
            payment_reference,
            created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(&plan.checkout_id)
    .bind(&order.order_id)
    .bind(&plan.buyer_id)
    .bind(&order.seller_id)
    .bind(Json(order.product_ids()))
    .bind(order.subtotal)
    .bind(order.seller_amount())
    .bind(order.admin_amount())
    .bind(&plan.currency)
    .bind(LEDGER_STATUS_COMPLETED)
    .bind(&plan.payment_reference)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

pub async fn fetch_for_seller(seller_id: &SellerId, conn: &mut SqliteConnection) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM ledger WHERE seller_id = $1 ORDER BY id ASC").bind(seller_id).fetch_all(conn).await
}

pub async fn fetch_for_checkout(
    checkout_id: &CheckoutId,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM ledger WHERE checkout_id = $1 ORDER BY id ASC").bind(checkout_id).fetch_all(conn).await
}
