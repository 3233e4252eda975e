use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{CheckoutId, CheckoutRecord},
    traits::SettlementPlan,
};

pub async fn insert_checkout(plan: &SettlementPlan, conn: &mut SqliteConnection) -> Result<CheckoutRecord, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO checkouts (
            checkout_id,
            buyer_id,
            subtotal,
            admin_amount,
            seller_amount,
            currency,
            charge_amount,
            charge_currency,
            rounding_adjustment,
            payment_reference,
            created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(&plan.checkout_id)
    .bind(&plan.buyer_id)
    .bind(plan.subtotal())
    .bind(plan.admin_amount())
    .bind(plan.seller_amount())
    .bind(&plan.currency)
    .bind(plan.charge_amount)
    .bind(&plan.charge_currency)
    .bind(plan.rounding_adjustment)
    .bind(&plan.payment_reference)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

pub async fn fetch_checkout(
    checkout_id: &CheckoutId,
    conn: &mut SqliteConnection,
) -> Result<Option<CheckoutRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM checkouts WHERE checkout_id = $1").bind(checkout_id).fetch_optional(conn).await
}
