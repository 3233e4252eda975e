use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::db_types::{CheckoutId, PaymentAttempt, PaymentAttemptStatus};

pub async fn fetch_attempt(
    checkout_id: &CheckoutId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentAttempt>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_attempts WHERE checkout_id = $1").bind(checkout_id).fetch_optional(conn).await
}

/// Saves the outcome unless one is already recorded for the checkout. Returns whatever is recorded afterwards.
pub async fn record_attempt(attempt: &PaymentAttempt, conn: &mut SqliteConnection) -> Result<PaymentAttempt, sqlx::Error> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO payment_attempts (checkout_id, status, reference, amount, currency, reason, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (checkout_id) DO NOTHING
        "#,
    )
    .bind(&attempt.checkout_id)
    .bind(attempt.status)
    .bind(&attempt.reference)
    .bind(attempt.amount)
    .bind(&attempt.currency)
    .bind(&attempt.reason)
    .bind(attempt.updated_at)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if inserted == 0 {
        warn!("💳 A payment outcome for checkout {} was already recorded. Keeping the original.", attempt.checkout_id);
    }
    let recorded = sqlx::query_as("SELECT * FROM payment_attempts WHERE checkout_id = $1")
        .bind(&attempt.checkout_id)
        .fetch_one(conn)
        .await?;
    Ok(recorded)
}

/// Flags a successful payment as refunded. Returns `false` if there was no successful payment to flag.
pub async fn mark_refunded(
    checkout_id: &CheckoutId,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE payment_attempts SET status = $1, reason = $2, updated_at = $3 WHERE checkout_id = $4 AND status = $5",
    )
    .bind(PaymentAttemptStatus::Refunded)
    .bind(reason)
    .bind(Utc::now())
    .bind(checkout_id)
    .bind(PaymentAttemptStatus::Succeeded)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
