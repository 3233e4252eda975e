use chrono::Utc;
use log::*;
use mkt_common::Money;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{SellerId, WalletRecord},
    traits::StoreError,
};

pub async fn fetch_wallet(seller_id: &SellerId, conn: &mut SqliteConnection) -> Result<Option<WalletRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallets WHERE seller_id = $1").bind(seller_id).fetch_optional(conn).await
}

pub async fn fetch_wallets(sellers: &[SellerId], conn: &mut SqliteConnection) -> Result<Vec<WalletRecord>, sqlx::Error> {
    if sellers.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM wallets WHERE seller_id IN (");
    let mut ids = builder.separated(", ");
    for seller in sellers {
        ids.push_bind(seller.as_str());
    }
    ids.push_unseparated(")");
    builder.build_query_as().fetch_all(conn).await
}

/// Adds `amount` to the seller's available balance.
///
/// `seen` is the wallet as it was read earlier in the same transaction, or `None` if the seller had no wallet. An
/// existing wallet is only updated if its version still matches; a missing one is created. A concurrent writer makes
/// either of these fail, and [`StoreError::Conflict`] is returned.
pub async fn credit_wallet(
    seller_id: &SellerId,
    seen: Option<&WalletRecord>,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let now = Utc::now();
    match seen {
        Some(wallet) => {
            let result = sqlx::query(
                r#"
                UPDATE wallets SET available_balance = available_balance + $1, version = version + 1, updated_at = $2
                WHERE seller_id = $3 AND version = $4
                "#,
            )
            .bind(amount)
            .bind(now)
            .bind(seller_id)
            .bind(wallet.version)
            .execute(conn)
            .await?;
            if result.rows_affected() == 0 {
                debug!("🗃️ Wallet for {seller_id} changed under us (expected version {})", wallet.version);
                return Err(StoreError::Conflict(format!("wallet for {seller_id} was modified concurrently")));
            }
        },
        None => {
            // A concurrent first credit for the same seller trips the primary key and is reported as a conflict
            sqlx::query(
                r#"
                INSERT INTO wallets (seller_id, available_balance, pending_balance, version, updated_at)
                VALUES ($1, $2, 0, 1, $3)
                "#,
            )
            .bind(seller_id)
            .bind(amount)
            .bind(now)
            .execute(conn)
            .await?;
            debug!("🗃️ Created wallet for {seller_id}");
        },
    }
    trace!("🗃️ Credited {amount} to {seller_id}");
    Ok(())
}
