use chrono::Utc;
use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{InventoryRecord, ProductId},
    traits::StoreError,
};

pub async fn fetch_inventory(
    product_id: &ProductId,
    conn: &mut SqliteConnection,
) -> Result<Option<InventoryRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM inventory WHERE product_id = $1").bind(product_id).fetch_optional(conn).await
}

/// Fetches the inventory records for all the given products in one query. Unknown products are left out.
pub async fn fetch_stock_levels(
    products: &[ProductId],
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryRecord>, sqlx::Error> {
    if products.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM inventory WHERE product_id IN (");
    let mut ids = builder.separated(", ");
    for product in products {
        ids.push_bind(product.as_str());
    }
    ids.push_unseparated(")");
    builder.build_query_as().fetch_all(conn).await
}

/// Takes `quantity` units out of stock, provided that nobody has touched the record since `seen` was read and that
/// enough stock remains.
///
/// Either condition failing means a concurrent checkout won the race, and [`StoreError::Conflict`] is returned.
pub async fn decrement_stock(
    seen: &InventoryRecord,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE inventory SET stock = stock - $1, version = version + 1, updated_at = $2
        WHERE product_id = $3 AND version = $4 AND stock >= $1
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(&seen.product_id)
    .bind(seen.version)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        debug!("🗃️ Inventory for {} changed under us (expected version {})", seen.product_id, seen.version);
        return Err(StoreError::Conflict(format!("inventory for {} was modified concurrently", seen.product_id)));
    }
    trace!("🗃️ Took {quantity} units of {} out of stock", seen.product_id);
    Ok(())
}

/// Adds stock, creating the inventory record if it does not exist yet.
pub async fn restock(
    product_id: &ProductId,
    quantity: u32,
    conn: &mut SqliteConnection,
) -> Result<InventoryRecord, sqlx::Error> {
    let record: InventoryRecord = sqlx::query_as(
        r#"
        INSERT INTO inventory (product_id, stock, version, updated_at) VALUES ($1, $2, 1, $3)
        ON CONFLICT (product_id) DO UPDATE SET
            stock = stock + excluded.stock,
            version = version + 1,
            updated_at = excluded.updated_at
        RETURNING *
        "#,
    )
    .bind(product_id)
    .bind(i64::from(quantity))
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    info!("🗃️ Restocked {product_id} with {quantity} units. Stock is now {}", record.stock);
    Ok(record)
}
