use crate::{
    db_types::{InventoryRecord, ProductId},
    traits::StoreError,
};

#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    async fn fetch_inventory(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>, StoreError>;

    /// Adds `quantity` units to the product's stock, creating the record if needed. This is the only way stock goes
    /// up. Like every other inventory write, it bumps the version.
    async fn restock(&self, product_id: &ProductId, quantity: u32) -> Result<InventoryRecord, StoreError>;
}
