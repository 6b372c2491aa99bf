use async_trait::async_trait;

use crate::equipment::equipment_model::{
    Equipment, LogisticsCost, NewEquipment, NewLogisticsCost, NewPurchasePrice, PurchasePrice,
};
use crate::errors::Result;

/// Data access for catalog equipment and its purchase and logistics records.
#[async_trait]
pub trait EquipmentRepositoryTrait: Send + Sync {
    fn get_equipment(&self, equipment_id: &str) -> Result<Equipment>;

    /// Fetches an explicitly requested purchase price. The record must be
    /// active and belong to the given equipment, otherwise this is an error.
    fn get_purchase_price(&self, price_id: &str, equipment_id: &str) -> Result<PurchasePrice>;

    /// Most recently created active purchase price, if any.
    fn get_latest_active_purchase_price(&self, equipment_id: &str)
        -> Result<Option<PurchasePrice>>;

    /// Fetches an explicitly requested logistics record. The record must be
    /// active and belong to the given equipment, otherwise this is an error.
    fn get_logistics_cost(&self, logistics_id: &str, equipment_id: &str) -> Result<LogisticsCost>;

    /// Active non-warehouse logistics records, newest first.
    fn get_active_logistics(&self, equipment_id: &str) -> Result<Vec<LogisticsCost>>;

    /// Most recently created active warehouse record, if any.
    fn get_warehouse_cost(&self, equipment_id: &str) -> Result<Option<LogisticsCost>>;

    async fn create_equipment(&self, new_equipment: NewEquipment) -> Result<Equipment>;

    async fn add_purchase_price(&self, new_price: NewPurchasePrice) -> Result<PurchasePrice>;

    async fn add_logistics_cost(&self, new_cost: NewLogisticsCost) -> Result<LogisticsCost>;

    async fn deactivate_purchase_price(&self, price_id: &str) -> Result<()>;

    async fn deactivate_logistics_cost(&self, logistics_id: &str) -> Result<()>;
}
