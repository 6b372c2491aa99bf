use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;

use crate::constants::ROUTE_WAREHOUSE;
use crate::db::{get_connection, DbPool};
use crate::equipment::equipment_errors::EquipmentError;
use crate::equipment::equipment_model::{
    Equipment, EquipmentDB, LogisticsCost, LogisticsCostDB, NewEquipment, NewLogisticsCost,
    NewPurchasePrice, PurchasePrice, PurchasePriceDB,
};
use crate::equipment::equipment_traits::EquipmentRepositoryTrait;
use crate::errors::{Error, Result};

pub struct EquipmentRepository {
    pool: Arc<DbPool>,
}

impl EquipmentRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        EquipmentRepository { pool }
    }
}

#[async_trait]
impl EquipmentRepositoryTrait for EquipmentRepository {
    fn get_equipment(&self, item_id: &str) -> Result<Equipment> {
        use crate::schema::equipment::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let row = equipment
            .find(item_id)
            .first::<EquipmentDB>(&mut conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => Error::Equipment(EquipmentError::NotFound(
                    format!("Equipment with id {} not found", item_id),
                )),
                e => Error::from(e),
            })?;
        Ok(Equipment::from(row))
    }

    fn get_purchase_price(&self, price_id: &str, owner_id: &str) -> Result<PurchasePrice> {
        use crate::schema::purchase_prices::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let row = purchase_prices
            .filter(id.eq(price_id))
            .filter(equipment_id.eq(owner_id))
            .filter(is_active.eq(true))
            .first::<PurchasePriceDB>(&mut conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    Error::Equipment(EquipmentError::PurchasePriceNotFound(format!(
                        "Purchase price with id {} not found for equipment {}",
                        price_id, owner_id
                    )))
                }
                e => Error::from(e),
            })?;
        Ok(PurchasePrice::from(row))
    }

    fn get_latest_active_purchase_price(
        &self,
        owner_id: &str,
    ) -> Result<Option<PurchasePrice>> {
        use crate::schema::purchase_prices::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let row = purchase_prices
            .filter(equipment_id.eq(owner_id))
            .filter(is_active.eq(true))
            .order(created_at.desc())
            .first::<PurchasePriceDB>(&mut conn)
            .optional()?;
        Ok(row.map(PurchasePrice::from))
    }

    fn get_logistics_cost(&self, logistics_id: &str, owner_id: &str) -> Result<LogisticsCost> {
        use crate::schema::logistics_costs::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let row = logistics_costs
            .filter(id.eq(logistics_id))
            .filter(equipment_id.eq(owner_id))
            .filter(is_active.eq(true))
            .first::<LogisticsCostDB>(&mut conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    Error::Equipment(EquipmentError::LogisticsNotFound(format!(
                        "Logistics cost with id {} not found for equipment {}",
                        logistics_id, owner_id
                    )))
                }
                e => Error::from(e),
            })?;
        Ok(LogisticsCost::from(row))
    }

    fn get_active_logistics(&self, owner_id: &str) -> Result<Vec<LogisticsCost>> {
        use crate::schema::logistics_costs::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let rows = logistics_costs
            .filter(equipment_id.eq(owner_id))
            .filter(is_active.eq(true))
            .filter(route.ne(ROUTE_WAREHOUSE))
            .order(created_at.desc())
            .load::<LogisticsCostDB>(&mut conn)?;
        Ok(rows.into_iter().map(LogisticsCost::from).collect())
    }

    fn get_warehouse_cost(&self, owner_id: &str) -> Result<Option<LogisticsCost>> {
        use crate::schema::logistics_costs::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let row = logistics_costs
            .filter(equipment_id.eq(owner_id))
            .filter(is_active.eq(true))
            .filter(route.eq(ROUTE_WAREHOUSE))
            .order(created_at.desc())
            .first::<LogisticsCostDB>(&mut conn)
            .optional()?;
        Ok(row.map(LogisticsCost::from))
    }

    async fn create_equipment(&self, new_equipment: NewEquipment) -> Result<Equipment> {
        use crate::schema::equipment::dsl::*;
        new_equipment.validate()?;
        let mut conn = get_connection(&self.pool)?;
        let item = new_equipment.into_equipment();
        diesel::insert_into(equipment)
            .values(&EquipmentDB::from(&item))
            .execute(&mut conn)?;
        Ok(item)
    }

    async fn add_purchase_price(&self, new_price: NewPurchasePrice) -> Result<PurchasePrice> {
        use crate::schema::purchase_prices::dsl::*;
        new_price.validate()?;
        let mut conn = get_connection(&self.pool)?;
        let price_record = new_price.into_price();
        diesel::insert_into(purchase_prices)
            .values(&PurchasePriceDB::from(&price_record))
            .execute(&mut conn)?;
        Ok(price_record)
    }

    async fn add_logistics_cost(&self, new_cost: NewLogisticsCost) -> Result<LogisticsCost> {
        use crate::schema::logistics_costs::dsl::*;
        new_cost.validate()?;
        let mut conn = get_connection(&self.pool)?;
        let cost_record = new_cost.into_cost();
        diesel::insert_into(logistics_costs)
            .values(&LogisticsCostDB::from(&cost_record))
            .execute(&mut conn)?;
        Ok(cost_record)
    }

    async fn deactivate_purchase_price(&self, price_id: &str) -> Result<()> {
        use crate::schema::purchase_prices::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let affected = diesel::update(purchase_prices.filter(id.eq(price_id)))
            .set((is_active.eq(false), updated_at.eq(Utc::now().naive_utc())))
            .execute(&mut conn)?;
        if affected == 0 {
            return Err(Error::Equipment(EquipmentError::PurchasePriceNotFound(
                format!("Purchase price with id {} not found", price_id),
            )));
        }
        Ok(())
    }

    async fn deactivate_logistics_cost(&self, logistics_id: &str) -> Result<()> {
        use crate::schema::logistics_costs::dsl::*;
        let mut conn = get_connection(&self.pool)?;
        let affected = diesel::update(logistics_costs.filter(id.eq(logistics_id)))
            .set((is_active.eq(false), updated_at.eq(Utc::now().naive_utc())))
            .execute(&mut conn)?;
        if affected == 0 {
            return Err(Error::Equipment(EquipmentError::LogisticsNotFound(format!(
                "Logistics cost with id {} not found",
                logistics_id
            ))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations};
    use crate::equipment::equipment_model::{PriceSource, RouteType};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn setup_pool() -> (Arc<DbPool>, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_str()
            .expect("Invalid path")
            .to_string();
        let pool = create_pool(&db_path).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        (pool, temp_dir)
    }

    async fn seed_equipment(repo: &EquipmentRepository, name: &str) -> Equipment {
        repo.create_equipment(NewEquipment {
            id: None,
            name: name.to_string(),
            sku: None,
            unit: "pcs".to_string(),
            description: None,
            manufacture_price: None,
            manufacture_currency: None,
            sale_price: None,
        })
        .await
        .expect("Failed to create equipment")
    }

    #[tokio::test]
    async fn test_get_equipment_not_found() {
        let (pool, _guard) = setup_pool();
        let repo = EquipmentRepository::new(pool);

        let result = repo.get_equipment("missing");
        assert!(matches!(
            result,
            Err(Error::Equipment(EquipmentError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_latest_active_purchase_price_prefers_newest() {
        let (pool, _guard) = setup_pool();
        let repo = EquipmentRepository::new(pool);
        let item = seed_equipment(&repo, "Pump").await;

        let older = repo
            .add_purchase_price(NewPurchasePrice {
                equipment_id: item.id.clone(),
                source: PriceSource::Foreign,
                price: dec!(100),
                currency: "USD".to_string(),
                notes: None,
            })
            .await
            .unwrap();
        let newer = repo
            .add_purchase_price(NewPurchasePrice {
                equipment_id: item.id.clone(),
                source: PriceSource::Foreign,
                price: dec!(120),
                currency: "USD".to_string(),
                notes: None,
            })
            .await
            .unwrap();

        let latest = repo
            .get_latest_active_purchase_price(&item.id)
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, newer.id);

        repo.deactivate_purchase_price(&newer.id).await.unwrap();
        let latest = repo
            .get_latest_active_purchase_price(&item.id)
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, older.id);
    }

    #[tokio::test]
    async fn test_explicit_purchase_price_must_be_active_and_owned() {
        let (pool, _guard) = setup_pool();
        let repo = EquipmentRepository::new(pool);
        let item = seed_equipment(&repo, "Pump").await;
        let other = seed_equipment(&repo, "Valve").await;

        let price = repo
            .add_purchase_price(NewPurchasePrice {
                equipment_id: item.id.clone(),
                source: PriceSource::Domestic,
                price: dec!(250),
                currency: "KZT".to_string(),
                notes: None,
            })
            .await
            .unwrap();

        assert!(repo.get_purchase_price(&price.id, &item.id).is_ok());

        let wrong_owner = repo.get_purchase_price(&price.id, &other.id);
        assert!(matches!(
            wrong_owner,
            Err(Error::Equipment(EquipmentError::PurchasePriceNotFound(_)))
        ));

        repo.deactivate_purchase_price(&price.id).await.unwrap();
        let inactive = repo.get_purchase_price(&price.id, &item.id);
        assert!(matches!(
            inactive,
            Err(Error::Equipment(EquipmentError::PurchasePriceNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_active_logistics_excludes_warehouse_and_orders_newest_first() {
        let (pool, _guard) = setup_pool();
        let repo = EquipmentRepository::new(pool);
        let item = seed_equipment(&repo, "Pump").await;

        let domestic = repo
            .add_logistics_cost(NewLogisticsCost {
                equipment_id: item.id.clone(),
                route: RouteType::Domestic,
                cost: dec!(50),
                currency: "KZT".to_string(),
                notes: None,
            })
            .await
            .unwrap();
        let import = repo
            .add_logistics_cost(NewLogisticsCost {
                equipment_id: item.id.clone(),
                route: RouteType::Import,
                cost: dec!(900),
                currency: "USD".to_string(),
                notes: None,
            })
            .await
            .unwrap();
        let warehouse = repo
            .add_logistics_cost(NewLogisticsCost {
                equipment_id: item.id.clone(),
                route: RouteType::Warehouse,
                cost: dec!(30),
                currency: "KZT".to_string(),
                notes: None,
            })
            .await
            .unwrap();

        let active = repo.get_active_logistics(&item.id).unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, import.id);
        assert_eq!(active[1].id, domestic.id);

        let stored = repo.get_warehouse_cost(&item.id).unwrap().unwrap();
        assert_eq!(stored.id, warehouse.id);
        assert_eq!(stored.cost, dec!(30));
    }

    #[tokio::test]
    async fn test_new_price_validation() {
        let (pool, _guard) = setup_pool();
        let repo = EquipmentRepository::new(pool);
        let item = seed_equipment(&repo, "Pump").await;

        let negative = repo
            .add_purchase_price(NewPurchasePrice {
                equipment_id: item.id.clone(),
                source: PriceSource::Domestic,
                price: dec!(-10),
                currency: "KZT".to_string(),
                notes: None,
            })
            .await;
        assert!(negative.is_err());

        let bad_currency = repo
            .add_logistics_cost(NewLogisticsCost {
                equipment_id: item.id.clone(),
                route: RouteType::Import,
                cost: dec!(10),
                currency: "U2".to_string(),
                notes: None,
            })
            .await;
        assert!(bad_currency.is_err());
    }
}
