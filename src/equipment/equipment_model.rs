use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    PRICE_SOURCE_DOMESTIC, PRICE_SOURCE_FOREIGN, PRICE_SOURCE_OTHER, PRICE_SOURCE_OWN_PRODUCTION,
    ROUTE_DOMESTIC, ROUTE_IMPORT, ROUTE_OTHER, ROUTE_WAREHOUSE,
};
use crate::errors::{Error, Result, ValidationError};
use crate::fx::fx_model::validate_currency_code;
use crate::schema::{equipment, logistics_costs, purchase_prices};
use crate::utils::decimal_serde::{decimal_serde, decimal_serde_option};
use crate::utils::{parse_decimal, parse_decimal_opt};

/// Where a purchase price was sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSource {
    Domestic,
    Foreign,
    OwnProduction,
    Other,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::Domestic => PRICE_SOURCE_DOMESTIC,
            PriceSource::Foreign => PRICE_SOURCE_FOREIGN,
            PriceSource::OwnProduction => PRICE_SOURCE_OWN_PRODUCTION,
            PriceSource::Other => PRICE_SOURCE_OTHER,
        }
    }
}

impl From<&str> for PriceSource {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            PRICE_SOURCE_DOMESTIC => PriceSource::Domestic,
            PRICE_SOURCE_FOREIGN => PriceSource::Foreign,
            PRICE_SOURCE_OWN_PRODUCTION => PriceSource::OwnProduction,
            _ => PriceSource::Other,
        }
    }
}

/// Transportation route for a logistics record. The warehouse route is
/// accounted separately from transportation and never joins the auto sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteType {
    Import,
    Domestic,
    Warehouse,
    Other,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Import => ROUTE_IMPORT,
            RouteType::Domestic => ROUTE_DOMESTIC,
            RouteType::Warehouse => ROUTE_WAREHOUSE,
            RouteType::Other => ROUTE_OTHER,
        }
    }

    pub fn is_warehouse(&self) -> bool {
        matches!(self, RouteType::Warehouse)
    }
}

impl From<&str> for RouteType {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            ROUTE_IMPORT => RouteType::Import,
            ROUTE_DOMESTIC => RouteType::Domestic,
            ROUTE_WAREHOUSE => RouteType::Warehouse,
            _ => RouteType::Other,
        }
    }
}

/// Catalog equipment entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    pub id: String,
    pub name: String,
    pub sku: Option<String>,
    pub unit: String,
    pub description: Option<String>,
    #[serde(with = "decimal_serde_option")]
    pub manufacture_price: Option<Decimal>,
    pub manufacture_currency: Option<String>,
    /// Fixed catalog unit sale price in the base currency. Authoritative
    /// for price dissolution when present.
    #[serde(with = "decimal_serde_option")]
    pub sale_price: Option<Decimal>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone)]
#[diesel(table_name = equipment)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EquipmentDB {
    pub id: String,
    pub name: String,
    pub sku: Option<String>,
    pub unit: String,
    pub description: Option<String>,
    pub manufacture_price: Option<String>,
    pub manufacture_currency: Option<String>,
    pub sale_price: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<EquipmentDB> for Equipment {
    fn from(db: EquipmentDB) -> Self {
        Equipment {
            manufacture_price: parse_decimal_opt(
                db.manufacture_price.as_deref(),
                "equipment.manufacture_price",
            ),
            sale_price: parse_decimal_opt(db.sale_price.as_deref(), "equipment.sale_price"),
            id: db.id,
            name: db.name,
            sku: db.sku,
            unit: db.unit,
            description: db.description,
            manufacture_currency: db.manufacture_currency,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<&Equipment> for EquipmentDB {
    fn from(domain: &Equipment) -> Self {
        EquipmentDB {
            id: domain.id.clone(),
            name: domain.name.clone(),
            sku: domain.sku.clone(),
            unit: domain.unit.clone(),
            description: domain.description.clone(),
            manufacture_price: domain.manufacture_price.map(|d| d.to_string()),
            manufacture_currency: domain.manufacture_currency.clone(),
            sale_price: domain.sale_price.map(|d| d.to_string()),
            created_at: domain.created_at,
            updated_at: domain.updated_at,
        }
    }
}

/// Input model for creating catalog equipment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEquipment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub sku: Option<String>,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub description: Option<String>,
    #[serde(default, with = "decimal_serde_option")]
    pub manufacture_price: Option<Decimal>,
    pub manufacture_currency: Option<String>,
    #[serde(default, with = "decimal_serde_option")]
    pub sale_price: Option<Decimal>,
}

fn default_unit() -> String {
    "pcs".to_string()
}

impl NewEquipment {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Equipment name cannot be empty".to_string(),
            )));
        }
        if let Some(price) = self.manufacture_price {
            if price < Decimal::ZERO {
                return Err(Error::Validation(ValidationError::InvalidInput(
                    "Manufacture price cannot be negative".to_string(),
                )));
            }
        }
        if let Some(currency) = &self.manufacture_currency {
            validate_currency_code(currency)?;
        }
        if let Some(price) = self.sale_price {
            if price < Decimal::ZERO {
                return Err(Error::Validation(ValidationError::InvalidInput(
                    "Sale price cannot be negative".to_string(),
                )));
            }
        }
        Ok(())
    }

    pub fn into_equipment(self) -> Equipment {
        let now = Utc::now().naive_utc();
        Equipment {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: self.name,
            sku: self.sku,
            unit: self.unit,
            description: self.description,
            manufacture_price: self.manufacture_price,
            manufacture_currency: self.manufacture_currency,
            sale_price: self.sale_price,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One purchase price observation for an equipment entry. Only active rows
/// participate in cost calculations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasePrice {
    pub id: String,
    pub equipment_id: String,
    pub source: PriceSource,
    #[serde(with = "decimal_serde")]
    pub price: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone)]
#[diesel(table_name = purchase_prices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PurchasePriceDB {
    pub id: String,
    pub equipment_id: String,
    pub source: String,
    pub price: String,
    pub currency: String,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<PurchasePriceDB> for PurchasePrice {
    fn from(db: PurchasePriceDB) -> Self {
        PurchasePrice {
            price: parse_decimal(&db.price, "purchase_prices.price"),
            source: PriceSource::from(db.source.as_str()),
            id: db.id,
            equipment_id: db.equipment_id,
            currency: db.currency,
            is_active: db.is_active,
            notes: db.notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<&PurchasePrice> for PurchasePriceDB {
    fn from(domain: &PurchasePrice) -> Self {
        PurchasePriceDB {
            id: domain.id.clone(),
            equipment_id: domain.equipment_id.clone(),
            source: domain.source.as_str().to_string(),
            price: domain.price.to_string(),
            currency: domain.currency.clone(),
            is_active: domain.is_active,
            notes: domain.notes.clone(),
            created_at: domain.created_at,
            updated_at: domain.updated_at,
        }
    }
}

/// Input model for recording a purchase price
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchasePrice {
    pub equipment_id: String,
    pub source: PriceSource,
    #[serde(with = "decimal_serde")]
    pub price: Decimal,
    pub currency: String,
    pub notes: Option<String>,
}

impl NewPurchasePrice {
    pub fn validate(&self) -> Result<()> {
        if self.price < Decimal::ZERO {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Purchase price cannot be negative".to_string(),
            )));
        }
        validate_currency_code(&self.currency)
    }

    pub fn into_price(self) -> PurchasePrice {
        let now = Utc::now().naive_utc();
        PurchasePrice {
            id: Uuid::new_v4().to_string(),
            equipment_id: self.equipment_id,
            source: self.source,
            price: self.price,
            currency: self.currency,
            is_active: true,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One logistics cost record for an equipment entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogisticsCost {
    pub id: String,
    pub equipment_id: String,
    pub route: RouteType,
    #[serde(with = "decimal_serde")]
    pub cost: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone)]
#[diesel(table_name = logistics_costs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LogisticsCostDB {
    pub id: String,
    pub equipment_id: String,
    pub route: String,
    pub cost: String,
    pub currency: String,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<LogisticsCostDB> for LogisticsCost {
    fn from(db: LogisticsCostDB) -> Self {
        LogisticsCost {
            cost: parse_decimal(&db.cost, "logistics_costs.cost"),
            route: RouteType::from(db.route.as_str()),
            id: db.id,
            equipment_id: db.equipment_id,
            currency: db.currency,
            is_active: db.is_active,
            notes: db.notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<&LogisticsCost> for LogisticsCostDB {
    fn from(domain: &LogisticsCost) -> Self {
        LogisticsCostDB {
            id: domain.id.clone(),
            equipment_id: domain.equipment_id.clone(),
            route: domain.route.as_str().to_string(),
            cost: domain.cost.to_string(),
            currency: domain.currency.clone(),
            is_active: domain.is_active,
            notes: domain.notes.clone(),
            created_at: domain.created_at,
            updated_at: domain.updated_at,
        }
    }
}

/// Input model for recording a logistics cost
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLogisticsCost {
    pub equipment_id: String,
    pub route: RouteType,
    #[serde(with = "decimal_serde")]
    pub cost: Decimal,
    pub currency: String,
    pub notes: Option<String>,
}

impl NewLogisticsCost {
    pub fn validate(&self) -> Result<()> {
        if self.cost < Decimal::ZERO {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Logistics cost cannot be negative".to_string(),
            )));
        }
        validate_currency_code(&self.currency)
    }

    pub fn into_cost(self) -> LogisticsCost {
        let now = Utc::now().naive_utc();
        LogisticsCost {
            id: Uuid::new_v4().to_string(),
            equipment_id: self.equipment_id,
            route: self.route,
            cost: self.cost,
            currency: self.currency,
            is_active: true,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }
}
