use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{EXPENSE_KIND_COEFFICIENT, EXPENSE_KIND_FIXED, EXPENSE_KIND_PERCENTAGE};
use crate::equipment::equipment_model::{PriceSource, RouteType};
use crate::errors::{Error, Result, ValidationError};
use crate::fx::ExchangeRate;
use crate::schema::{additional_expenses, cost_calculations};
use crate::utils::decimal_serde::{decimal_serde, decimal_serde_option};
use crate::utils::parse_decimal;

/// How an additional expense contributes to the cost:
/// a flat amount, a percentage of the base cost, or a multiplier of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseKind {
    Fixed,
    Percentage,
    Coefficient,
}

impl ExpenseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseKind::Fixed => EXPENSE_KIND_FIXED,
            ExpenseKind::Percentage => EXPENSE_KIND_PERCENTAGE,
            ExpenseKind::Coefficient => EXPENSE_KIND_COEFFICIENT,
        }
    }
}

impl From<&str> for ExpenseKind {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            EXPENSE_KIND_PERCENTAGE => ExpenseKind::Percentage,
            EXPENSE_KIND_COEFFICIENT => ExpenseKind::Coefficient,
            _ => ExpenseKind::Fixed,
        }
    }
}

/// Named expense attachable to a proposal's equipment list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalExpense {
    pub id: String,
    pub name: String,
    pub kind: ExpenseKind,
    #[serde(with = "decimal_serde")]
    pub value: Decimal,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl AdditionalExpense {
    /// Monetary contribution in the base currency once the base cost is known.
    pub fn contribution(&self, base_cost: Decimal) -> Decimal {
        match self.kind {
            ExpenseKind::Fixed => self.value,
            ExpenseKind::Percentage => base_cost * self.value / Decimal::ONE_HUNDRED,
            ExpenseKind::Coefficient => base_cost * self.value,
        }
    }
}

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone)]
#[diesel(table_name = additional_expenses)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AdditionalExpenseDB {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub value: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<AdditionalExpenseDB> for AdditionalExpense {
    fn from(db: AdditionalExpenseDB) -> Self {
        AdditionalExpense {
            value: parse_decimal(&db.value, "additional_expenses.value"),
            kind: ExpenseKind::from(db.kind.as_str()),
            id: db.id,
            name: db.name,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<&AdditionalExpense> for AdditionalExpenseDB {
    fn from(domain: &AdditionalExpense) -> Self {
        AdditionalExpenseDB {
            id: domain.id.clone(),
            name: domain.name.clone(),
            kind: domain.kind.as_str().to_string(),
            value: domain.value.to_string(),
            created_at: domain.created_at,
            updated_at: domain.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAdditionalExpense {
    pub name: String,
    pub kind: ExpenseKind,
    #[serde(with = "decimal_serde")]
    pub value: Decimal,
}

impl NewAdditionalExpense {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Expense name cannot be empty".to_string(),
            )));
        }
        if self.value < Decimal::ZERO {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Expense value cannot be negative".to_string(),
            )));
        }
        Ok(())
    }

    pub fn into_expense(self) -> AdditionalExpense {
        let now = Utc::now().naive_utc();
        AdditionalExpense {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            kind: self.kind,
            value: self.value,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of normalizing one component into the base currency. A failed
/// conversion keeps the original-currency number so the calculation can
/// still complete; the reason is carried for logs and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConversionOutcome {
    Converted {
        #[serde(with = "decimal_serde")]
        value: Decimal,
    },
    Unconverted {
        #[serde(with = "decimal_serde")]
        value: Decimal,
        reason: String,
    },
}

impl ConversionOutcome {
    pub fn value(&self) -> Decimal {
        match self {
            ConversionOutcome::Converted { value } => *value,
            ConversionOutcome::Unconverted { value, .. } => *value,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionOutcome::Converted { .. })
    }
}

/// Purchase price component of a breakdown, original and base-currency values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseComponent {
    pub record_id: Option<String>,
    #[serde(with = "decimal_serde")]
    pub value: Decimal,
    pub currency: Option<String>,
    pub source: Option<PriceSource>,
    pub base_value: ConversionOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogisticsComponent {
    pub record_id: Option<String>,
    /// Display total in the original currency. With auto-selection this sums
    /// only records matching the first record's currency; the base value is
    /// recomputed per record and can therefore differ.
    #[serde(with = "decimal_serde")]
    pub value: Decimal,
    pub currency: Option<String>,
    pub route: Option<RouteType>,
    pub base_value: ConversionOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostComponent {
    #[serde(with = "decimal_serde")]
    pub value: Decimal,
    pub currency: Option<String>,
    pub base_value: ConversionOutcome,
}

/// Additional-expense total, always expressed in the base currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalComponent {
    pub record_id: Option<String>,
    #[serde(with = "decimal_serde")]
    pub value: Decimal,
}

/// Exchange rate captured alongside a calculation for auditability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSnapshot {
    pub rate_id: Option<String>,
    #[serde(with = "decimal_serde")]
    pub value: Decimal,
    pub from_currency: String,
    pub to_currency: String,
    pub rate_date: NaiveDate,
}

impl RateSnapshot {
    pub fn from_rate(rate: &ExchangeRate) -> Self {
        RateSnapshot {
            rate_id: Some(rate.id.clone()),
            value: rate.rate,
            from_currency: rate.from_currency.clone(),
            to_currency: rate.to_currency.clone(),
            rate_date: rate.rate_date,
        }
    }

    /// Placeholder snapshot when no rate record applies.
    pub fn identity(base_currency: &str, as_of: NaiveDate) -> Self {
        RateSnapshot {
            rate_id: None,
            value: Decimal::ONE,
            from_currency: base_currency.to_string(),
            to_currency: base_currency.to_string(),
            rate_date: as_of,
        }
    }
}

/// Itemized result of a unit cost calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub equipment_id: String,
    pub equipment_name: String,
    pub purchase_price: PurchaseComponent,
    pub logistics: LogisticsComponent,
    pub warehouse: CostComponent,
    pub production: CostComponent,
    pub additional_costs: AdditionalComponent,
    pub exchange_rate: RateSnapshot,
    /// Purchase + logistics + warehouse + production in the base currency,
    /// before additional expenses.
    #[serde(with = "decimal_serde")]
    pub base_cost: Decimal,
    #[serde(with = "decimal_serde")]
    pub total_cost_base: Decimal,
    #[serde(with = "decimal_serde")]
    pub total_cost_target: Decimal,
    pub target_currency: String,
    pub base_currency: String,
    pub calculation_date: NaiveDate,
}

/// Sparse per-component overrides. A set value short-circuits the matching
/// selection step; the optional companion currency retags it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualOverrides {
    #[serde(with = "decimal_serde_option", skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_price_currency: Option<String>,
    #[serde(with = "decimal_serde_option", skip_serializing_if = "Option::is_none")]
    pub logistics_cost: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logistics_currency: Option<String>,
    #[serde(with = "decimal_serde_option", skip_serializing_if = "Option::is_none")]
    pub warehouse_cost: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_currency: Option<String>,
    #[serde(with = "decimal_serde_option", skip_serializing_if = "Option::is_none")]
    pub production_cost: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_currency: Option<String>,
    #[serde(with = "decimal_serde_option", skip_serializing_if = "Option::is_none")]
    pub additional_costs: Option<Decimal>,
    #[serde(with = "decimal_serde_option", skip_serializing_if = "Option::is_none")]
    pub exchange_rate_value: Option<Decimal>,
}

impl ManualOverrides {
    pub fn is_empty(&self) -> bool {
        self.purchase_price.is_none()
            && self.purchase_price_currency.is_none()
            && self.logistics_cost.is_none()
            && self.logistics_currency.is_none()
            && self.warehouse_cost.is_none()
            && self.warehouse_currency.is_none()
            && self.production_cost.is_none()
            && self.production_currency.is_none()
            && self.additional_costs.is_none()
            && self.exchange_rate_value.is_none()
    }
}

/// Proposal context threaded into a calculation: scoped rate lookups,
/// the ticket currency, and the proposal's fixed rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalScope {
    pub proposal_id: String,
    pub currency: String,
    #[serde(default, with = "decimal_serde_option")]
    pub exchange_rate: Option<Decimal>,
    #[serde(default)]
    pub exchange_rate_date: Option<NaiveDate>,
}

/// Selectors and context for one unit cost calculation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalculationInput {
    pub purchase_price_id: Option<String>,
    pub logistics_id: Option<String>,
    pub additional_expense_id: Option<String>,
    pub as_of: Option<NaiveDate>,
    pub proposal: Option<ProposalScope>,
    pub target_currency: Option<String>,
    pub overrides: ManualOverrides,
}

/// Input for persisting a calculation as a history record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCalculationRecord {
    pub proposal_id: Option<String>,
    pub breakdown: CostBreakdown,
    #[serde(default)]
    pub is_manual_adjustment: bool,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// Persisted, versioned snapshot of a breakdown for one
/// (equipment, proposal) pair. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostCalculation {
    pub id: String,
    pub equipment_id: String,
    pub proposal_id: Option<String>,
    pub version: i32,
    #[serde(with = "decimal_serde")]
    pub purchase_price_value: Decimal,
    pub purchase_price_currency: Option<String>,
    #[serde(with = "decimal_serde")]
    pub purchase_price_base: Decimal,
    #[serde(with = "decimal_serde")]
    pub logistics_value: Decimal,
    pub logistics_currency: Option<String>,
    #[serde(with = "decimal_serde")]
    pub logistics_base: Decimal,
    #[serde(with = "decimal_serde")]
    pub warehouse_value: Decimal,
    pub warehouse_currency: Option<String>,
    #[serde(with = "decimal_serde")]
    pub warehouse_base: Decimal,
    #[serde(with = "decimal_serde")]
    pub production_value: Decimal,
    pub production_currency: Option<String>,
    #[serde(with = "decimal_serde")]
    pub production_base: Decimal,
    #[serde(with = "decimal_serde")]
    pub additional_costs: Decimal,
    pub exchange_rate_id: Option<String>,
    #[serde(with = "decimal_serde")]
    pub exchange_rate_value: Decimal,
    pub rate_from_currency: String,
    pub rate_to_currency: String,
    pub rate_date: Option<NaiveDate>,
    #[serde(with = "decimal_serde")]
    pub total_cost_base: Decimal,
    #[serde(with = "decimal_serde")]
    pub total_cost_target: Decimal,
    pub target_currency: String,
    pub details: Option<String>,
    pub is_manual_adjustment: bool,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: NaiveDateTime,
}

impl CostCalculation {
    pub fn from_breakdown(
        breakdown: &CostBreakdown,
        proposal_id: Option<String>,
        version: i32,
        is_manual_adjustment: bool,
        notes: Option<String>,
        created_by: Option<String>,
        details: Option<String>,
    ) -> Self {
        CostCalculation {
            id: Uuid::new_v4().to_string(),
            equipment_id: breakdown.equipment_id.clone(),
            proposal_id,
            version,
            purchase_price_value: breakdown.purchase_price.value,
            purchase_price_currency: breakdown.purchase_price.currency.clone(),
            purchase_price_base: breakdown.purchase_price.base_value.value(),
            logistics_value: breakdown.logistics.value,
            logistics_currency: breakdown.logistics.currency.clone(),
            logistics_base: breakdown.logistics.base_value.value(),
            warehouse_value: breakdown.warehouse.value,
            warehouse_currency: breakdown.warehouse.currency.clone(),
            warehouse_base: breakdown.warehouse.base_value.value(),
            production_value: breakdown.production.value,
            production_currency: breakdown.production.currency.clone(),
            production_base: breakdown.production.base_value.value(),
            additional_costs: breakdown.additional_costs.value,
            exchange_rate_id: breakdown.exchange_rate.rate_id.clone(),
            exchange_rate_value: breakdown.exchange_rate.value,
            rate_from_currency: breakdown.exchange_rate.from_currency.clone(),
            rate_to_currency: breakdown.exchange_rate.to_currency.clone(),
            rate_date: Some(breakdown.exchange_rate.rate_date),
            total_cost_base: breakdown.total_cost_base,
            total_cost_target: breakdown.total_cost_target,
            target_currency: breakdown.target_currency.clone(),
            details,
            is_manual_adjustment,
            notes,
            created_by,
            created_at: Utc::now().naive_utc(),
        }
    }
}

#[derive(Queryable, Identifiable, Insertable, Selectable, Debug, Clone)]
#[diesel(table_name = cost_calculations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CostCalculationDB {
    pub id: String,
    pub equipment_id: String,
    pub proposal_id: Option<String>,
    pub version: i32,
    pub purchase_price_value: String,
    pub purchase_price_currency: Option<String>,
    pub purchase_price_base: String,
    pub logistics_value: String,
    pub logistics_currency: Option<String>,
    pub logistics_base: String,
    pub warehouse_value: String,
    pub warehouse_currency: Option<String>,
    pub warehouse_base: String,
    pub production_value: String,
    pub production_currency: Option<String>,
    pub production_base: String,
    pub additional_costs: String,
    pub exchange_rate_id: Option<String>,
    pub exchange_rate_value: String,
    pub rate_from_currency: String,
    pub rate_to_currency: String,
    pub rate_date: Option<NaiveDate>,
    pub total_cost_base: String,
    pub total_cost_target: String,
    pub target_currency: String,
    pub details: Option<String>,
    pub is_manual_adjustment: bool,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<CostCalculationDB> for CostCalculation {
    fn from(db: CostCalculationDB) -> Self {
        CostCalculation {
            purchase_price_value: parse_decimal(
                &db.purchase_price_value,
                "cost_calculations.purchase_price_value",
            ),
            purchase_price_base: parse_decimal(
                &db.purchase_price_base,
                "cost_calculations.purchase_price_base",
            ),
            logistics_value: parse_decimal(&db.logistics_value, "cost_calculations.logistics_value"),
            logistics_base: parse_decimal(&db.logistics_base, "cost_calculations.logistics_base"),
            warehouse_value: parse_decimal(&db.warehouse_value, "cost_calculations.warehouse_value"),
            warehouse_base: parse_decimal(&db.warehouse_base, "cost_calculations.warehouse_base"),
            production_value: parse_decimal(
                &db.production_value,
                "cost_calculations.production_value",
            ),
            production_base: parse_decimal(&db.production_base, "cost_calculations.production_base"),
            additional_costs: parse_decimal(
                &db.additional_costs,
                "cost_calculations.additional_costs",
            ),
            exchange_rate_value: parse_decimal(
                &db.exchange_rate_value,
                "cost_calculations.exchange_rate_value",
            ),
            total_cost_base: parse_decimal(&db.total_cost_base, "cost_calculations.total_cost_base"),
            total_cost_target: parse_decimal(
                &db.total_cost_target,
                "cost_calculations.total_cost_target",
            ),
            id: db.id,
            equipment_id: db.equipment_id,
            proposal_id: db.proposal_id,
            version: db.version,
            purchase_price_currency: db.purchase_price_currency,
            logistics_currency: db.logistics_currency,
            warehouse_currency: db.warehouse_currency,
            production_currency: db.production_currency,
            exchange_rate_id: db.exchange_rate_id,
            rate_from_currency: db.rate_from_currency,
            rate_to_currency: db.rate_to_currency,
            rate_date: db.rate_date,
            target_currency: db.target_currency,
            details: db.details,
            is_manual_adjustment: db.is_manual_adjustment,
            notes: db.notes,
            created_by: db.created_by,
            created_at: db.created_at,
        }
    }
}

impl From<&CostCalculation> for CostCalculationDB {
    fn from(domain: &CostCalculation) -> Self {
        CostCalculationDB {
            id: domain.id.clone(),
            equipment_id: domain.equipment_id.clone(),
            proposal_id: domain.proposal_id.clone(),
            version: domain.version,
            purchase_price_value: domain.purchase_price_value.to_string(),
            purchase_price_currency: domain.purchase_price_currency.clone(),
            purchase_price_base: domain.purchase_price_base.to_string(),
            logistics_value: domain.logistics_value.to_string(),
            logistics_currency: domain.logistics_currency.clone(),
            logistics_base: domain.logistics_base.to_string(),
            warehouse_value: domain.warehouse_value.to_string(),
            warehouse_currency: domain.warehouse_currency.clone(),
            warehouse_base: domain.warehouse_base.to_string(),
            production_value: domain.production_value.to_string(),
            production_currency: domain.production_currency.clone(),
            production_base: domain.production_base.to_string(),
            additional_costs: domain.additional_costs.to_string(),
            exchange_rate_id: domain.exchange_rate_id.clone(),
            exchange_rate_value: domain.exchange_rate_value.to_string(),
            rate_from_currency: domain.rate_from_currency.clone(),
            rate_to_currency: domain.rate_to_currency.clone(),
            rate_date: domain.rate_date,
            total_cost_base: domain.total_cost_base.to_string(),
            total_cost_target: domain.total_cost_target.to_string(),
            target_currency: domain.target_currency.clone(),
            details: domain.details.clone(),
            is_manual_adjustment: domain.is_manual_adjustment,
            notes: domain.notes.clone(),
            created_by: domain.created_by.clone(),
            created_at: domain.created_at,
        }
    }
}
