use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::costing::ProposalScope;
use crate::errors::{Error, Result, ValidationError};
use crate::fx::fx_model::validate_currency_code;
use crate::schema::{equipment_list_expenses, equipment_list_items, equipment_lists, proposals};
use crate::utils::decimal_serde::{decimal_serde, decimal_serde_option};
use crate::utils::{parse_decimal, parse_decimal_opt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Negotiating,
    Completed,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "DRAFT",
            ProposalStatus::Sent => "SENT",
            ProposalStatus::Accepted => "ACCEPTED",
            ProposalStatus::Rejected => "REJECTED",
            ProposalStatus::Negotiating => "NEGOTIATING",
            ProposalStatus::Completed => "COMPLETED",
        }
    }
}

impl From<&str> for ProposalStatus {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "SENT" => ProposalStatus::Sent,
            "ACCEPTED" => ProposalStatus::Accepted,
            "REJECTED" => ProposalStatus::Rejected,
            "NEGOTIATING" => ProposalStatus::Negotiating,
            "COMPLETED" => ProposalStatus::Completed,
            _ => ProposalStatus::Draft,
        }
    }
}

/// Flat priced add-on listed on a proposal besides the equipment lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalService {
    pub name: String,
    #[serde(with = "decimal_serde")]
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

/// Ad-hoc expense recorded directly on a line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowExpense {
    #[serde(with = "decimal_serde")]
    pub amount: Decimal,
    pub currency: String,
}

/// Per-line figures persisted after a pricing run. Their presence freezes
/// the line: later runs reuse them verbatim instead of recomputing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SavedLineFigures {
    #[serde(with = "decimal_serde_option", skip_serializing_if = "Option::is_none")]
    pub purchase_price_base: Option<Decimal>,
    #[serde(with = "decimal_serde_option", skip_serializing_if = "Option::is_none")]
    pub base_cost: Option<Decimal>,
    #[serde(with = "decimal_serde_option", skip_serializing_if = "Option::is_none")]
    pub overhead_base: Option<Decimal>,
    #[serde(with = "decimal_serde_option", skip_serializing_if = "Option::is_none")]
    pub margin_per_unit: Option<Decimal>,
    #[serde(with = "decimal_serde_option", skip_serializing_if = "Option::is_none")]
    pub margin_percentage: Option<Decimal>,
}

impl SavedLineFigures {
    /// A line counts as frozen once purchase price, base cost or a margin
    /// figure was recorded.
    pub fn has_saved_data(&self) -> bool {
        self.purchase_price_base.is_some()
            || self.base_cost.is_some()
            || self.margin_per_unit.is_some()
            || self.margin_percentage.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_saved_data() && self.overhead_base.is_none()
    }
}

fn parse_json_field<T>(value: Option<&str>, field: &str) -> T
where
    T: Default + serde::de::DeserializeOwned,
{
    match value {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw).unwrap_or_else(|e| {
            log::error!("Failed to parse {}: {}", field, e);
            T::default()
        }),
        _ => T::default(),
    }
}

/// Commercial proposal aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub number: String,
    pub name: String,
    pub client_name: Option<String>,
    /// Ticket currency the client sees.
    pub currency: String,
    /// Fixed rate quoting one unit of the ticket currency in base currency.
    #[serde(with = "decimal_serde_option")]
    pub exchange_rate: Option<Decimal>,
    pub exchange_rate_date: Option<NaiveDate>,
    #[serde(with = "decimal_serde")]
    pub total_price: Decimal,
    #[serde(with = "decimal_serde_option")]
    pub cost_price: Option<Decimal>,
    #[serde(with = "decimal_serde_option")]
    pub margin_percentage: Option<Decimal>,
    #[serde(with = "decimal_serde_option")]
    pub margin_value: Option<Decimal>,
    pub additional_services: Vec<AdditionalService>,
    pub data_package: Option<serde_json::Value>,
    pub status: ProposalStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Proposal {
    pub fn services_total(&self) -> Decimal {
        self.additional_services
            .iter()
            .map(|service| service.price)
            .sum()
    }
}

impl From<&Proposal> for ProposalScope {
    fn from(proposal: &Proposal) -> Self {
        ProposalScope {
            proposal_id: proposal.id.clone(),
            currency: proposal.currency.clone(),
            exchange_rate: proposal.exchange_rate,
            exchange_rate_date: proposal.exchange_rate_date,
        }
    }
}

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone)]
#[diesel(table_name = proposals)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProposalDB {
    pub id: String,
    pub number: String,
    pub name: String,
    pub client_name: Option<String>,
    pub currency: String,
    pub exchange_rate: Option<String>,
    pub exchange_rate_date: Option<NaiveDate>,
    pub total_price: String,
    pub cost_price: Option<String>,
    pub margin_percentage: Option<String>,
    pub margin_value: Option<String>,
    pub additional_services: Option<String>,
    pub data_package: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<ProposalDB> for Proposal {
    fn from(db: ProposalDB) -> Self {
        Proposal {
            exchange_rate: parse_decimal_opt(db.exchange_rate.as_deref(), "proposals.exchange_rate"),
            total_price: parse_decimal(&db.total_price, "proposals.total_price"),
            cost_price: parse_decimal_opt(db.cost_price.as_deref(), "proposals.cost_price"),
            margin_percentage: parse_decimal_opt(
                db.margin_percentage.as_deref(),
                "proposals.margin_percentage",
            ),
            margin_value: parse_decimal_opt(db.margin_value.as_deref(), "proposals.margin_value"),
            additional_services: parse_json_field(
                db.additional_services.as_deref(),
                "proposals.additional_services",
            ),
            data_package: db
                .data_package
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok()),
            status: ProposalStatus::from(db.status.as_str()),
            id: db.id,
            number: db.number,
            name: db.name,
            client_name: db.client_name,
            currency: db.currency,
            exchange_rate_date: db.exchange_rate_date,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<&Proposal> for ProposalDB {
    fn from(domain: &Proposal) -> Self {
        ProposalDB {
            id: domain.id.clone(),
            number: domain.number.clone(),
            name: domain.name.clone(),
            client_name: domain.client_name.clone(),
            currency: domain.currency.clone(),
            exchange_rate: domain.exchange_rate.map(|d| d.to_string()),
            exchange_rate_date: domain.exchange_rate_date,
            total_price: domain.total_price.to_string(),
            cost_price: domain.cost_price.map(|d| d.to_string()),
            margin_percentage: domain.margin_percentage.map(|d| d.to_string()),
            margin_value: domain.margin_value.map(|d| d.to_string()),
            additional_services: if domain.additional_services.is_empty() {
                None
            } else {
                serde_json::to_string(&domain.additional_services).ok()
            },
            data_package: domain
                .data_package
                .as_ref()
                .and_then(|value| serde_json::to_string(value).ok()),
            status: domain.status.as_str().to_string(),
            created_at: domain.created_at,
            updated_at: domain.updated_at,
        }
    }
}

/// Input model for creating a proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProposal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub number: String,
    pub name: String,
    pub client_name: Option<String>,
    pub currency: String,
    #[serde(default, with = "decimal_serde_option")]
    pub exchange_rate: Option<Decimal>,
    #[serde(default)]
    pub exchange_rate_date: Option<NaiveDate>,
    #[serde(default)]
    pub additional_services: Vec<AdditionalService>,
}

impl NewProposal {
    pub fn validate(&self) -> Result<()> {
        if self.number.trim().is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Proposal number cannot be empty".to_string(),
            )));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Proposal name cannot be empty".to_string(),
            )));
        }
        validate_currency_code(&self.currency)?;
        if let Some(rate) = self.exchange_rate {
            if rate <= Decimal::ZERO {
                return Err(Error::Validation(ValidationError::InvalidInput(
                    "Exchange rate must be positive".to_string(),
                )));
            }
        }
        Ok(())
    }

    pub fn into_proposal(self) -> Proposal {
        let now = Utc::now().naive_utc();
        Proposal {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            number: self.number,
            name: self.name,
            client_name: self.client_name,
            currency: self.currency,
            exchange_rate: self.exchange_rate,
            exchange_rate_date: self.exchange_rate_date,
            total_price: Decimal::ZERO,
            cost_price: None,
            margin_percentage: None,
            margin_value: None,
            additional_services: self.additional_services,
            data_package: None,
            status: ProposalStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Group of equipment lines inside a proposal, carrying list-level
/// tax and delivery amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentList {
    pub id: String,
    pub proposal_id: String,
    pub name: Option<String>,
    #[serde(with = "decimal_serde")]
    pub tax_price: Decimal,
    #[serde(with = "decimal_serde")]
    pub delivery_price: Decimal,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone)]
#[diesel(table_name = equipment_lists)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EquipmentListDB {
    pub id: String,
    pub proposal_id: String,
    pub name: Option<String>,
    pub tax_price: String,
    pub delivery_price: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<EquipmentListDB> for EquipmentList {
    fn from(db: EquipmentListDB) -> Self {
        EquipmentList {
            tax_price: parse_decimal(&db.tax_price, "equipment_lists.tax_price"),
            delivery_price: parse_decimal(&db.delivery_price, "equipment_lists.delivery_price"),
            id: db.id,
            proposal_id: db.proposal_id,
            name: db.name,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<&EquipmentList> for EquipmentListDB {
    fn from(domain: &EquipmentList) -> Self {
        EquipmentListDB {
            id: domain.id.clone(),
            proposal_id: domain.proposal_id.clone(),
            name: domain.name.clone(),
            tax_price: domain.tax_price.to_string(),
            delivery_price: domain.delivery_price.to_string(),
            created_at: domain.created_at,
            updated_at: domain.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEquipmentList {
    pub proposal_id: String,
    pub name: Option<String>,
    #[serde(default, with = "decimal_serde_option")]
    pub tax_price: Option<Decimal>,
    #[serde(default, with = "decimal_serde_option")]
    pub delivery_price: Option<Decimal>,
}

impl NewEquipmentList {
    pub fn validate(&self) -> Result<()> {
        for (label, value) in [("Tax", self.tax_price), ("Delivery", self.delivery_price)] {
            if let Some(amount) = value {
                if amount < Decimal::ZERO {
                    return Err(Error::Validation(ValidationError::InvalidInput(format!(
                        "{} amount cannot be negative",
                        label
                    ))));
                }
            }
        }
        Ok(())
    }

    pub fn into_list(self) -> EquipmentList {
        let now = Utc::now().naive_utc();
        EquipmentList {
            id: Uuid::new_v4().to_string(),
            proposal_id: self.proposal_id,
            name: self.name,
            tax_price: self.tax_price.unwrap_or(Decimal::ZERO),
            delivery_price: self.delivery_price.unwrap_or(Decimal::ZERO),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One equipment line in a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentListItem {
    pub id: String,
    pub list_id: String,
    pub equipment_id: String,
    pub quantity: i32,
    pub position: i32,
    pub row_expenses: Vec<RowExpense>,
    /// Final unit price after a pricing run.
    #[serde(with = "decimal_serde_option")]
    pub price_per_unit: Option<Decimal>,
    #[serde(with = "decimal_serde_option")]
    pub total_price: Option<Decimal>,
    pub calculated_data: SavedLineFigures,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, Debug, Clone)]
#[diesel(table_name = equipment_list_items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EquipmentListItemDB {
    pub id: String,
    pub list_id: String,
    pub equipment_id: String,
    pub quantity: i32,
    pub position: i32,
    pub row_expenses: Option<String>,
    pub price_per_unit: Option<String>,
    pub total_price: Option<String>,
    pub calculated_data: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<EquipmentListItemDB> for EquipmentListItem {
    fn from(db: EquipmentListItemDB) -> Self {
        EquipmentListItem {
            row_expenses: parse_json_field(
                db.row_expenses.as_deref(),
                "equipment_list_items.row_expenses",
            ),
            price_per_unit: parse_decimal_opt(
                db.price_per_unit.as_deref(),
                "equipment_list_items.price_per_unit",
            ),
            total_price: parse_decimal_opt(
                db.total_price.as_deref(),
                "equipment_list_items.total_price",
            ),
            calculated_data: parse_json_field(
                db.calculated_data.as_deref(),
                "equipment_list_items.calculated_data",
            ),
            id: db.id,
            list_id: db.list_id,
            equipment_id: db.equipment_id,
            quantity: db.quantity,
            position: db.position,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<&EquipmentListItem> for EquipmentListItemDB {
    fn from(domain: &EquipmentListItem) -> Self {
        EquipmentListItemDB {
            id: domain.id.clone(),
            list_id: domain.list_id.clone(),
            equipment_id: domain.equipment_id.clone(),
            quantity: domain.quantity,
            position: domain.position,
            row_expenses: if domain.row_expenses.is_empty() {
                None
            } else {
                serde_json::to_string(&domain.row_expenses).ok()
            },
            price_per_unit: domain.price_per_unit.map(|d| d.to_string()),
            total_price: domain.total_price.map(|d| d.to_string()),
            calculated_data: if domain.calculated_data.is_empty() {
                None
            } else {
                serde_json::to_string(&domain.calculated_data).ok()
            },
            created_at: domain.created_at,
            updated_at: domain.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLineItem {
    pub list_id: String,
    pub equipment_id: String,
    pub quantity: i32,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub row_expenses: Vec<RowExpense>,
}

impl NewLineItem {
    pub fn validate(&self) -> Result<()> {
        if self.quantity <= 0 {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Quantity must be positive".to_string(),
            )));
        }
        for expense in &self.row_expenses {
            validate_currency_code(&expense.currency)?;
        }
        Ok(())
    }

    pub fn into_item(self) -> EquipmentListItem {
        let now = Utc::now().naive_utc();
        EquipmentListItem {
            id: Uuid::new_v4().to_string(),
            list_id: self.list_id,
            equipment_id: self.equipment_id,
            quantity: self.quantity,
            position: self.position,
            row_expenses: self.row_expenses,
            price_per_unit: None,
            total_price: None,
            calculated_data: SavedLineFigures::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Attachment row linking an expense to an equipment list.
#[derive(Queryable, Insertable, Debug, Clone)]
#[diesel(table_name = equipment_list_expenses)]
pub struct ExpenseLinkDB {
    pub list_id: String,
    pub expense_id: String,
}

/// Per-line write-back payload of a pricing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineFigureUpdate {
    pub item_id: String,
    #[serde(with = "decimal_serde")]
    pub price_per_unit: Decimal,
    #[serde(with = "decimal_serde")]
    pub total_price: Decimal,
    pub figures: SavedLineFigures,
}
