use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::costing::{AdditionalExpense, NewAdditionalExpense};
use crate::errors::Result;

use super::proposals_model::{
    EquipmentList, EquipmentListItem, LineFigureUpdate, NewEquipmentList, NewLineItem, NewProposal,
    Proposal,
};

/// Storage access for proposals, their equipment lists and line items.
#[async_trait]
pub trait ProposalRepositoryTrait: Send + Sync {
    fn get_proposal(&self, proposal_id: &str) -> Result<Proposal>;
    fn get_equipment_lists(&self, proposal_id: &str) -> Result<Vec<EquipmentList>>;
    fn get_list_items(&self, list_id: &str) -> Result<Vec<EquipmentListItem>>;
    fn get_list_expenses(&self, list_id: &str) -> Result<Vec<AdditionalExpense>>;

    async fn create_proposal(&self, new_proposal: NewProposal) -> Result<Proposal>;
    async fn create_equipment_list(&self, new_list: NewEquipmentList) -> Result<EquipmentList>;
    async fn add_list_item(&self, new_item: NewLineItem) -> Result<EquipmentListItem>;
    async fn create_expense(&self, new_expense: NewAdditionalExpense) -> Result<AdditionalExpense>;
    async fn attach_expense(&self, list_id: &str, expense_id: &str) -> Result<()>;

    /// Writes the aggregated cost price. `total_price` is only touched when
    /// the caller passes a recomputed value.
    async fn save_cost_and_total(
        &self,
        proposal_id: &str,
        cost_price: Decimal,
        total_price: Option<Decimal>,
    ) -> Result<()>;

    /// Persists the outcome of a pricing run atomically: line figures,
    /// proposal margins and the report package. `total_price` is written
    /// only when the run derived it from the lines.
    async fn save_pricing_results(
        &self,
        proposal_id: &str,
        line_updates: &[LineFigureUpdate],
        margin_value: Decimal,
        margin_percentage: Decimal,
        total_price: Option<Decimal>,
        data_package: serde_json::Value,
    ) -> Result<()>;
}
