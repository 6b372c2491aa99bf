use async_trait::async_trait;

use crate::costing::costing_model::{
    AdditionalExpense, CalculationInput, CostBreakdown, CostCalculation, NewCalculationRecord,
};
use crate::errors::Result;

/// Computes the itemized unit cost for one equipment entry.
pub trait CostCalculatorTrait: Send + Sync {
    fn calculate(&self, equipment_id: &str, input: &CalculationInput) -> Result<CostBreakdown>;
}

/// Source of the additional expenses attached to proposals' equipment lists.
pub trait ExpenseProviderTrait: Send + Sync {
    /// Expenses of the first equipment list in the proposal that contains
    /// the given equipment.
    fn get_expenses_for_equipment(
        &self,
        proposal_id: &str,
        equipment_id: &str,
    ) -> Result<Vec<AdditionalExpense>>;

    fn get_expense(&self, expense_id: &str) -> Result<Option<AdditionalExpense>>;
}

/// Append-only calculation history per (equipment, proposal) pair.
#[async_trait]
pub trait CalculationRepositoryTrait: Send + Sync {
    /// Persists a breakdown under the next version number for its pair.
    /// Scoped and unscoped histories are independent sequences.
    async fn save(&self, new_record: NewCalculationRecord) -> Result<CostCalculation>;

    /// Records for a pair, newest version first.
    fn get_history(
        &self,
        equipment_id: &str,
        proposal_id: Option<&str>,
    ) -> Result<Vec<CostCalculation>>;

    fn get_latest(
        &self,
        equipment_id: &str,
        proposal_id: Option<&str>,
    ) -> Result<Option<CostCalculation>>;
}
