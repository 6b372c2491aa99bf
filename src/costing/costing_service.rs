use std::sync::Arc;

use log::debug;

use crate::costing::costing_model::{
    CalculationInput, CostBreakdown, CostCalculation, NewCalculationRecord,
};
use crate::costing::costing_traits::{CalculationRepositoryTrait, CostCalculatorTrait};
use crate::errors::Result;

/// Entry point for unit cost calculations and their history.
pub struct CostingService {
    calculator: Arc<dyn CostCalculatorTrait>,
    repository: Arc<dyn CalculationRepositoryTrait>,
}

impl CostingService {
    pub fn new(
        calculator: Arc<dyn CostCalculatorTrait>,
        repository: Arc<dyn CalculationRepositoryTrait>,
    ) -> Self {
        CostingService {
            calculator,
            repository,
        }
    }

    pub fn calculate_equipment_cost(
        &self,
        equipment_id: &str,
        input: &CalculationInput,
    ) -> Result<CostBreakdown> {
        self.calculator.calculate(equipment_id, input)
    }

    /// Calculates and records the result as the next version for the
    /// (equipment, proposal) pair. The manual-adjustment flag is set when
    /// any override participated.
    pub async fn calculate_and_save(
        &self,
        equipment_id: &str,
        input: &CalculationInput,
        notes: Option<String>,
        created_by: Option<String>,
    ) -> Result<CostCalculation> {
        let breakdown = self.calculator.calculate(equipment_id, input)?;
        let record = self
            .repository
            .save(NewCalculationRecord {
                proposal_id: input
                    .proposal
                    .as_ref()
                    .map(|scope| scope.proposal_id.clone()),
                breakdown,
                is_manual_adjustment: !input.overrides.is_empty(),
                notes,
                created_by,
            })
            .await?;
        debug!(
            "Saved cost calculation {} v{} for equipment {}",
            record.id, record.version, equipment_id
        );
        Ok(record)
    }

    pub fn get_calculation_history(
        &self,
        equipment_id: &str,
        proposal_id: Option<&str>,
    ) -> Result<Vec<CostCalculation>> {
        self.repository.get_history(equipment_id, proposal_id)
    }

    pub fn get_latest_calculation(
        &self,
        equipment_id: &str,
        proposal_id: Option<&str>,
    ) -> Result<Option<CostCalculation>> {
        self.repository.get_latest(equipment_id, proposal_id)
    }
}
