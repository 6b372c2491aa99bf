use std::sync::Arc;

use log::warn;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::costing::{CalculationInput, CostCalculatorTrait, ProposalScope};
use crate::errors::Result;
use crate::utils::decimal_serde::{decimal_serde, decimal_serde_option};
use crate::utils::round_money;

use super::proposals_model::Proposal;
use super::proposals_traits::ProposalRepositoryTrait;

/// Aggregated cost of goods for a proposal, plus the list total derived
/// from it when a margin is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    #[serde(with = "decimal_serde")]
    pub cost_price: Decimal,
    #[serde(with = "decimal_serde_option")]
    pub total_price: Option<Decimal>,
}

/// Rolls per-line unit costs up into the proposal's cost price and total.
pub struct ProposalCostService {
    proposal_repository: Arc<dyn ProposalRepositoryTrait>,
    calculator: Arc<dyn CostCalculatorTrait>,
}

impl ProposalCostService {
    pub fn new(
        proposal_repository: Arc<dyn ProposalRepositoryTrait>,
        calculator: Arc<dyn CostCalculatorTrait>,
    ) -> Self {
        ProposalCostService {
            proposal_repository,
            calculator,
        }
    }

    /// Sums unit cost times quantity over every line of every list, in the
    /// proposal's currency. Lines whose calculation fails are skipped so a
    /// single broken reference cannot block the aggregate.
    pub fn calculate_cost_price(&self, proposal_id: &str) -> Result<Decimal> {
        let proposal = self.proposal_repository.get_proposal(proposal_id)?;
        self.aggregate_cost(&proposal)
    }

    fn aggregate_cost(&self, proposal: &Proposal) -> Result<Decimal> {
        let input = CalculationInput {
            as_of: proposal.exchange_rate_date,
            proposal: Some(ProposalScope::from(proposal)),
            target_currency: Some(proposal.currency.clone()),
            ..Default::default()
        };
        let mut total = Decimal::ZERO;
        for list in self.proposal_repository.get_equipment_lists(&proposal.id)? {
            for item in self.proposal_repository.get_list_items(&list.id)? {
                match self.calculator.calculate(&item.equipment_id, &input) {
                    Ok(breakdown) => {
                        total += breakdown.total_cost_target * Decimal::from(item.quantity);
                    }
                    Err(e) => {
                        warn!(
                            "Skipping line {} of proposal {} in cost aggregation: {}",
                            item.id, proposal.id, e
                        );
                    }
                }
            }
        }
        Ok(round_money(total))
    }

    fn markup(cost: Decimal, margin: Decimal) -> Decimal {
        round_money(cost * (Decimal::ONE + margin / Decimal::ONE_HUNDRED))
    }

    /// List total derived from a cost price. Without a margin the cost
    /// passes through unrounded; a zero margin counts as unset.
    pub fn total_from_cost(&self, cost: Decimal, margin_percentage: Option<Decimal>) -> Decimal {
        match margin_percentage.filter(|margin| !margin.is_zero()) {
            Some(margin) => Self::markup(cost, margin),
            None => cost,
        }
    }

    /// Recomputes and stores the proposal's cost price. The stored total is
    /// rewritten only when a margin is set, so a manually entered total
    /// survives a cost refresh.
    pub async fn refresh_totals(&self, proposal_id: &str) -> Result<CostSummary> {
        let proposal = self.proposal_repository.get_proposal(proposal_id)?;
        let cost_price = self.aggregate_cost(&proposal)?;
        let total_price = proposal
            .margin_percentage
            .filter(|margin| !margin.is_zero())
            .map(|margin| Self::markup(cost_price, margin));
        self.proposal_repository
            .save_cost_and_total(proposal_id, cost_price, total_price)
            .await?;
        Ok(CostSummary {
            cost_price,
            total_price,
        })
    }
}
