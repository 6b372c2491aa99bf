use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::MARGIN_PERCENTAGE_CAP;
use crate::equipment::{Equipment, EquipmentRepositoryTrait};
use crate::errors::{Error, Result};
use crate::fx::FxServiceTrait;
use crate::utils::decimal_serde::decimal_serde;
use crate::utils::round_money;

use super::proposals_model::{EquipmentListItem, LineFigureUpdate, SavedLineFigures};
use super::proposals_traits::ProposalRepositoryTrait;

/// One fully priced line of the dissolution report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub item_id: String,
    pub equipment_id: String,
    pub equipment_name: String,
    pub description: Option<String>,
    pub unit: String,
    pub quantity: i32,
    #[serde(with = "decimal_serde")]
    pub price_per_unit: Decimal,
    #[serde(with = "decimal_serde")]
    pub total_price: Decimal,
    #[serde(with = "decimal_serde")]
    pub base_cost: Decimal,
    #[serde(with = "decimal_serde")]
    pub allocated_overhead: Decimal,
    #[serde(with = "decimal_serde")]
    pub margin_per_unit: Decimal,
    #[serde(with = "decimal_serde")]
    pub margin_percentage: Decimal,
    #[serde(with = "decimal_serde")]
    pub margin_total: Decimal,
    #[serde(with = "decimal_serde")]
    pub purchase_price_base: Decimal,
    /// True when the line reused frozen figures instead of recomputing.
    pub from_saved: bool,
}

/// Complete dissolution of a proposal's price into per-line cost, overhead
/// and margin figures, all in the base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalPricing {
    pub proposal_id: String,
    pub base_currency: String,
    pub lines: Vec<PricedLine>,
    #[serde(with = "decimal_serde")]
    pub total_base_cost: Decimal,
    #[serde(with = "decimal_serde")]
    pub overhead_total: Decimal,
    #[serde(with = "decimal_serde")]
    pub sale_total: Decimal,
    #[serde(with = "decimal_serde")]
    pub services_total: Decimal,
    #[serde(with = "decimal_serde")]
    pub target_total: Decimal,
    #[serde(with = "decimal_serde")]
    pub total_margin: Decimal,
    #[serde(with = "decimal_serde")]
    pub total_margin_percentage: Decimal,
    /// True when the target total was derived from the lines because the
    /// proposal had none stored.
    pub total_derived: bool,
}

/// Unit cost source for one line.
enum LineCost {
    /// Frozen figures from an earlier run, reused verbatim.
    Cached(SavedLineFigures),
    Fresh {
        base_unit_cost: Decimal,
        purchase_price_base: Decimal,
    },
}

struct WorkLine {
    item: EquipmentListItem,
    equipment: Equipment,
    cost: LineCost,
}

impl WorkLine {
    fn base_unit(&self) -> Decimal {
        match &self.cost {
            LineCost::Cached(figures) => figures.base_cost.unwrap_or(Decimal::ZERO),
            LineCost::Fresh { base_unit_cost, .. } => *base_unit_cost,
        }
    }
}

struct ConversionContext<'a> {
    as_of: NaiveDate,
    proposal_id: &'a str,
    rate_override: Option<Decimal>,
}

/// Dissolves a proposal's sale price into per-line base cost, a share of
/// the list-level overhead and the remaining margin. Figures computed once
/// are frozen on the line, so a repeated run reproduces the same numbers.
pub struct ProposalPricingService {
    proposal_repository: Arc<dyn ProposalRepositoryTrait>,
    equipment_repository: Arc<dyn EquipmentRepositoryTrait>,
    fx_service: Arc<dyn FxServiceTrait>,
    base_currency: String,
}

impl ProposalPricingService {
    pub fn new(
        proposal_repository: Arc<dyn ProposalRepositoryTrait>,
        equipment_repository: Arc<dyn EquipmentRepositoryTrait>,
        fx_service: Arc<dyn FxServiceTrait>,
        base_currency: String,
    ) -> Self {
        ProposalPricingService {
            proposal_repository,
            equipment_repository,
            fx_service,
            base_currency,
        }
    }

    fn to_base(
        &self,
        label: &str,
        amount: Decimal,
        currency: &str,
        ctx: &ConversionContext,
    ) -> Result<Decimal> {
        if currency == self.base_currency || amount.is_zero() {
            return Ok(amount);
        }
        match self.fx_service.convert_currency_for_date(
            amount,
            currency,
            &self.base_currency,
            ctx.as_of,
            Some(ctx.proposal_id),
            ctx.rate_override,
        ) {
            Ok(converted) => Ok(converted),
            Err(Error::Currency(e)) => {
                warn!(
                    "Failed to convert {} from {} to {}, keeping original value: {}",
                    label, currency, self.base_currency, e
                );
                Ok(amount)
            }
            Err(e) => Err(e),
        }
    }

    /// Unit cost recomputed from current reference data: the newest active
    /// purchase price (or the manufacture price when none exists) plus the
    /// line's own expenses spread over its quantity.
    fn fresh_line_cost(
        &self,
        equipment: &Equipment,
        item: &EquipmentListItem,
        ctx: &ConversionContext,
    ) -> Result<LineCost> {
        let purchase = self
            .equipment_repository
            .get_latest_active_purchase_price(&equipment.id)?;
        let purchase_base = match &purchase {
            Some(record) => self.to_base("purchase price", record.price, &record.currency, ctx)?,
            None => match equipment.manufacture_price {
                Some(price) => {
                    let currency = equipment
                        .manufacture_currency
                        .as_deref()
                        .unwrap_or(&self.base_currency);
                    self.to_base("manufacture price", price, currency, ctx)?
                }
                None => Decimal::ZERO,
            },
        };

        let mut row_total = Decimal::ZERO;
        for expense in &item.row_expenses {
            row_total += self.to_base("row expense", expense.amount, &expense.currency, ctx)?;
        }

        let quantity = Decimal::from(item.quantity);
        let unit_cost = if quantity.is_zero() {
            purchase_base
        } else {
            purchase_base + row_total / quantity
        };
        Ok(LineCost::Fresh {
            base_unit_cost: round_money(unit_cost),
            purchase_price_base: round_money(purchase_base),
        })
    }

    /// Unit sale price: the equipment's catalog price, else the price stored
    /// on the line, else the unit cost. Zero counts as unset.
    fn sale_unit(equipment: &Equipment, item: &EquipmentListItem, base_unit: Decimal) -> Decimal {
        equipment
            .sale_price
            .filter(|price| !price.is_zero())
            .or(item.price_per_unit.filter(|price| !price.is_zero()))
            .unwrap_or(base_unit)
    }

    fn margin_percent(margin: Decimal, base: Decimal) -> Decimal {
        if base.is_zero() {
            Decimal::ZERO
        } else {
            round_money(margin / base * Decimal::ONE_HUNDRED)
        }
    }

    /// Computes the dissolution without touching storage.
    pub fn build_pricing(&self, proposal_id: &str) -> Result<ProposalPricing> {
        let proposal = self.proposal_repository.get_proposal(proposal_id)?;
        let ctx = ConversionContext {
            as_of: proposal
                .exchange_rate_date
                .unwrap_or_else(|| Utc::now().date_naive()),
            proposal_id: &proposal.id,
            rate_override: proposal.exchange_rate.filter(|rate| !rate.is_zero()),
        };

        let lists = self.proposal_repository.get_equipment_lists(&proposal.id)?;
        let mut lines: Vec<WorkLine> = Vec::new();
        for list in &lists {
            for item in self.proposal_repository.get_list_items(&list.id)? {
                let equipment = self.equipment_repository.get_equipment(&item.equipment_id)?;
                let cost = if item.calculated_data.has_saved_data() {
                    LineCost::Cached(item.calculated_data.clone())
                } else {
                    self.fresh_line_cost(&equipment, &item, &ctx)?
                };
                lines.push(WorkLine {
                    item,
                    equipment,
                    cost,
                });
            }
        }

        let mut total_base_cost = Decimal::ZERO;
        let mut total_quantity = Decimal::ZERO;
        for line in &lines {
            let quantity = Decimal::from(line.item.quantity);
            total_base_cost += line.base_unit() * quantity;
            total_quantity += quantity;
        }

        // List-level overhead: taxes, delivery and attached expenses, with
        // relative expenses applied to the full base cost sum.
        let mut overhead_total = Decimal::ZERO;
        for list in &lists {
            overhead_total += list.tax_price + list.delivery_price;
            for expense in self.proposal_repository.get_list_expenses(&list.id)? {
                overhead_total += expense.contribution(total_base_cost);
            }
        }

        let mut priced = Vec::with_capacity(lines.len());
        let mut sale_total = Decimal::ZERO;
        let mut total_margin = Decimal::ZERO;
        for line in &lines {
            let quantity = Decimal::from(line.item.quantity);
            let base_unit = line.base_unit();
            let sale = round_money(Self::sale_unit(&line.equipment, &line.item, base_unit));

            let (purchase_base, allocated, margin, margin_pct, from_saved) = match &line.cost {
                LineCost::Cached(figures) => {
                    let allocated = figures.overhead_base.unwrap_or(Decimal::ZERO);
                    let margin = figures
                        .margin_per_unit
                        .unwrap_or(sale - base_unit - allocated);
                    let margin_pct = figures
                        .margin_percentage
                        .unwrap_or_else(|| Self::margin_percent(margin, base_unit));
                    (
                        figures.purchase_price_base.unwrap_or(Decimal::ZERO),
                        allocated,
                        margin,
                        margin_pct,
                        true,
                    )
                }
                LineCost::Fresh {
                    purchase_price_base,
                    ..
                } => {
                    // Overhead lands on each unit in proportion to its base
                    // cost; with a zero cost sum it spreads evenly.
                    let allocated = if !total_base_cost.is_zero() {
                        round_money(overhead_total * base_unit / total_base_cost)
                    } else if !total_quantity.is_zero() {
                        round_money(overhead_total / total_quantity)
                    } else {
                        Decimal::ZERO
                    };
                    let margin = sale - base_unit - allocated;
                    (
                        *purchase_price_base,
                        allocated,
                        margin,
                        Self::margin_percent(margin, base_unit),
                        false,
                    )
                }
            };

            sale_total += sale * quantity;
            total_margin += margin * quantity;
            priced.push(PricedLine {
                item_id: line.item.id.clone(),
                equipment_id: line.equipment.id.clone(),
                equipment_name: line.equipment.name.clone(),
                description: line.equipment.description.clone(),
                unit: line.equipment.unit.clone(),
                quantity: line.item.quantity,
                price_per_unit: sale,
                total_price: sale * quantity,
                base_cost: base_unit,
                allocated_overhead: allocated,
                margin_per_unit: margin,
                margin_percentage: margin_pct,
                margin_total: margin * quantity,
                purchase_price_base: purchase_base,
                from_saved,
            });
        }

        let services_total = proposal.services_total();
        let (target_total, total_derived) = if !proposal.total_price.is_zero() {
            (proposal.total_price, false)
        } else {
            (round_money(sale_total + services_total), true)
        };
        let total_margin_percentage = if total_base_cost.is_zero() {
            Decimal::ZERO
        } else {
            round_money(total_margin / total_base_cost * Decimal::ONE_HUNDRED)
                .clamp(-MARGIN_PERCENTAGE_CAP, MARGIN_PERCENTAGE_CAP)
        };

        Ok(ProposalPricing {
            proposal_id: proposal.id.clone(),
            base_currency: self.base_currency.clone(),
            lines: priced,
            total_base_cost,
            overhead_total: round_money(overhead_total),
            sale_total,
            services_total,
            target_total,
            total_margin,
            total_margin_percentage,
            total_derived,
        })
    }

    /// Computes the dissolution and stores it: line prices and frozen
    /// figures, proposal margins and the report package, in one transaction.
    /// A derived target total is written back to the proposal.
    pub async fn build_and_persist(&self, proposal_id: &str) -> Result<ProposalPricing> {
        let pricing = self.build_pricing(proposal_id)?;

        let updates: Vec<LineFigureUpdate> = pricing
            .lines
            .iter()
            .map(|line| LineFigureUpdate {
                item_id: line.item_id.clone(),
                price_per_unit: line.price_per_unit,
                total_price: line.total_price,
                figures: SavedLineFigures {
                    purchase_price_base: Some(line.purchase_price_base),
                    base_cost: Some(line.base_cost),
                    overhead_base: Some(line.allocated_overhead),
                    margin_per_unit: Some(line.margin_per_unit),
                    margin_percentage: Some(line.margin_percentage),
                },
            })
            .collect();
        let package = serde_json::to_value(&pricing)?;

        self.proposal_repository
            .save_pricing_results(
                proposal_id,
                &updates,
                pricing.total_margin,
                pricing.total_margin_percentage,
                pricing.total_derived.then_some(pricing.target_total),
                package,
            )
            .await?;
        debug!(
            "Persisted pricing for proposal {}: {} lines, margin {}",
            proposal_id,
            pricing.lines.len(),
            pricing.total_margin
        );
        Ok(pricing)
    }
}
