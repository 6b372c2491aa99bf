use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use log::warn;
use rust_decimal::Decimal;

use crate::costing::costing_model::{
    AdditionalComponent, AdditionalExpense, CalculationInput, ConversionOutcome, CostBreakdown,
    CostComponent, LogisticsComponent, PurchaseComponent, RateSnapshot,
};
use crate::costing::costing_traits::{CostCalculatorTrait, ExpenseProviderTrait};
use crate::equipment::equipment_model::{PriceSource, RouteType};
use crate::equipment::equipment_traits::EquipmentRepositoryTrait;
use crate::errors::{Error, Result};
use crate::fx::FxServiceTrait;

/// Computes the unit cost of goods for one equipment entry: purchase price,
/// logistics, warehouse, production and additional expenses, each normalized
/// into the base currency. Missing reference data degrades to zero or
/// unconverted components instead of failing the whole calculation; only
/// explicitly requested records that cannot be resolved are hard errors.
pub struct CostCalculator {
    equipment_repository: Arc<dyn EquipmentRepositoryTrait>,
    expense_provider: Arc<dyn ExpenseProviderTrait>,
    fx_service: Arc<dyn FxServiceTrait>,
    base_currency: String,
}

impl CostCalculator {
    pub fn new(
        equipment_repository: Arc<dyn EquipmentRepositoryTrait>,
        expense_provider: Arc<dyn ExpenseProviderTrait>,
        fx_service: Arc<dyn FxServiceTrait>,
        base_currency: String,
    ) -> Self {
        CostCalculator {
            equipment_repository,
            expense_provider,
            fx_service,
            base_currency,
        }
    }

    /// Converts one component into the base currency. A missing rate keeps
    /// the original-currency value and records the reason; other errors
    /// propagate.
    fn convert_to_base(
        &self,
        label: &str,
        amount: Decimal,
        currency: Option<&str>,
        as_of: NaiveDate,
        proposal_id: Option<&str>,
        rate_override: Option<Decimal>,
    ) -> Result<ConversionOutcome> {
        let from = match currency {
            Some(code) if code != self.base_currency => code,
            _ => return Ok(ConversionOutcome::Converted { value: amount }),
        };
        match self.fx_service.convert_currency_for_date(
            amount,
            from,
            &self.base_currency,
            as_of,
            proposal_id,
            rate_override,
        ) {
            Ok(converted) => Ok(ConversionOutcome::Converted { value: converted }),
            Err(Error::Currency(e)) => {
                warn!(
                    "Failed to convert {} from {} to {}: {}",
                    label, from, self.base_currency, e
                );
                Ok(ConversionOutcome::Unconverted {
                    value: amount,
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Base-currency logistics total for the auto-selection path: every
    /// active non-warehouse record converted individually, records without
    /// an applicable rate skipped. This intentionally diverges from the
    /// display total, which only sums records matching the first record's
    /// currency.
    fn convert_active_logistics(
        &self,
        equipment_id: &str,
        as_of: NaiveDate,
        proposal_id: Option<&str>,
        rate_override: Option<Decimal>,
    ) -> Result<Decimal> {
        let active = self.equipment_repository.get_active_logistics(equipment_id)?;
        let mut total = Decimal::ZERO;
        for record in &active {
            if record.currency == self.base_currency {
                total += record.cost;
                continue;
            }
            match self.fx_service.convert_currency_for_date(
                record.cost,
                &record.currency,
                &self.base_currency,
                as_of,
                proposal_id,
                rate_override,
            ) {
                Ok(converted) => total += converted,
                Err(Error::Currency(e)) => {
                    warn!(
                        "Failed to convert logistics cost from {} to {}, skipping record {}: {}",
                        record.currency, self.base_currency, record.id, e
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }
}

impl CostCalculatorTrait for CostCalculator {
    fn calculate(&self, equipment_id: &str, input: &CalculationInput) -> Result<CostBreakdown> {
        let as_of = input.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let equipment = self.equipment_repository.get_equipment(equipment_id)?;
        let proposal_id = input.proposal.as_ref().map(|scope| scope.proposal_id.as_str());

        // Purchase price: explicit record, else most recent active, else zero.
        let purchase_record = match &input.purchase_price_id {
            Some(price_id) => Some(
                self.equipment_repository
                    .get_purchase_price(price_id, equipment_id)?,
            ),
            None => self
                .equipment_repository
                .get_latest_active_purchase_price(equipment_id)?,
        };
        let mut purchase_value = Decimal::ZERO;
        let mut purchase_currency: Option<String> = None;
        let mut purchase_source: Option<PriceSource> = None;
        let purchase_record_id = purchase_record.as_ref().map(|record| record.id.clone());
        if let Some(record) = &purchase_record {
            purchase_value = record.price;
            purchase_currency = Some(record.currency.clone());
            purchase_source = Some(record.source);
        }
        if let Some(value) = input.overrides.purchase_price {
            purchase_value = value;
            if let Some(currency) = &input.overrides.purchase_price_currency {
                purchase_currency = Some(currency.clone());
            }
        }

        // Logistics: explicit record, else all active non-warehouse records
        // summed in the currency of the most recent one.
        let mut logistics_value = Decimal::ZERO;
        let mut logistics_currency: Option<String> = None;
        let mut logistics_route: Option<RouteType> = None;
        let mut logistics_record_id: Option<String> = None;
        if let Some(logistics_id) = &input.logistics_id {
            let record = self
                .equipment_repository
                .get_logistics_cost(logistics_id, equipment_id)?;
            logistics_value = record.cost;
            logistics_currency = Some(record.currency.clone());
            logistics_route = Some(record.route);
            logistics_record_id = Some(record.id);
        } else {
            let active = self.equipment_repository.get_active_logistics(equipment_id)?;
            if let Some(first) = active.first() {
                logistics_route = Some(first.route);
                logistics_currency = Some(first.currency.clone());
                logistics_record_id = Some(first.id.clone());
                logistics_value = active
                    .iter()
                    .filter(|record| record.currency == first.currency)
                    .map(|record| record.cost)
                    .sum();
            }
        }
        if let Some(value) = input.overrides.logistics_cost {
            logistics_value = value;
            if let Some(currency) = &input.overrides.logistics_currency {
                logistics_currency = Some(currency.clone());
            }
        }

        // Warehouse cost.
        let warehouse_record = self.equipment_repository.get_warehouse_cost(equipment_id)?;
        let mut warehouse_value = Decimal::ZERO;
        let mut warehouse_currency: Option<String> = None;
        if let Some(record) = &warehouse_record {
            warehouse_value = record.cost;
            warehouse_currency = Some(record.currency.clone());
        }
        if let Some(value) = input.overrides.warehouse_cost {
            warehouse_value = value;
            if let Some(currency) = &input.overrides.warehouse_currency {
                warehouse_currency = Some(currency.clone());
            }
        }

        // Production cost from the equipment's manufacture price.
        let mut production_value = Decimal::ZERO;
        let mut production_currency: Option<String> = None;
        if let Some(price) = equipment.manufacture_price {
            production_value = price;
            production_currency = Some(
                equipment
                    .manufacture_currency
                    .clone()
                    .unwrap_or_else(|| self.base_currency.clone()),
            );
        }
        if let Some(value) = input.overrides.production_cost {
            production_value = value;
            if let Some(currency) = &input.overrides.production_currency {
                production_currency = Some(currency.clone());
            }
        }

        // Additional expenses: the expense set of the proposal's list that
        // contains this equipment, plus an explicitly requested expense.
        // An unknown explicit expense id is ignored.
        let mut expenses: Vec<AdditionalExpense> = Vec::new();
        if let Some(scope) = &input.proposal {
            expenses.extend(
                self.expense_provider
                    .get_expenses_for_equipment(&scope.proposal_id, equipment_id)?,
            );
        }
        if let Some(expense_id) = &input.additional_expense_id {
            if let Some(expense) = self.expense_provider.get_expense(expense_id)? {
                expenses.push(expense);
            }
        }

        // The proposal's fixed rate backs conversions unless a manual rate
        // was supplied. A zero rate counts as absent.
        let mut rate_override = input
            .overrides
            .exchange_rate_value
            .filter(|rate| !rate.is_zero());
        if rate_override.is_none() {
            if let Some(scope) = &input.proposal {
                rate_override = scope.exchange_rate.filter(|rate| !rate.is_zero());
            }
        }

        let purchase_base = self.convert_to_base(
            "purchase price",
            purchase_value,
            purchase_currency.as_deref(),
            as_of,
            proposal_id,
            rate_override,
        )?;

        let logistics_base =
            if input.logistics_id.is_none() && input.overrides.logistics_cost.is_none() {
                ConversionOutcome::Converted {
                    value: self.convert_active_logistics(
                        equipment_id,
                        as_of,
                        proposal_id,
                        rate_override,
                    )?,
                }
            } else if logistics_value > Decimal::ZERO {
                self.convert_to_base(
                    "logistics cost",
                    logistics_value,
                    logistics_currency.as_deref(),
                    as_of,
                    proposal_id,
                    rate_override,
                )?
            } else {
                ConversionOutcome::Converted {
                    value: Decimal::ZERO,
                }
            };

        let warehouse_base = self.convert_to_base(
            "warehouse cost",
            warehouse_value,
            warehouse_currency.as_deref(),
            as_of,
            proposal_id,
            rate_override,
        )?;

        let production_base = self.convert_to_base(
            "production cost",
            production_value,
            production_currency.as_deref(),
            as_of,
            proposal_id,
            rate_override,
        )?;

        let base_cost = purchase_base.value()
            + logistics_base.value()
            + warehouse_base.value()
            + production_base.value();

        // Percentage and coefficient expenses apply to the base cost.
        let additional_total = match input.overrides.additional_costs {
            Some(manual) => manual,
            None => expenses
                .iter()
                .map(|expense| expense.contribution(base_cost))
                .sum(),
        };

        let total_cost_base = base_cost + additional_total;

        let target_currency = input
            .target_currency
            .clone()
            .unwrap_or_else(|| self.base_currency.clone());
        let mut total_cost_target = total_cost_base;
        if target_currency != self.base_currency {
            // The proposal's rate quotes ticket currency into base, so when
            // the target is the ticket currency the inverse applies.
            let mut reverse_override = None;
            if let (Some(rate), Some(scope)) = (rate_override, &input.proposal) {
                if scope.currency == target_currency {
                    reverse_override = Some(Decimal::ONE / rate);
                }
            }
            match self.fx_service.convert_currency_for_date(
                total_cost_base,
                &self.base_currency,
                &target_currency,
                as_of,
                proposal_id,
                reverse_override,
            ) {
                Ok(converted) => total_cost_target = converted,
                Err(Error::Currency(e)) => {
                    warn!(
                        "Failed to convert total cost from {} to {}: {}",
                        self.base_currency, target_currency, e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        // Rate captured for the record: purchase currency into base.
        let snapshot_from = purchase_currency
            .clone()
            .unwrap_or_else(|| self.base_currency.clone());
        let resolved_rate =
            self.fx_service
                .get_latest_rate(&snapshot_from, &self.base_currency, as_of, proposal_id)?;
        let exchange_rate = match &resolved_rate {
            Some(rate) => RateSnapshot::from_rate(rate),
            None => RateSnapshot::identity(&self.base_currency, as_of),
        };

        Ok(CostBreakdown {
            equipment_id: equipment.id,
            equipment_name: equipment.name,
            purchase_price: PurchaseComponent {
                record_id: purchase_record_id,
                value: purchase_value,
                currency: purchase_currency,
                source: purchase_source,
                base_value: purchase_base,
            },
            logistics: LogisticsComponent {
                record_id: logistics_record_id,
                value: logistics_value,
                currency: logistics_currency,
                route: logistics_route,
                base_value: logistics_base,
            },
            warehouse: CostComponent {
                value: warehouse_value,
                currency: warehouse_currency,
                base_value: warehouse_base,
            },
            production: CostComponent {
                value: production_value,
                currency: production_currency,
                base_value: production_base,
            },
            additional_costs: AdditionalComponent {
                record_id: input.additional_expense_id.clone(),
                value: additional_total,
            },
            exchange_rate,
            base_cost,
            total_cost_base,
            total_cost_target,
            target_currency,
            base_currency: self.base_currency.clone(),
            calculation_date: as_of,
        })
    }
}
