#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, RwLock};

    use crate::costing::cost_calculator::CostCalculator;
    use crate::costing::costing_model::{
        AdditionalExpense, CalculationInput, ConversionOutcome, CostCalculation, ExpenseKind,
        ManualOverrides, NewCalculationRecord, ProposalScope,
    };
    use crate::costing::costing_service::CostingService;
    use crate::costing::costing_traits::{
        CalculationRepositoryTrait, CostCalculatorTrait, ExpenseProviderTrait,
    };
    use crate::equipment::equipment_errors::EquipmentError;
    use crate::equipment::equipment_model::{
        Equipment, LogisticsCost, NewEquipment, NewLogisticsCost, NewPurchasePrice, PriceSource,
        PurchasePrice, RouteType,
    };
    use crate::equipment::equipment_traits::EquipmentRepositoryTrait;
    use crate::errors::{Error, Result};
    use crate::fx::fx_errors::FxError;
    use crate::fx::{ExchangeRate, FxServiceTrait, RateSource};
    use crate::utils::round_money;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ts(age_days: i64) -> NaiveDateTime {
        date(2026, 2, 1).and_hms_opt(12, 0, 0).unwrap() - Duration::days(age_days)
    }

    fn equipment(id: &str, name: &str) -> Equipment {
        Equipment {
            id: id.to_string(),
            name: name.to_string(),
            sku: None,
            unit: "pcs".to_string(),
            description: None,
            manufacture_price: None,
            manufacture_currency: None,
            sale_price: None,
            created_at: ts(30),
            updated_at: ts(30),
        }
    }

    fn price(id: &str, owner: &str, value: Decimal, currency: &str, age_days: i64) -> PurchasePrice {
        PurchasePrice {
            id: id.to_string(),
            equipment_id: owner.to_string(),
            source: PriceSource::Foreign,
            price: value,
            currency: currency.to_string(),
            is_active: true,
            notes: None,
            created_at: ts(age_days),
            updated_at: ts(age_days),
        }
    }

    fn logistics(
        id: &str,
        owner: &str,
        route: RouteType,
        cost: Decimal,
        currency: &str,
        age_days: i64,
    ) -> LogisticsCost {
        LogisticsCost {
            id: id.to_string(),
            equipment_id: owner.to_string(),
            route,
            cost,
            currency: currency.to_string(),
            is_active: true,
            notes: None,
            created_at: ts(age_days),
            updated_at: ts(age_days),
        }
    }

    fn expense(id: &str, name: &str, kind: ExpenseKind, value: Decimal) -> AdditionalExpense {
        AdditionalExpense {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            value,
            created_at: ts(0),
            updated_at: ts(0),
        }
    }

    // --- Mock equipment repository ---
    #[derive(Default)]
    struct MockEquipmentRepository {
        equipment: Vec<Equipment>,
        purchase_prices: Vec<PurchasePrice>,
        logistics: Vec<LogisticsCost>,
    }

    #[async_trait]
    impl EquipmentRepositoryTrait for MockEquipmentRepository {
        fn get_equipment(&self, item_id: &str) -> Result<Equipment> {
            self.equipment
                .iter()
                .find(|e| e.id == item_id)
                .cloned()
                .ok_or_else(|| {
                    Error::Equipment(EquipmentError::NotFound(format!(
                        "Equipment with id {} not found",
                        item_id
                    )))
                })
        }

        fn get_purchase_price(&self, price_id: &str, owner_id: &str) -> Result<PurchasePrice> {
            self.purchase_prices
                .iter()
                .find(|p| p.id == price_id && p.equipment_id == owner_id && p.is_active)
                .cloned()
                .ok_or_else(|| {
                    Error::Equipment(EquipmentError::PurchasePriceNotFound(format!(
                        "Purchase price with id {} not found for equipment {}",
                        price_id, owner_id
                    )))
                })
        }

        fn get_latest_active_purchase_price(
            &self,
            owner_id: &str,
        ) -> Result<Option<PurchasePrice>> {
            let mut active: Vec<&PurchasePrice> = self
                .purchase_prices
                .iter()
                .filter(|p| p.equipment_id == owner_id && p.is_active)
                .collect();
            active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(active.first().map(|p| (*p).clone()))
        }

        fn get_logistics_cost(&self, logistics_id: &str, owner_id: &str) -> Result<LogisticsCost> {
            self.logistics
                .iter()
                .find(|l| l.id == logistics_id && l.equipment_id == owner_id && l.is_active)
                .cloned()
                .ok_or_else(|| {
                    Error::Equipment(EquipmentError::LogisticsNotFound(format!(
                        "Logistics cost with id {} not found for equipment {}",
                        logistics_id, owner_id
                    )))
                })
        }

        fn get_active_logistics(&self, owner_id: &str) -> Result<Vec<LogisticsCost>> {
            let mut active: Vec<LogisticsCost> = self
                .logistics
                .iter()
                .filter(|l| {
                    l.equipment_id == owner_id && l.is_active && !l.route.is_warehouse()
                })
                .cloned()
                .collect();
            active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(active)
        }

        fn get_warehouse_cost(&self, owner_id: &str) -> Result<Option<LogisticsCost>> {
            let mut hits: Vec<&LogisticsCost> = self
                .logistics
                .iter()
                .filter(|l| l.equipment_id == owner_id && l.is_active && l.route.is_warehouse())
                .collect();
            hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(hits.first().map(|l| (*l).clone()))
        }

        async fn create_equipment(&self, _new_equipment: NewEquipment) -> Result<Equipment> {
            unimplemented!("not used in calculator tests")
        }

        async fn add_purchase_price(&self, _new_price: NewPurchasePrice) -> Result<PurchasePrice> {
            unimplemented!("not used in calculator tests")
        }

        async fn add_logistics_cost(&self, _new_cost: NewLogisticsCost) -> Result<LogisticsCost> {
            unimplemented!("not used in calculator tests")
        }

        async fn deactivate_purchase_price(&self, _price_id: &str) -> Result<()> {
            unimplemented!("not used in calculator tests")
        }

        async fn deactivate_logistics_cost(&self, _logistics_id: &str) -> Result<()> {
            unimplemented!("not used in calculator tests")
        }
    }

    // --- Mock expense provider ---
    #[derive(Default)]
    struct MockExpenseProvider {
        attached: Vec<(String, String, AdditionalExpense)>,
        catalog: Vec<AdditionalExpense>,
    }

    impl ExpenseProviderTrait for MockExpenseProvider {
        fn get_expenses_for_equipment(
            &self,
            proposal_id: &str,
            equipment_id: &str,
        ) -> Result<Vec<AdditionalExpense>> {
            Ok(self
                .attached
                .iter()
                .filter(|(p, e, _)| p == proposal_id && e == equipment_id)
                .map(|(_, _, x)| x.clone())
                .collect())
        }

        fn get_expense(&self, expense_id: &str) -> Result<Option<AdditionalExpense>> {
            Ok(self.catalog.iter().find(|x| x.id == expense_id).cloned())
        }
    }

    // --- Mock fx service ---
    #[derive(Default)]
    struct MockFxService {
        rates: Vec<(String, String, Decimal)>,
    }

    impl MockFxService {
        fn new(rates: Vec<(&str, &str, Decimal)>) -> Self {
            MockFxService {
                rates: rates
                    .into_iter()
                    .map(|(f, t, r)| (f.to_string(), t.to_string(), r))
                    .collect(),
            }
        }

        fn find_rate(&self, from: &str, to: &str) -> Option<Decimal> {
            self.rates
                .iter()
                .find(|(f, t, _)| f == from && t == to)
                .map(|(_, _, r)| *r)
        }
    }

    #[async_trait]
    impl FxServiceTrait for MockFxService {
        fn convert_currency(&self, amount: Decimal, from: &str, to: &str) -> Result<Decimal> {
            self.convert_currency_for_date(amount, from, to, date(2026, 2, 1), None, None)
        }

        fn convert_currency_for_date(
            &self,
            amount: Decimal,
            from: &str,
            to: &str,
            _as_of: NaiveDate,
            _proposal_id: Option<&str>,
            override_rate: Option<Decimal>,
        ) -> Result<Decimal> {
            if from == to {
                return Ok(amount);
            }
            if let Some(rate) = override_rate {
                return Ok(round_money(amount * rate));
            }
            match self.find_rate(from, to) {
                Some(rate) => Ok(round_money(amount * rate)),
                None => Err(Error::Currency(FxError::RateNotFound(format!(
                    "{}/{}",
                    from, to
                )))),
            }
        }

        fn get_latest_rate(
            &self,
            from: &str,
            to: &str,
            as_of: NaiveDate,
            _proposal_id: Option<&str>,
        ) -> Result<Option<ExchangeRate>> {
            Ok(self.find_rate(from, to).map(|value| ExchangeRate {
                id: format!("rate-{}-{}", from, to),
                from_currency: from.to_string(),
                to_currency: to.to_string(),
                rate: value,
                rate_date: as_of,
                source: RateSource::Official,
                proposal_id: None,
                is_active: true,
                created_at: ts(0),
            }))
        }

        async fn add_manual_rate(
            &self,
            _new_rate: crate::fx::NewExchangeRate,
        ) -> Result<ExchangeRate> {
            unimplemented!("not used in calculator tests")
        }

        async fn add_proposal_rate(
            &self,
            _new_rate: crate::fx::NewExchangeRate,
            _proposal_id: &str,
        ) -> Result<ExchangeRate> {
            unimplemented!("not used in calculator tests")
        }

        async fn upsert_official_rate(
            &self,
            _new_rate: crate::fx::NewExchangeRate,
        ) -> Result<Option<ExchangeRate>> {
            unimplemented!("not used in calculator tests")
        }

        async fn deactivate_rate(&self, _id: &str) -> Result<()> {
            unimplemented!("not used in calculator tests")
        }

        async fn prune_expired_rates(&self) -> Result<usize> {
            unimplemented!("not used in calculator tests")
        }
    }

    fn build_calculator(
        repo: MockEquipmentRepository,
        provider: MockExpenseProvider,
        fx: MockFxService,
    ) -> CostCalculator {
        CostCalculator::new(
            Arc::new(repo),
            Arc::new(provider),
            Arc::new(fx),
            "KZT".to_string(),
        )
    }

    fn input_with_date() -> CalculationInput {
        CalculationInput {
            as_of: Some(date(2026, 2, 1)),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_breakdown_with_percentage_expense() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: vec![price("pp1", "eq1", dec!(100), "USD", 0)],
            logistics: vec![
                logistics("lg1", "eq1", RouteType::Import, dec!(20), "USD", 0),
                logistics("wh1", "eq1", RouteType::Warehouse, dec!(5000), "KZT", 0),
            ],
        };
        let provider = MockExpenseProvider {
            attached: Vec::new(),
            catalog: vec![expense(
                "ex1",
                "packaging",
                ExpenseKind::Percentage,
                dec!(5),
            )],
        };
        let fx = MockFxService::new(vec![("USD", "KZT", dec!(450))]);
        let calculator = build_calculator(repo, provider, fx);

        let input = CalculationInput {
            additional_expense_id: Some("ex1".to_string()),
            ..input_with_date()
        };
        let breakdown = calculator.calculate("eq1", &input).unwrap();

        assert_eq!(breakdown.purchase_price.value, dec!(100));
        assert_eq!(
            breakdown.purchase_price.base_value,
            ConversionOutcome::Converted { value: dec!(45000) }
        );
        assert_eq!(
            breakdown.logistics.base_value,
            ConversionOutcome::Converted { value: dec!(9000) }
        );
        assert_eq!(breakdown.warehouse.base_value.value(), dec!(5000));
        assert_eq!(breakdown.base_cost, dec!(59000));
        assert_eq!(breakdown.additional_costs.value, dec!(2950));
        assert_eq!(breakdown.total_cost_base, dec!(61950));
        assert_eq!(breakdown.total_cost_target, dec!(61950));
        assert_eq!(breakdown.target_currency, "KZT");

        assert_eq!(breakdown.exchange_rate.rate_id.as_deref(), Some("rate-USD-KZT"));
        assert_eq!(breakdown.exchange_rate.value, dec!(450));
        assert_eq!(breakdown.exchange_rate.from_currency, "USD");
    }

    #[test]
    fn test_missing_equipment_is_hard_error() {
        let calculator = build_calculator(
            MockEquipmentRepository::default(),
            MockExpenseProvider::default(),
            MockFxService::default(),
        );
        let result = calculator.calculate("ghost", &input_with_date());
        assert!(matches!(
            result,
            Err(Error::Equipment(EquipmentError::NotFound(_)))
        ));
    }

    #[test]
    fn test_explicit_selectors_must_resolve() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: vec![price("pp1", "eq1", dec!(100), "USD", 0)],
            logistics: vec![logistics("lg1", "eq1", RouteType::Import, dec!(20), "USD", 0)],
        };
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::new(vec![("USD", "KZT", dec!(450))]),
        );

        let bad_price = CalculationInput {
            purchase_price_id: Some("ghost".to_string()),
            ..input_with_date()
        };
        assert!(matches!(
            calculator.calculate("eq1", &bad_price),
            Err(Error::Equipment(EquipmentError::PurchasePriceNotFound(_)))
        ));

        let bad_logistics = CalculationInput {
            logistics_id: Some("ghost".to_string()),
            ..input_with_date()
        };
        assert!(matches!(
            calculator.calculate("eq1", &bad_logistics),
            Err(Error::Equipment(EquipmentError::LogisticsNotFound(_)))
        ));
    }

    #[test]
    fn test_auto_selection_with_no_data_yields_zero_components() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: Vec::new(),
            logistics: Vec::new(),
        };
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::default(),
        );

        let breakdown = calculator.calculate("eq1", &input_with_date()).unwrap();
        assert_eq!(breakdown.purchase_price.value, dec!(0));
        assert!(breakdown.purchase_price.record_id.is_none());
        assert!(breakdown.purchase_price.currency.is_none());
        assert_eq!(breakdown.total_cost_base, dec!(0));
        assert!(breakdown.exchange_rate.rate_id.is_none());
        assert_eq!(breakdown.exchange_rate.value, dec!(1));
    }

    #[test]
    fn test_latest_active_purchase_price_wins() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: vec![
                price("old", "eq1", dec!(90), "USD", 10),
                price("new", "eq1", dec!(100), "USD", 1),
            ],
            logistics: Vec::new(),
        };
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::new(vec![("USD", "KZT", dec!(450))]),
        );

        let breakdown = calculator.calculate("eq1", &input_with_date()).unwrap();
        assert_eq!(breakdown.purchase_price.record_id.as_deref(), Some("new"));
        assert_eq!(breakdown.purchase_price.value, dec!(100));
    }

    #[test]
    fn test_manual_override_replaces_selected_value() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: vec![price("pp1", "eq1", dec!(100), "USD", 0)],
            logistics: Vec::new(),
        };
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::new(vec![("USD", "KZT", dec!(450))]),
        );

        let input = CalculationInput {
            overrides: ManualOverrides {
                purchase_price: Some(dec!(200)),
                ..Default::default()
            },
            ..input_with_date()
        };
        let breakdown = calculator.calculate("eq1", &input).unwrap();
        assert_eq!(breakdown.purchase_price.value, dec!(200));
        assert_eq!(breakdown.purchase_price.base_value.value(), dec!(90000));
        // The record reference still points at what auto-selection found.
        assert_eq!(breakdown.purchase_price.record_id.as_deref(), Some("pp1"));
    }

    #[test]
    fn test_proposal_rate_backs_conversion_when_no_manual_rate() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: vec![price("pp1", "eq1", dec!(100), "USD", 0)],
            logistics: Vec::new(),
        };
        // No stored rates: conversion can only succeed through the override.
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::default(),
        );

        let input = CalculationInput {
            proposal: Some(ProposalScope {
                proposal_id: "p1".to_string(),
                currency: "USD".to_string(),
                exchange_rate: Some(dec!(450)),
                exchange_rate_date: None,
            }),
            ..input_with_date()
        };
        let breakdown = calculator.calculate("eq1", &input).unwrap();
        assert_eq!(
            breakdown.purchase_price.base_value,
            ConversionOutcome::Converted { value: dec!(45000) }
        );
        // No rate record existed, so the snapshot falls back to identity.
        assert!(breakdown.exchange_rate.rate_id.is_none());
    }

    #[test]
    fn test_manual_rate_beats_proposal_rate() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: vec![price("pp1", "eq1", dec!(100), "USD", 0)],
            logistics: Vec::new(),
        };
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::default(),
        );

        let input = CalculationInput {
            proposal: Some(ProposalScope {
                proposal_id: "p1".to_string(),
                currency: "USD".to_string(),
                exchange_rate: Some(dec!(450)),
                exchange_rate_date: None,
            }),
            overrides: ManualOverrides {
                exchange_rate_value: Some(dec!(400)),
                ..Default::default()
            },
            ..input_with_date()
        };
        let breakdown = calculator.calculate("eq1", &input).unwrap();
        assert_eq!(breakdown.purchase_price.base_value.value(), dec!(40000));
    }

    #[test]
    fn test_two_pass_logistics_totals_diverge() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: Vec::new(),
            logistics: vec![
                logistics("lg1", "eq1", RouteType::Import, dec!(100), "USD", 0),
                logistics("lg2", "eq1", RouteType::Domestic, dec!(50), "EUR", 1),
                logistics("lg3", "eq1", RouteType::Import, dec!(200), "USD", 2),
            ],
        };
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::new(vec![("USD", "KZT", dec!(450)), ("EUR", "KZT", dec!(500))]),
        );

        let breakdown = calculator.calculate("eq1", &input_with_date()).unwrap();
        // Display total only sums records in the newest record's currency.
        assert_eq!(breakdown.logistics.value, dec!(300));
        assert_eq!(breakdown.logistics.currency.as_deref(), Some("USD"));
        assert_eq!(breakdown.logistics.record_id.as_deref(), Some("lg1"));
        // The base total converts every record individually.
        assert_eq!(
            breakdown.logistics.base_value.value(),
            dec!(45000) + dec!(25000) + dec!(90000)
        );
    }

    #[test]
    fn test_auto_logistics_skips_unconvertible_records() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: Vec::new(),
            logistics: vec![
                logistics("lg1", "eq1", RouteType::Import, dec!(100), "USD", 0),
                logistics("lg2", "eq1", RouteType::Domestic, dec!(50), "EUR", 1),
            ],
        };
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::new(vec![("USD", "KZT", dec!(450))]),
        );

        let breakdown = calculator.calculate("eq1", &input_with_date()).unwrap();
        assert_eq!(
            breakdown.logistics.base_value,
            ConversionOutcome::Converted { value: dec!(45000) }
        );
        assert_eq!(breakdown.total_cost_base, dec!(45000));
    }

    #[test]
    fn test_explicit_logistics_conversion_failure_keeps_original_value() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: Vec::new(),
            logistics: vec![logistics(
                "lg1",
                "eq1",
                RouteType::Import,
                dec!(50),
                "EUR",
                0,
            )],
        };
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::default(),
        );

        let input = CalculationInput {
            logistics_id: Some("lg1".to_string()),
            ..input_with_date()
        };
        let breakdown = calculator.calculate("eq1", &input).unwrap();
        match &breakdown.logistics.base_value {
            ConversionOutcome::Unconverted { value, reason } => {
                assert_eq!(*value, dec!(50));
                assert!(reason.contains("EUR"));
            }
            other => panic!("Expected unconverted outcome, got {:?}", other),
        }
        // The degraded number still participates in the base cost.
        assert_eq!(breakdown.base_cost, dec!(50));
    }

    #[test]
    fn test_expense_kinds_apply_to_base_cost() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: vec![price("pp1", "eq1", dec!(1000), "KZT", 0)],
            logistics: Vec::new(),
        };
        let provider = MockExpenseProvider {
            attached: vec![
                (
                    "p1".to_string(),
                    "eq1".to_string(),
                    expense("ex1", "customs", ExpenseKind::Fixed, dec!(100)),
                ),
                (
                    "p1".to_string(),
                    "eq1".to_string(),
                    expense("ex2", "packaging", ExpenseKind::Percentage, dec!(10)),
                ),
                (
                    "p1".to_string(),
                    "eq1".to_string(),
                    expense("ex3", "risk", ExpenseKind::Coefficient, dec!(0.5)),
                ),
            ],
            catalog: Vec::new(),
        };
        let calculator = build_calculator(repo, provider, MockFxService::default());

        let input = CalculationInput {
            proposal: Some(ProposalScope {
                proposal_id: "p1".to_string(),
                currency: "KZT".to_string(),
                exchange_rate: None,
                exchange_rate_date: None,
            }),
            ..input_with_date()
        };
        let breakdown = calculator.calculate("eq1", &input).unwrap();
        assert_eq!(breakdown.base_cost, dec!(1000));
        // 100 fixed + 10% of 1000 + 0.5 x 1000.
        assert_eq!(breakdown.additional_costs.value, dec!(700));
        assert_eq!(breakdown.total_cost_base, dec!(1700));
        // A positive expense never lowers the total.
        assert!(breakdown.total_cost_base >= breakdown.base_cost);
    }

    #[test]
    fn test_unknown_explicit_expense_is_ignored() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: vec![price("pp1", "eq1", dec!(1000), "KZT", 0)],
            logistics: Vec::new(),
        };
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::default(),
        );

        let input = CalculationInput {
            additional_expense_id: Some("ghost".to_string()),
            ..input_with_date()
        };
        let breakdown = calculator.calculate("eq1", &input).unwrap();
        assert_eq!(breakdown.additional_costs.value, dec!(0));
        assert_eq!(breakdown.total_cost_base, dec!(1000));
    }

    #[test]
    fn test_manual_additional_costs_used_verbatim() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: vec![price("pp1", "eq1", dec!(1000), "KZT", 0)],
            logistics: Vec::new(),
        };
        let provider = MockExpenseProvider {
            attached: vec![(
                "p1".to_string(),
                "eq1".to_string(),
                expense("ex1", "packaging", ExpenseKind::Percentage, dec!(10)),
            )],
            catalog: Vec::new(),
        };
        let calculator = build_calculator(repo, provider, MockFxService::default());

        let input = CalculationInput {
            proposal: Some(ProposalScope {
                proposal_id: "p1".to_string(),
                currency: "KZT".to_string(),
                exchange_rate: None,
                exchange_rate_date: None,
            }),
            overrides: ManualOverrides {
                additional_costs: Some(dec!(42)),
                ..Default::default()
            },
            ..input_with_date()
        };
        let breakdown = calculator.calculate("eq1", &input).unwrap();
        assert_eq!(breakdown.additional_costs.value, dec!(42));
        assert_eq!(breakdown.total_cost_base, dec!(1042));
    }

    #[test]
    fn test_target_conversion_reverses_proposal_rate() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: vec![price("pp1", "eq1", dec!(1000), "KZT", 0)],
            logistics: Vec::new(),
        };
        // No stored KZT->RUB rate: only the reversed proposal rate can apply.
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::default(),
        );

        let input = CalculationInput {
            proposal: Some(ProposalScope {
                proposal_id: "p1".to_string(),
                currency: "RUB".to_string(),
                exchange_rate: Some(dec!(5)),
                exchange_rate_date: None,
            }),
            target_currency: Some("RUB".to_string()),
            ..input_with_date()
        };
        let breakdown = calculator.calculate("eq1", &input).unwrap();
        assert_eq!(breakdown.total_cost_base, dec!(1000));
        assert_eq!(breakdown.total_cost_target, dec!(200));
        assert_eq!(breakdown.target_currency, "RUB");
    }

    #[test]
    fn test_target_conversion_failure_leaves_base_value() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: vec![price("pp1", "eq1", dec!(1000), "KZT", 0)],
            logistics: Vec::new(),
        };
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::default(),
        );

        let input = CalculationInput {
            target_currency: Some("USD".to_string()),
            ..input_with_date()
        };
        let breakdown = calculator.calculate("eq1", &input).unwrap();
        assert_eq!(breakdown.total_cost_target, breakdown.total_cost_base);
        assert_eq!(breakdown.target_currency, "USD");
    }

    #[test]
    fn test_production_cost_currency_defaults_to_base() {
        let mut item = equipment("eq1", "Press");
        item.manufacture_price = Some(dec!(700));
        item.manufacture_currency = None;
        let repo = MockEquipmentRepository {
            equipment: vec![item],
            purchase_prices: Vec::new(),
            logistics: Vec::new(),
        };
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::default(),
        );

        let breakdown = calculator.calculate("eq1", &input_with_date()).unwrap();
        assert_eq!(breakdown.production.value, dec!(700));
        assert_eq!(breakdown.production.currency.as_deref(), Some("KZT"));
        assert_eq!(breakdown.production.base_value.value(), dec!(700));
        assert_eq!(breakdown.base_cost, dec!(700));
    }

    // --- Mock calculation repository for the service facade ---
    struct MockCalculationRepository {
        saved: RwLock<Vec<CostCalculation>>,
    }

    impl MockCalculationRepository {
        fn new() -> Self {
            MockCalculationRepository {
                saved: RwLock::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CalculationRepositoryTrait for MockCalculationRepository {
        async fn save(&self, new_record: NewCalculationRecord) -> Result<CostCalculation> {
            let mut saved = self.saved.write().unwrap();
            let next_version = saved
                .iter()
                .filter(|r| {
                    r.equipment_id == new_record.breakdown.equipment_id
                        && r.proposal_id == new_record.proposal_id
                })
                .map(|r| r.version)
                .max()
                .unwrap_or(0)
                + 1;
            let record = CostCalculation::from_breakdown(
                &new_record.breakdown,
                new_record.proposal_id.clone(),
                next_version,
                new_record.is_manual_adjustment,
                new_record.notes.clone(),
                new_record.created_by.clone(),
                None,
            );
            saved.push(record.clone());
            Ok(record)
        }

        fn get_history(
            &self,
            equipment_id: &str,
            proposal_id: Option<&str>,
        ) -> Result<Vec<CostCalculation>> {
            let saved = self.saved.read().unwrap();
            let mut hits: Vec<CostCalculation> = saved
                .iter()
                .filter(|r| r.equipment_id == equipment_id && r.proposal_id.as_deref() == proposal_id)
                .cloned()
                .collect();
            hits.sort_by(|a, b| b.version.cmp(&a.version));
            Ok(hits)
        }

        fn get_latest(
            &self,
            equipment_id: &str,
            proposal_id: Option<&str>,
        ) -> Result<Option<CostCalculation>> {
            Ok(self.get_history(equipment_id, proposal_id)?.into_iter().next())
        }
    }

    #[tokio::test]
    async fn test_service_flags_manual_adjustments_on_save() {
        let repo = MockEquipmentRepository {
            equipment: vec![equipment("eq1", "Pump")],
            purchase_prices: vec![price("pp1", "eq1", dec!(1000), "KZT", 0)],
            logistics: Vec::new(),
        };
        let calculator = build_calculator(
            repo,
            MockExpenseProvider::default(),
            MockFxService::default(),
        );
        let history = Arc::new(MockCalculationRepository::new());
        let service = CostingService::new(Arc::new(calculator), history.clone());

        let plain = service
            .calculate_and_save("eq1", &input_with_date(), None, None)
            .await
            .unwrap();
        assert_eq!(plain.version, 1);
        assert!(!plain.is_manual_adjustment);

        let adjusted_input = CalculationInput {
            overrides: ManualOverrides {
                warehouse_cost: Some(dec!(500)),
                ..Default::default()
            },
            ..input_with_date()
        };
        let adjusted = service
            .calculate_and_save("eq1", &adjusted_input, Some("bumped".to_string()), None)
            .await
            .unwrap();
        assert_eq!(adjusted.version, 2);
        assert!(adjusted.is_manual_adjustment);
        assert_eq!(adjusted.warehouse_base, dec!(500));

        let latest = service.get_latest_calculation("eq1", None).unwrap().unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.notes.as_deref(), Some("bumped"));
    }
}
