pub mod calculation_repository;
pub mod cost_calculator;
pub mod costing_model;
pub mod costing_service;
pub mod costing_traits;

pub use calculation_repository::CalculationRepository;
pub use cost_calculator::CostCalculator;
pub use costing_model::{
    AdditionalExpense, CalculationInput, ConversionOutcome, CostBreakdown, CostCalculation,
    ExpenseKind, ManualOverrides, NewAdditionalExpense, NewCalculationRecord, ProposalScope,
    RateSnapshot,
};
pub use costing_service::CostingService;
pub use costing_traits::{CalculationRepositoryTrait, CostCalculatorTrait, ExpenseProviderTrait};

#[cfg(test)]
mod cost_calculator_tests;
