pub mod cost_service;
pub mod pricing_service;
pub mod proposals_errors;
pub mod proposals_model;
pub mod proposals_repository;
pub mod proposals_traits;


pub use cost_service::{CostSummary, ProposalCostService};
pub use pricing_service::{PricedLine, ProposalPricing, ProposalPricingService};
pub use proposals_errors::ProposalError;
pub use proposals_model::{
    AdditionalService, EquipmentList, EquipmentListItem, LineFigureUpdate, NewEquipmentList,
    NewLineItem, NewProposal, Proposal, ProposalStatus, RowExpense, SavedLineFigures,
};
pub use proposals_repository::ProposalRepository;
pub use proposals_traits::ProposalRepositoryTrait;
