pub mod equipment_errors;
pub mod equipment_model;
pub mod equipment_repository;
pub mod equipment_traits;

pub use equipment_errors::EquipmentError;
pub use equipment_model::{
    Equipment, LogisticsCost, NewEquipment, NewLogisticsCost, NewPurchasePrice, PriceSource,
    PurchasePrice, RouteType,
};
pub use equipment_repository::EquipmentRepository;
pub use equipment_traits::EquipmentRepositoryTrait;
