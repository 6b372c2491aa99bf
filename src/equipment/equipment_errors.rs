use thiserror::Error;

#[derive(Error, Debug)]
pub enum EquipmentError {
    #[error("Equipment not found: {0}")]
    NotFound(String),

    #[error("Purchase price not found: {0}")]
    PurchasePriceNotFound(String),

    #[error("Logistics cost not found: {0}")]
    LogisticsNotFound(String),

    #[error("Invalid equipment data: {0}")]
    InvalidData(String),
}
