use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProposalError {
    #[error("Proposal not found: {0}")]
    NotFound(String),

    #[error("Equipment list not found: {0}")]
    ListNotFound(String),

    #[error("Line item not found: {0}")]
    ItemNotFound(String),

    #[error("Invalid proposal data: {0}")]
    InvalidData(String),
}
