use cosmwasm_std::{OverflowError, StdError};
use cw_controllers::AdminError;
use cw_utils::PaymentError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),
    #[error("{0}")]
    Admin(#[from] AdminError),
    #[error("{0}")]
    Payment(#[from] PaymentError),
    #[error("{0}")]
    Overflow(#[from] OverflowError),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("No historical rewards entry for period {0}")]
    HistoricalEntryNotFound(u64),
    #[error("No coostaker rewards tracker for {0}")]
    TrackerNotFound(String),
    #[error("The rewards pool cannot cover {0}")]
    InsufficientRewardsPool(String),
}
