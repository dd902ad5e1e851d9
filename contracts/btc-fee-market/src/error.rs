use cosmwasm_std::StdError;
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
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Refundable gas {refundable} exceeds the block total {total}")]
    RefundableGasExceedsTotal { refundable: u64, total: u64 },
    #[error("Gas value {0} overflows int64")]
    GasOverflowsInt64(u64),
}
