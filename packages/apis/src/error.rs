use hex::FromHexError;
use thiserror::Error;

use cosmwasm_std::StdError;

#[derive(Error, Debug, PartialEq)]
pub enum StakingApiError {
    #[error("{0}")]
    Std(#[from] StdError),
    #[error("{0}")]
    HexError(#[from] FromHexError),
    #[error("Staking tx hash hex string is not {0} chars long")]
    InvalidStakingTxHash(usize),
    #[error("Invalid Btc tx: {0}")]
    InvalidBtcTx(String),
    #[error("Empty Btc public key")]
    EmptyBtcPk,
    #[error("Invalid BIP-340 public key: {0}")]
    InvalidBtcPk(String),
    #[error("Invalid Btc secret key")]
    InvalidBtcSk,
    #[error("Missing proof of possession")]
    MissingPop,
    #[error("Invalid proof of possession: {0}")]
    InvalidPop(String),
    #[error("No finality provider Btc public keys")]
    EmptyBtcPkList,
    #[error("Duplicate finality provider Btc public key: {0}")]
    DuplicatedBtcPk(String),
    #[error("Empty staking tx")]
    EmptyStakingTx,
    #[error("Empty slashing tx")]
    EmptySlashingTx,
    #[error("Empty unbonding tx")]
    EmptyUnbondingTx,
    #[error("Invalid lock time blocks: {0}, max: {1}")]
    InvalidLockTime(u32, u32),
    #[error("Empty signature from the delegator")]
    EmptySignature,
    #[error("Invalid inclusion proof: {0}")]
    InvalidInclusionProof(String),
    #[error("Invalid commission rates: {0}")]
    InvalidCommissionRates(String),
    #[error("Description error: {0}")]
    DescriptionErr(String),
}

impl StakingApiError {
    pub fn description_err(msg: impl Into<String>) -> Self {
        StakingApiError::DescriptionErr(msg.into())
    }
}
