use cosmwasm_std::StdError;
use cw_controllers::AdminError;
use cw_utils::PaymentError;
use hex::FromHexError;
use thiserror::Error;

use babylon_apis::btc_staking_api::BTCDelegationStatus;
use babylon_apis::error::StakingApiError;

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),
    #[error("{0}")]
    Admin(#[from] AdminError),
    #[error("{0}")]
    Payment(#[from] PaymentError),
    #[error("{0}")]
    HexError(#[from] FromHexError),
    #[error("{0}")]
    StakingApi(#[from] StakingApiError),
    #[error("{0}")]
    BtcError(#[from] babylon_bitcoin::error::Error),
    #[error("{0}")]
    BtcStaking(#[from] babylon_btcstaking::error::Error),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Params version {0} not found")]
    ParamsVersionNotFound(u32),
    #[error("No params are active at BTC height {0}")]
    NoParamsForBtcHeight(u32),
    #[error("BTC activation height {new} must be larger than the previous one {prev}")]
    ActivationHeightNotIncreasing { prev: u32, new: u32 },
    #[error("Finality provider already exists: {0}")]
    FinalityProviderAlreadyExists(String),
    #[error("Finality provider not found: {0}")]
    FinalityProviderNotFound(String),
    #[error("Finality provider {0} is already slashed")]
    FinalityProviderAlreadySlashed(String),
    #[error("Finality provider {0} is already jailed")]
    FinalityProviderAlreadyJailed(String),
    #[error("Finality provider {0} is not jailed")]
    FinalityProviderNotJailed(String),
    #[error("The address {0} already registered a finality provider")]
    FinalityProviderAddrTaken(String),
    #[error("Commission rate is below the chain minimum {0}")]
    CommissionBelowMinimum(String),
    #[error("Commission rate is above the finality provider's maximum {0}")]
    CommissionAboveMaximum(String),
    #[error("Commission change exceeds the max change rate {0}")]
    CommissionChangeTooLarge(String),
    #[error("Commission was updated within the last 24 hours")]
    CommissionUpdateCooldown {},
    #[error("Invalid staking tx hash: {0}")]
    InvalidStakingTxHash(String),
    #[error("Staking tx hash already exists: {0}")]
    DelegationAlreadyExists(String),
    #[error("BTC delegation not found: {0}")]
    DelegationNotFound(String),
    #[error("BTC delegation is not active: {0}")]
    DelegationNotActive(String),
    #[error("BTC delegation is not in state {expected:?}, got {actual:?}")]
    DelegationWrongState {
        expected: BTCDelegationStatus,
        actual: BTCDelegationStatus,
    },
    #[error("BTC delegation already has an inclusion proof")]
    DelegationAlreadyProven {},
    #[error("Staking tx hash {0} is not in the allow list")]
    NotInAllowList(String),
    #[error("Invalid Btc tx: {0}")]
    InvalidBtcTx(String),
    #[error("Invalid lock time: {0}, max: {1}")]
    InvalidLockTime(u32, u32),
    #[error("Invalid lock time type: must be a block height")]
    InvalidLockTimeType {},
    #[error("Staking value {0} out of bounds [{1}, {2}]")]
    StakingValueOutOfBounds(u64, u64, u64),
    #[error("Staking time {0} out of bounds [{1}, {2}]")]
    StakingTimeOutOfBounds(u32, u32, u32),
    #[error("Unbonding time {0} must be larger than {1}")]
    UnbondingTimeTooShort(u32, u32),
    #[error("Too many finality providers: {0}, max: {1}")]
    TooManyFps(u32, u32),
    #[error("Multi-staked delegations require at least one Babylon finality provider")]
    NoBabylonFp {},
    #[error("Two finality providers belong to the same consumer {0}")]
    DuplicateConsumer(String),
    #[error("Public key {0} is not in the covenant committee")]
    NotInCovenantCommittee(String),
    #[error("Expected {0} covenant signatures, got {1}")]
    WrongNumberOfCovenantSigs(usize, usize),
    #[error("The finality provider key of the evidence does not match the delegation")]
    EvidenceFpMismatch {},
    #[error("Invalid Btc secret key")]
    InvalidBtcSk {},
    #[error("The spending tx does not spend the staking output")]
    WrongStakeSpendingTx {},
    #[error("BTC light client query failed: {0}")]
    LightClientError(String),
    #[error("BTC header {0} not found in the light client")]
    HeaderNotFound(String),
    #[error("Staking tx is not deep enough: depth {0}, required {1}")]
    InsufficientConfirmationDepth(u32, u32),
    #[error("Staking tx time-lock has insufficient headroom: tip {tip}, end height {end_height}, unbonding time {unbonding_time}")]
    InsufficientTimelock {
        tip: u32,
        end_height: u32,
        unbonding_time: u32,
    },
}
