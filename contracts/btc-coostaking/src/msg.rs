use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Coin, Uint128};

use crate::state::{Config, CoostakerRewardsTracker, CurrentRewards, HistoricalRewards, Params};

#[cw_serde]
pub struct InstantiateMsg {
    /// The btc-staking contract, sole source of BTC stake updates
    pub staking: String,
    /// The caller authorised to report native stake updates
    pub epoching: Option<String>,
    /// The incentive contract holding the reward gauges
    pub incentive: String,
    /// Bond denom; queried from the staking module when unset
    pub denom: Option<String>,
    pub params: Option<Params>,
    pub admin: Option<String>,
}

/// Net satoshi movement of one coostaker, discovered during power event
/// replay in the staking contract
#[cw_serde]
pub struct CoostakerSatsUpdate {
    pub staker_addr: String,
    pub added_sat: u64,
    pub removed_sat: u64,
}

#[cw_serde]
pub enum ExecuteMsg {
    /// Change the admin
    UpdateAdmin { admin: Option<String> },
    /// Replace the coostaking params. Restricted to the admin
    UpdateParams { params: Params },
    /// BTC stake movements from the staking contract's event replay.
    /// Restricted to the staking contract
    UpdateCoostakerSats { updates: Vec<CoostakerSatsUpdate> },
    /// Native stake update of one coostaker. Restricted to the epoching
    /// caller (or the admin when unset)
    UpdateCoostakerBaby {
        staker_addr: String,
        active_baby: Uint128,
    },
    /// Book the attached funds into the rewards pool
    AddRewards {},
    /// Withdraw the sender's settled rewards into its reward gauge
    WithdrawRewards {},
}

#[cw_serde]
pub enum SudoMsg {
    /// Called by the host once per block. Sweeps new bond-denom revenue into
    /// the rewards pool
    BeginBlock {},
    /// Called by the host once per block after transactions
    EndBlock {},
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(Config)]
    Config {},
    #[returns(Params)]
    Params {},
    #[returns(cw_controllers::AdminResponse)]
    Admin {},
    #[returns(CurrentRewards)]
    CurrentRewards {},
    #[returns(HistoricalRewards)]
    HistoricalRewards { period: u64 },
    #[returns(CoostakerRewardsTracker)]
    CoostakerTracker { address: String },
    #[returns(PendingRewardsResponse)]
    PendingRewards { address: String },
}

#[cw_serde]
pub struct PendingRewardsResponse {
    /// Settled, withdrawable rewards (unscaled)
    pub rewards: Vec<Coin>,
}
