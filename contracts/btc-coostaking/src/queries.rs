use cosmwasm_std::{Deps, StdResult};

use crate::error::ContractError;
use crate::msg::PendingRewardsResponse;
use crate::rewards;
use crate::state::{
    Config, CoostakerRewardsTracker, CurrentRewards, HistoricalRewards, Params,
    COOSTAKER_TRACKERS, CONFIG, CURRENT_REWARDS, HISTORICAL_REWARDS, PARAMS,
};

pub fn config(deps: Deps) -> StdResult<Config> {
    CONFIG.load(deps.storage)
}

pub fn params(deps: Deps) -> StdResult<Params> {
    PARAMS.load(deps.storage)
}

pub fn current_rewards(deps: Deps) -> StdResult<CurrentRewards> {
    CURRENT_REWARDS.load(deps.storage)
}

pub fn historical_rewards(deps: Deps, period: u64) -> Result<HistoricalRewards, ContractError> {
    HISTORICAL_REWARDS
        .may_load(deps.storage, period)?
        .ok_or(ContractError::HistoricalEntryNotFound(period))
}

pub fn coostaker_tracker(
    deps: Deps,
    address: String,
) -> Result<CoostakerRewardsTracker, ContractError> {
    let addr = deps.api.addr_validate(&address)?;
    COOSTAKER_TRACKERS
        .may_load(deps.storage, &addr)?
        .ok_or(ContractError::TrackerNotFound(address))
}

/// The settled, withdrawable rewards of a coostaker. Rewards of the open
/// period settle at the next period increment
pub fn pending_rewards(deps: Deps, address: String) -> Result<PendingRewardsResponse, ContractError> {
    let addr = deps.api.addr_validate(&address)?;
    let tracker = COOSTAKER_TRACKERS
        .may_load(deps.storage, &addr)?
        .ok_or(ContractError::TrackerNotFound(address))?;
    let current = CURRENT_REWARDS.load(deps.storage)?;
    let rewards = rewards::calculate_pending(deps.storage, &tracker, current.period - 1)?;
    Ok(PendingRewardsResponse { rewards })
}
