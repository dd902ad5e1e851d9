use bitcoin::hashes::Hash;
use bitcoin::Txid;
use cosmwasm_std::{Deps, Order, StdResult};
use cw_storage_plus::Bound;

use babylon_apis::btc_staking_api::HASH_SIZE;

use crate::error::ContractError;
use crate::msg::{
    ActivatedHeightResponse, BtcDelegationsResponse, DelegationsByFpResponse,
    FinalityProviderInfo, FinalityProvidersResponse, LargestBtcReorgResponse,
    ParamsByBtcHeightResponse, PendingEventsResponse, VotingPowerResponse,
    VotingPowerTableResponse,
};
use crate::staking::staking_tx_hash_from_hex;
use crate::state::config::{Config, CONFIG};
use crate::state::params::{self, Params};
use crate::state::power::{
    ACTIVATED_HEIGHT, LARGEST_BTC_REORG, POWER_DIST_EVENTS, VOTING_POWER,
};
use crate::state::staking::{delegator_index, BtcDelegation, FinalityProvider, DELEGATIONS, FPS};

pub fn config(deps: Deps) -> StdResult<Config> {
    CONFIG.load(deps.storage)
}

pub fn params(deps: Deps) -> StdResult<Params> {
    params::get_params(deps.storage)
}

pub fn params_by_version(deps: Deps, version: u32) -> Result<Params, ContractError> {
    params::get_params_by_version(deps.storage, version)
}

pub fn params_by_btc_height(
    deps: Deps,
    btc_height: u32,
) -> Result<ParamsByBtcHeightResponse, ContractError> {
    let (version, params) = params::get_params_for_btc_height(deps.storage, btc_height)?;
    Ok(ParamsByBtcHeightResponse { version, params })
}

pub fn finality_provider(deps: Deps, btc_pk_hex: String) -> StdResult<FinalityProvider> {
    FPS.load(deps.storage, &btc_pk_hex)
}

// Settings for pagination
const MAX_LIMIT: u32 = 30;
const DEFAULT_LIMIT: u32 = 10;

pub fn finality_providers(
    deps: Deps,
    start_after: Option<String>,
    limit: Option<u32>,
) -> StdResult<FinalityProvidersResponse> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    let start_after = start_after.as_ref().map(|s| Bound::exclusive(&**s));
    let fps = FPS
        .range_raw(deps.storage, start_after, None, Order::Ascending)
        .take(limit)
        .map(|item| item.map(|(_, v)| v))
        .collect::<StdResult<Vec<FinalityProvider>>>()?;
    Ok(FinalityProvidersResponse { fps })
}

/// Get the delegation info by staking tx hash.
/// `staking_tx_hash_hex`: The (reversed) staking tx hash, in hex
pub fn delegation(
    deps: Deps,
    staking_tx_hash_hex: String,
) -> Result<BtcDelegation, ContractError> {
    let staking_tx_hash = staking_tx_hash_from_hex(&staking_tx_hash_hex)?;
    Ok(DELEGATIONS.load(deps.storage, staking_tx_hash.as_ref())?)
}

/// Get list of delegations.
/// `start_after`: The (reversed) associated staking tx hash of the delegation in hex, if provided.
/// `active`: List only delegations without an early-unbonding signature if true.
pub fn delegations(
    deps: Deps,
    start_after: Option<String>,
    limit: Option<u32>,
    active: Option<bool>,
) -> Result<BtcDelegationsResponse, ContractError> {
    let active = active.unwrap_or_default();
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    let start_after = start_after
        .as_ref()
        .map(|s| staking_tx_hash_from_hex(s))
        .transpose()?;
    let start_after = start_after.as_ref().map(Txid::as_ref);
    let start_after: Option<Bound<&[u8; HASH_SIZE]>> = start_after.map(Bound::exclusive);
    let delegations = DELEGATIONS
        .range_raw(deps.storage, start_after, None, Order::Ascending)
        .filter(|item| {
            if let Ok((_, del)) = item {
                !active || !del.is_unbonded_early()
            } else {
                true // don't filter errors
            }
        })
        .take(limit)
        .map(|item| item.map(|(_, v)| v))
        .collect::<Result<Vec<BtcDelegation>, _>>()?;
    Ok(BtcDelegationsResponse { delegations })
}

/// Staking tx hashes delegated to a finality provider, iterated over the
/// per-FP delegator index so pagination stays stable.
/// `start_after`: the delegator BTC PK to resume from
pub fn delegations_by_fp(
    deps: Deps,
    btc_pk_hex: String,
    start_after: Option<String>,
    limit: Option<u32>,
) -> Result<DelegationsByFpResponse, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let fp = FPS
        .may_load(deps.storage, &btc_pk_hex)?
        .ok_or_else(|| ContractError::FinalityProviderNotFound(btc_pk_hex.clone()))?;
    let index = delegator_index(&fp.kind(&config.own_chain_id));

    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    let start_after = start_after.as_ref().map(|s| Bound::exclusive(&**s));
    let mut hashes = vec![];
    for item in index
        .prefix(&btc_pk_hex)
        .range(deps.storage, start_after, None, Order::Ascending)
        .take(limit)
    {
        let (_, entry) = item?;
        for hash in entry.staking_tx_hashes {
            let hash_key: &[u8; HASH_SIZE] = hash
                .as_slice()
                .try_into()
                .map_err(|_| ContractError::InvalidStakingTxHash(hex::encode(&hash)))?;
            hashes.push(Txid::from_byte_array(*hash_key).to_string());
        }
    }
    Ok(DelegationsByFpResponse { hashes })
}

pub fn voting_power(deps: Deps, btc_pk_hex: String, height: u64) -> StdResult<VotingPowerResponse> {
    let power = VOTING_POWER
        .may_load(deps.storage, (height, &btc_pk_hex))?
        .unwrap_or(0);
    Ok(VotingPowerResponse { power })
}

pub fn voting_power_table(deps: Deps, height: u64) -> StdResult<VotingPowerTableResponse> {
    let fps = VOTING_POWER
        .prefix(height)
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| {
            let (btc_pk_hex, power) = item?;
            Ok(FinalityProviderInfo { btc_pk_hex, power })
        })
        .collect::<StdResult<Vec<_>>>()?;
    Ok(VotingPowerTableResponse { fps })
}

pub fn pending_events(deps: Deps, btc_height: u32) -> StdResult<PendingEventsResponse> {
    let events = POWER_DIST_EVENTS
        .prefix(btc_height)
        .range(deps.storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, v)| v))
        .collect::<StdResult<Vec<_>>>()?;
    Ok(PendingEventsResponse { events })
}

pub fn largest_btc_reorg(deps: Deps) -> StdResult<LargestBtcReorgResponse> {
    let depth = LARGEST_BTC_REORG.may_load(deps.storage)?.unwrap_or(0);
    Ok(LargestBtcReorgResponse { depth })
}

pub fn activated_height(deps: Deps) -> StdResult<ActivatedHeightResponse> {
    let height = ACTIVATED_HEIGHT.may_load(deps.storage)?;
    Ok(ActivatedHeightResponse { height })
}
