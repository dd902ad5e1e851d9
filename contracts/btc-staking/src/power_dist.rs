use std::collections::BTreeMap;

use cosmwasm_std::{to_json_binary, DepsMut, Env, Event, Response, Storage, WasmMsg};

use babylon_apis::btc_staking_api::HASH_SIZE;
use babylon_apis::finality_api::{FinalityQueryMsg, HasTimestampedPubRandResponse};

use crate::error::ContractError;
use crate::light_client;
use crate::state::config::{Config, CONFIG};
use crate::state::params;
use crate::state::power::{
    clear_power_dist_events, collect_power_dist_events, DelegationEventState, PowerDistUpdateEvent,
    VotingPowerDistCache, ACTIVATED_HEIGHT, BTC_HEIGHTS, DIST_CACHE, LARGEST_BTC_REORG,
    VOTING_POWER,
};
use crate::state::staking::{DELEGATIONS, FPS};

/// Net satoshi movement of one staker discovered during event replay
#[derive(Default, Debug, PartialEq)]
pub struct StakerSatDiff {
    pub added_sat: u64,
    pub removed_sat: u64,
}

/// handle_begin_block drives the power pipeline once per native block:
/// the reorg guard, the deterministic event replay from the last processed
/// BTC tip to the current one, and the voting power table of this height.
pub fn handle_begin_block(deps: &mut DepsMut, env: &Env) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;

    // Reorg guard: a reorg deeper than the confirmation depth invalidates
    // k-deep conclusions; the operator must intervene
    let largest_reorg = LARGEST_BTC_REORG.may_load(deps.storage)?.unwrap_or(0);
    if largest_reorg >= config.btc_confirmation_depth {
        panic!(
            "BTC reorg of depth {} reached the confirmation depth {}; halting",
            largest_reorg, config.btc_confirmation_depth
        );
    }

    let native_height = env.block.height;
    let tip_height = light_client::query_tip_height(&deps.querier, &config.btc_light_client)?;
    let params = params::get_params(deps.storage)?;

    // Nothing to replay below the activation height
    if tip_height < params.btc_activation_height {
        BTC_HEIGHTS.save(deps.storage, native_height, &tip_height)?;
        return Ok(Response::new());
    }

    let last_btc_height = BTC_HEIGHTS
        .may_load(deps.storage, native_height.saturating_sub(1))?
        .unwrap_or(params.btc_activation_height);

    // Replay all events in [last, tip] on top of the previous block's cache.
    // Processed events are cleared, so the inclusive lower bound cannot
    // double-apply anything
    let events = collect_power_dist_events(deps.storage, last_btc_height, tip_height)?;
    let mut cache = DIST_CACHE.may_load(deps.storage)?.unwrap_or_default();
    let sat_diffs = process_power_dist_events(deps.storage, &mut cache, &events)?;
    let keys: Vec<_> = events.iter().map(|(key, _)| *key).collect();
    clear_power_dist_events(deps.storage, &keys);

    // A finality provider only earns power once its public randomness is
    // BTC-timestamped; re-queried each block, so power shows up on the first
    // block after the randomness lands
    refresh_timestamping(deps, &config, native_height, &mut cache)?;
    cache.recompute_total();

    // TODO: Prune voting power rows below the finality retention depth to
    // keep the table from growing with chain height
    for fp in cache.finality_providers.iter().filter(|fp| fp.is_eligible()) {
        VOTING_POWER.save(
            deps.storage,
            (native_height, fp.btc_pk_hex.as_str()),
            &fp.active_sat,
        )?;
    }
    if cache.total_voting_power > 0 && ACTIVATED_HEIGHT.may_load(deps.storage)?.is_none() {
        ACTIVATED_HEIGHT.save(deps.storage, &native_height)?;
    }
    DIST_CACHE.save(deps.storage, &cache)?;
    BTC_HEIGHTS.save(deps.storage, native_height, &tip_height)?;

    let mut res = Response::new().add_event(
        Event::new("btc_staking_power_update")
            .add_attribute("module", "btc_staking")
            .add_attribute("height", native_height.to_string())
            .add_attribute("btc_height", tip_height.to_string())
            .add_attribute("total_power", cache.total_voting_power.to_string()),
    );

    // Forward net stake movements to the coostaking contract
    if let Some(coostaking) = &config.coostaking {
        let updates: Vec<_> = sat_diffs
            .into_iter()
            .map(
                |(staker_addr, diff)| btc_coostaking::msg::CoostakerSatsUpdate {
                    staker_addr,
                    added_sat: diff.added_sat,
                    removed_sat: diff.removed_sat,
                },
            )
            .collect();
        if !updates.is_empty() {
            res = res.add_message(WasmMsg::Execute {
                contract_addr: coostaking.to_string(),
                msg: to_json_binary(&btc_coostaking::msg::ExecuteMsg::UpdateCoostakerSats {
                    updates,
                })?,
                funds: vec![],
            });
        }
    }

    Ok(res)
}

/// Applies a batch of power events to the cache, in `(btc_height, idx)`
/// order. Pure over the stored delegations: identical inputs yield identical
/// caches on every replica.
pub fn process_power_dist_events(
    storage: &dyn Storage,
    cache: &mut VotingPowerDistCache,
    events: &[((u32, u64), PowerDistUpdateEvent)],
) -> Result<BTreeMap<String, StakerSatDiff>, ContractError> {
    let mut sat_diffs: BTreeMap<String, StakerSatDiff> = BTreeMap::new();
    for (_, event) in events {
        match event {
            PowerDistUpdateEvent::BtcDelStateUpdate {
                staking_tx_hash,
                new_state,
            } => {
                let hash_key: &[u8; HASH_SIZE] = staking_tx_hash
                    .as_slice()
                    .try_into()
                    .map_err(|_| ContractError::InvalidStakingTxHash(hex::encode(staking_tx_hash)))?;
                let delegation = DELEGATIONS.load(storage, hash_key)?;
                match new_state {
                    DelegationEventState::Active => {
                        for fp_pk_hex in &delegation.fp_btc_pk_list {
                            if fp_is_slashed(storage, cache, fp_pk_hex)? {
                                continue;
                            }
                            let fp = cache.get_or_insert_fp(fp_pk_hex);
                            fp.active_sat = fp.active_sat.saturating_add(delegation.total_sat);
                        }
                        sat_diffs
                            .entry(delegation.staker_addr.clone())
                            .or_default()
                            .added_sat += delegation.total_sat;
                    }
                    DelegationEventState::Unbonded => {
                        // a scheduled expiry can arrive for a delegation that
                        // unbonded early; the subtraction saturates and the
                        // early event already cleared the power
                        for fp_pk_hex in &delegation.fp_btc_pk_list {
                            if fp_is_slashed(storage, cache, fp_pk_hex)? {
                                continue;
                            }
                            let fp = cache.get_or_insert_fp(fp_pk_hex);
                            fp.active_sat = fp.active_sat.saturating_sub(delegation.total_sat);
                        }
                        sat_diffs
                            .entry(delegation.staker_addr.clone())
                            .or_default()
                            .removed_sat += delegation.total_sat;
                    }
                }
            }
            PowerDistUpdateEvent::SlashedFp { fp_btc_pk_hex } => {
                let fp = cache.get_or_insert_fp(fp_btc_pk_hex);
                fp.is_slashed = true;
                fp.active_sat = 0;
            }
            PowerDistUpdateEvent::JailedFp { fp_btc_pk_hex } => {
                let fp = cache.get_or_insert_fp(fp_btc_pk_hex);
                fp.is_jailed = true;
            }
            PowerDistUpdateEvent::UnjailedFp { fp_btc_pk_hex } => {
                let fp = cache.get_or_insert_fp(fp_btc_pk_hex);
                fp.is_jailed = false;
            }
        }
    }
    Ok(sat_diffs)
}

/// A finality provider is treated as slashed if either the cache or the
/// registry says so; the registry covers events predating the cache entry
fn fp_is_slashed(
    storage: &dyn Storage,
    cache: &mut VotingPowerDistCache,
    fp_btc_pk_hex: &str,
) -> Result<bool, ContractError> {
    if let Some(fp) = cache.get_fp(fp_btc_pk_hex) {
        if fp.is_slashed {
            return Ok(true);
        }
    }
    Ok(FPS
        .may_load(storage, fp_btc_pk_hex)?
        .map(|fp| fp.is_slashed())
        .unwrap_or(true))
}

fn refresh_timestamping(
    deps: &DepsMut,
    config: &Config,
    native_height: u64,
    cache: &mut VotingPowerDistCache,
) -> Result<(), ContractError> {
    match &config.btc_finality {
        None => {
            for fp in cache.finality_providers.iter_mut() {
                fp.is_timestamped = true;
            }
        }
        Some(finality) => {
            for fp in cache.finality_providers.iter_mut() {
                let resp: HasTimestampedPubRandResponse = deps
                    .querier
                    .query_wasm_smart(
                        finality,
                        &FinalityQueryMsg::HasTimestampedPubRand {
                            fp_btc_pk_hex: fp.btc_pk_hex.clone(),
                            height: native_height,
                        },
                    )
                    .map_err(|e| ContractError::LightClientError(e.to_string()))?;
                fp.is_timestamped = resp.timestamped;
            }
        }
    }
    Ok(())
}

/// handle_end_block is a host hook kept for symmetry; all staking-side work
/// happens in BeginBlock
pub fn handle_end_block(_deps: &mut DepsMut, _env: &Env) -> Result<Response, ContractError> {
    Ok(Response::new())
}
