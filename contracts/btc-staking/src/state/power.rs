use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Order, StdResult, Storage};
use cw_storage_plus::{Item, Map};

use babylon_apis::Bytes;

/// Height-bucketed queue of voting-power-affecting events, keyed by
/// `(btc_height, event_idx)`. The per-height index is monotonic so that
/// replay order is deterministic across replicas
pub(crate) const POWER_DIST_EVENTS: Map<(u32, u64), PowerDistUpdateEvent> =
    Map::new("power_dist_events");
/// Next event index per BTC height
pub(crate) const NEXT_EVENT_IDX: Map<u32, u64> = Map::new("power_dist_event_idx");

/// The voting power table: `(native_height, fp_btc_pk) -> power`
pub(crate) const VOTING_POWER: Map<(u64, &str), u64> = Map::new("voting_power");
/// BTC tip height seen at each native height
pub(crate) const BTC_HEIGHTS: Map<u64, u32> = Map::new("btc_heights");
/// The power distribution cache carried from block to block
pub(crate) const DIST_CACHE: Item<VotingPowerDistCache> = Item::new("dist_cache");
/// Monotone-max of observed BTC reorg depths
pub(crate) const LARGEST_BTC_REORG: Item<u32> = Item::new("largest_btc_reorg");
/// The native height at which the first finality provider gained power
pub(crate) const ACTIVATED_HEIGHT: Item<u64> = Item::new("activated_height");

/// The target state of a delegation state update event
#[cw_serde]
#[derive(Copy)]
pub enum DelegationEventState {
    Active,
    Unbonded,
}

#[cw_serde]
pub enum PowerDistUpdateEvent {
    /// A delegation becomes active or unbonded at the scheduled BTC height
    BtcDelStateUpdate {
        staking_tx_hash: Bytes,
        new_state: DelegationEventState,
    },
    /// The finality provider was slashed; its power is zeroed permanently
    SlashedFp { fp_btc_pk_hex: String },
    /// The finality provider was jailed; its power is excluded but the
    /// underlying delegations are kept
    JailedFp { fp_btc_pk_hex: String },
    /// The finality provider was unjailed
    UnjailedFp { fp_btc_pk_hex: String },
}

/// Power distribution info of a single finality provider in the cache
#[cw_serde]
#[derive(Default)]
pub struct FinalityProviderDistInfo {
    pub btc_pk_hex: String,
    /// Aggregated satoshis of all active delegations to this FP
    pub active_sat: u64,
    pub is_slashed: bool,
    pub is_jailed: bool,
    /// Whether the FP has BTC-timestamped public randomness; power is only
    /// granted once it does
    pub is_timestamped: bool,
}

impl FinalityProviderDistInfo {
    /// Whether this FP contributes to the voting power table
    pub fn is_eligible(&self) -> bool {
        !self.is_slashed && !self.is_jailed && self.is_timestamped && self.active_sat > 0
    }
}

/// The in-memory voting power distribution, reconstructed deterministically
/// by replaying power events on top of the previous block's cache
#[cw_serde]
#[derive(Default)]
pub struct VotingPowerDistCache {
    pub total_voting_power: u64,
    pub finality_providers: Vec<FinalityProviderDistInfo>,
}

impl VotingPowerDistCache {
    pub fn get_fp(&mut self, fp_btc_pk_hex: &str) -> Option<&mut FinalityProviderDistInfo> {
        self.finality_providers
            .iter_mut()
            .find(|fp| fp.btc_pk_hex == fp_btc_pk_hex)
    }

    pub fn get_or_insert_fp(&mut self, fp_btc_pk_hex: &str) -> &mut FinalityProviderDistInfo {
        if let Some(i) = self
            .finality_providers
            .iter()
            .position(|fp| fp.btc_pk_hex == fp_btc_pk_hex)
        {
            return &mut self.finality_providers[i];
        }
        self.finality_providers.push(FinalityProviderDistInfo {
            btc_pk_hex: fp_btc_pk_hex.to_string(),
            ..Default::default()
        });
        self.finality_providers.last_mut().unwrap()
    }

    /// Recomputes the total over eligible finality providers
    pub fn recompute_total(&mut self) {
        self.total_voting_power = self
            .finality_providers
            .iter()
            .filter(|fp| fp.is_eligible())
            .map(|fp| fp.active_sat)
            .sum();
    }
}

/// Appends an event to the queue at the given BTC height, assigning the next
/// monotonic index of that height
pub fn push_power_dist_event(
    storage: &mut dyn Storage,
    btc_height: u32,
    event: &PowerDistUpdateEvent,
) -> StdResult<()> {
    let idx = NEXT_EVENT_IDX.may_load(storage, btc_height)?.unwrap_or(0);
    POWER_DIST_EVENTS.save(storage, (btc_height, idx), event)?;
    NEXT_EVENT_IDX.save(storage, btc_height, &(idx + 1))
}

/// All events scheduled in `[from, to]`, in `(btc_height, event_idx)` order
pub fn collect_power_dist_events(
    storage: &dyn Storage,
    from: u32,
    to: u32,
) -> StdResult<Vec<((u32, u64), PowerDistUpdateEvent)>> {
    let mut events = vec![];
    for height in from..=to {
        let at_height: Vec<_> = POWER_DIST_EVENTS
            .prefix(height)
            .range(storage, None, None, Order::Ascending)
            .collect::<StdResult<Vec<_>>>()?;
        for (idx, event) in at_height {
            events.push(((height, idx), event));
        }
    }
    Ok(events)
}

/// Removes processed events from the queue
pub fn clear_power_dist_events(storage: &mut dyn Storage, keys: &[(u32, u64)]) {
    for key in keys {
        POWER_DIST_EVENTS.remove(storage, *key);
    }
}

/// Monotone-max update of the largest observed reorg depth
pub fn record_btc_reorg(storage: &mut dyn Storage, depth: u32) -> StdResult<u32> {
    let largest = LARGEST_BTC_REORG.may_load(storage)?.unwrap_or(0);
    let largest = largest.max(depth);
    LARGEST_BTC_REORG.save(storage, &largest)?;
    Ok(largest)
}
