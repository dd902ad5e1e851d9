use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Coin, Decimal, Uint128};
use cw_controllers::Admin;
use cw_storage_plus::{Item, Map};

use crate::error::ContractError;

pub(crate) const CONFIG: Item<Config> = Item::new("config");
pub(crate) const PARAMS: Item<Params> = Item::new("params");
/// Storage for admin
pub(crate) const ADMIN: Admin = Admin::new("admin");

/// The single rewards accumulator of the current period
pub(crate) const CURRENT_REWARDS: Item<CurrentRewards> = Item::new("current_rewards");
/// Cumulative rewards-per-score entries, by period
pub(crate) const HISTORICAL_REWARDS: Map<u64, HistoricalRewards> = Map::new("historical_rewards");
/// Coostaker reward trackers by native address
pub(crate) const COOSTAKER_TRACKERS: Map<&Addr, CoostakerRewardsTracker> =
    Map::new("coostaker_trackers");
/// Bond-denom balance already booked into the rewards pool; the BeginBlock
/// sweep books the delta above it
pub(crate) const ACCOUNTED_BALANCE: Item<Uint128> = Item::new("accounted_balance");

#[cw_serde]
pub struct Config {
    /// Bond denom swept from the fee collector
    pub denom: String,
    /// The btc-staking contract, sole source of BTC stake updates
    pub staking: Addr,
    /// The caller authorised to report native stake updates; the admin when
    /// unset
    pub epoching: Option<Addr>,
    /// The incentive contract holding the reward gauges
    pub incentive: Addr,
}

#[cw_serde]
pub struct Params {
    /// Fraction of fee-collector revenue routed to the coostaking pool
    pub coostaking_portion: Decimal,
    /// Micro-native units per satoshi required for score parity
    pub score_ratio_btc_by_baby: Uint128,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            coostaking_portion: Decimal::percent(10),
            score_ratio_btc_by_baby: Uint128::new(50),
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.coostaking_portion >= Decimal::one() {
            return Err(ContractError::InvalidParams(
                "coostaking portion must be below 1".to_string(),
            ));
        }
        if self.score_ratio_btc_by_baby.is_zero() {
            return Err(ContractError::InvalidParams(
                "score ratio must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The accumulator of the current (open) period. There is exactly one;
/// `period` increases monotonically and `rewards` carries decimal scaling
#[cw_serde]
pub struct CurrentRewards {
    pub rewards: Vec<Coin>,
    pub period: u64,
    pub total_score: Uint128,
}

/// A settled period: cumulative rewards per unit of score, in scaled units
#[cw_serde]
#[derive(Default)]
pub struct HistoricalRewards {
    pub cumulative_rewards_per_score: Vec<Coin>,
}

/// Per-coostaker tracking entry. The invariant
/// `total_score == min(active_sat, active_baby / score_ratio)` is restored
/// by `update_score` after every leg change
#[cw_serde]
#[derive(Default)]
pub struct CoostakerRewardsTracker {
    pub start_period: u64,
    pub active_sat: u64,
    pub active_baby: Uint128,
    pub total_score: Uint128,
}

impl CoostakerRewardsTracker {
    pub fn update_score(&mut self, score_ratio_btc_by_baby: Uint128) {
        let baby_leg = self.active_baby / score_ratio_btc_by_baby;
        self.total_score = Uint128::new(self.active_sat as u128).min(baby_leg);
    }

    pub fn is_empty(&self) -> bool {
        self.active_sat == 0 && self.active_baby.is_zero()
    }
}
