//! The F1-style reward accumulator: period-indexed cumulative
//! rewards-per-score, with per-coostaker trackers settled on every score
//! change via the withdraw-on-modify protocol.

use cosmwasm_std::{Coin, Decimal, Storage, Uint128};

use crate::error::ContractError;
use crate::state::{
    CoostakerRewardsTracker, CurrentRewards, HistoricalRewards, COOSTAKER_TRACKERS,
    CURRENT_REWARDS, HISTORICAL_REWARDS,
};

/// Rewards are stored scaled by this factor so per-score ratios keep
/// precision; division back happens only at the final withdrawal
pub const DECIMAL_REWARDS: u128 = 1_000_000_000_000_000_000;

/// Adds `b` into `a`, merging by denom
pub fn add_coins(a: &mut Vec<Coin>, b: &[Coin]) {
    for coin in b {
        if coin.amount.is_zero() {
            continue;
        }
        match a.iter_mut().find(|c| c.denom == coin.denom) {
            Some(existing) => existing.amount += coin.amount,
            None => a.push(coin.clone()),
        }
    }
    a.sort_by(|x, y| x.denom.cmp(&y.denom));
}

/// Subtracts `b` from `a`; fails when `b` has a denom or amount `a` cannot
/// cover
pub fn sub_coins(a: &[Coin], b: &[Coin]) -> Result<Vec<Coin>, ContractError> {
    let mut out = a.to_vec();
    for coin in b {
        if coin.amount.is_zero() {
            continue;
        }
        let existing = out
            .iter_mut()
            .find(|c| c.denom == coin.denom)
            .ok_or_else(|| ContractError::InsufficientRewardsPool(coin.to_string()))?;
        existing.amount = existing
            .amount
            .checked_sub(coin.amount)
            .map_err(|_| ContractError::InsufficientRewardsPool(coin.to_string()))?;
    }
    out.retain(|c| !c.amount.is_zero());
    Ok(out)
}

/// Per-denom floor division by a score
fn coins_quo_score(coins: &[Coin], score: Uint128) -> Vec<Coin> {
    coins
        .iter()
        .map(|c| Coin {
            denom: c.denom.clone(),
            amount: c.amount / score,
        })
        .filter(|c| !c.amount.is_zero())
        .collect()
}

/// Per-denom multiplication by a score
fn coins_mul_score(coins: &[Coin], score: Uint128) -> Vec<Coin> {
    coins
        .iter()
        .map(|c| Coin {
            denom: c.denom.clone(),
            amount: c.amount * score,
        })
        .collect()
}

/// Per-denom floor division by the decimal scaling factor
fn coins_unscale(coins: &[Coin]) -> Vec<Coin> {
    coins
        .iter()
        .map(|c| Coin {
            denom: c.denom.clone(),
            amount: c.amount / Uint128::new(DECIMAL_REWARDS),
        })
        .filter(|c| !c.amount.is_zero())
        .collect()
}

/// The fraction of a balance routed somewhere, floored per denom
pub fn get_coins_portion(coins: &[Coin], portion: Decimal) -> Vec<Coin> {
    coins
        .iter()
        .map(|c| Coin {
            denom: c.denom.clone(),
            amount: c.amount.mul_floor(portion),
        })
        .filter(|c| !c.amount.is_zero())
        .collect()
}

/// Seeds the accumulator: period 1 open, period 0 settled at zero
pub fn initialize(storage: &mut dyn Storage) -> Result<(), ContractError> {
    CURRENT_REWARDS.save(
        storage,
        &CurrentRewards {
            rewards: vec![],
            period: 1,
            total_score: Uint128::zero(),
        },
    )?;
    HISTORICAL_REWARDS.save(storage, 0, &HistoricalRewards::default())?;
    Ok(())
}

/// Books new (unscaled) reward coins into the open period
pub fn add_rewards(storage: &mut dyn Storage, coins: &[Coin]) -> Result<(), ContractError> {
    let mut current = CURRENT_REWARDS.load(storage)?;
    let scaled: Vec<Coin> = coins
        .iter()
        .map(|c| {
            Ok(Coin {
                denom: c.denom.clone(),
                amount: c.amount.checked_mul(Uint128::new(DECIMAL_REWARDS))?,
            })
        })
        .collect::<Result<_, ContractError>>()?;
    add_coins(&mut current.rewards, &scaled);
    CURRENT_REWARDS.save(storage, &current)?;
    Ok(())
}

/// Settles the open period into a historical entry and opens the next one,
/// returning the period just settled.
///
/// With a zero total score the cumulative entry repeats the previous value
/// and the accumulated rewards carry forward undistributed.
pub fn increment_period(storage: &mut dyn Storage) -> Result<u64, ContractError> {
    let mut current = CURRENT_REWARDS.load(storage)?;
    let settled = current.period;
    let previous = HISTORICAL_REWARDS
        .may_load(storage, settled - 1)?
        .ok_or(ContractError::HistoricalEntryNotFound(settled - 1))?;

    let mut cumulative = previous.cumulative_rewards_per_score;
    if !current.total_score.is_zero() {
        let per_score = coins_quo_score(&current.rewards, current.total_score);
        add_coins(&mut cumulative, &per_score);
        current.rewards = vec![];
    }
    HISTORICAL_REWARDS.save(
        storage,
        settled,
        &HistoricalRewards {
            cumulative_rewards_per_score: cumulative,
        },
    )?;

    current.period += 1;
    CURRENT_REWARDS.save(storage, &current)?;
    Ok(settled)
}

/// The settled rewards a tracker can withdraw between its start period and
/// `end_period`, unscaled and floor-truncated per denom
pub fn calculate_pending(
    storage: &dyn Storage,
    tracker: &CoostakerRewardsTracker,
    end_period: u64,
) -> Result<Vec<Coin>, ContractError> {
    if tracker.total_score.is_zero() || end_period <= tracker.start_period {
        return Ok(vec![]);
    }
    let start = HISTORICAL_REWARDS
        .may_load(storage, tracker.start_period)?
        .ok_or(ContractError::HistoricalEntryNotFound(tracker.start_period))?;
    let end = HISTORICAL_REWARDS
        .may_load(storage, end_period)?
        .ok_or(ContractError::HistoricalEntryNotFound(end_period))?;
    let diff = sub_coins(
        &end.cumulative_rewards_per_score,
        &start.cumulative_rewards_per_score,
    )?;
    Ok(coins_unscale(&coins_mul_score(&diff, tracker.total_score)))
}

/// The withdraw-on-modify protocol: settle the open period, compute the
/// tracker's pending rewards, apply `modify` to its stake legs, refresh the
/// score and rewrite the tracker anchored at the newly settled period.
///
/// Returns the unscaled pending coins to ship to the coostaker's gauge.
pub fn withdraw_and_modify(
    storage: &mut dyn Storage,
    addr: &cosmwasm_std::Addr,
    score_ratio_btc_by_baby: Uint128,
    modify: impl FnOnce(&mut CoostakerRewardsTracker),
) -> Result<Vec<Coin>, ContractError> {
    let settled = increment_period(storage)?;

    let mut tracker = COOSTAKER_TRACKERS
        .may_load(storage, addr)?
        .unwrap_or(CoostakerRewardsTracker {
            start_period: settled,
            ..Default::default()
        });
    let pending = calculate_pending(storage, &tracker, settled)?;

    let old_score = tracker.total_score;
    modify(&mut tracker);
    tracker.update_score(score_ratio_btc_by_baby);
    tracker.start_period = settled;

    let mut current = CURRENT_REWARDS.load(storage)?;
    current.total_score = current.total_score - old_score + tracker.total_score;
    CURRENT_REWARDS.save(storage, &current)?;

    if tracker.is_empty() {
        COOSTAKER_TRACKERS.remove(storage, addr);
    } else {
        COOSTAKER_TRACKERS.save(storage, addr, &tracker)?;
    }
    Ok(pending)
}
