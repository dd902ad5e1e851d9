use cosmwasm_std::Decimal;

use crate::error::ContractError;
use crate::state::Params;

/// Recomputes the base gas price from the previous block's effective gas,
/// the unchanged EIP-1559 formula: a move proportional to the utilisation
/// distance from target, bounded by the change denominator, floored at the
/// parametrised minimum.
pub fn next_base_gas_price(params: &Params, current: Decimal, block_gas: u64) -> Decimal {
    let target = params.target_block_gas();
    if target == 0 {
        return current.max(params.min_base_gas_price);
    }

    let next = match block_gas.cmp(&target) {
        std::cmp::Ordering::Equal => current,
        std::cmp::Ordering::Greater => {
            let delta = current
                * Decimal::from_ratio(
                    block_gas - target,
                    target * params.base_fee_change_denominator,
                );
            current + delta
        }
        std::cmp::Ordering::Less => {
            let delta = current
                * Decimal::from_ratio(
                    target - block_gas,
                    target * params.base_fee_change_denominator,
                );
            current - delta
        }
    };
    next.max(params.min_base_gas_price)
}

/// Tracked gas of a finished block, with refundable gas removed: the higher
/// of `gas_wanted * min_gas_multiplier` and `gas_used`, capped at the block
/// ceiling. Both inputs must fit int64 after the subtraction.
pub fn effective_block_gas(
    params: &Params,
    gas_wanted: u64,
    gas_used: u64,
    refundable_gas_wanted: u64,
    refundable_gas_used: u64,
) -> Result<u64, ContractError> {
    let gas_wanted = sub_refundable(gas_wanted, refundable_gas_wanted)?;
    let gas_used = sub_refundable(gas_used, refundable_gas_used)?;

    let floored_wanted = cosmwasm_std::Uint128::new(gas_wanted as u128)
        .mul_floor(params.min_gas_multiplier)
        .u128() as u64;
    Ok(floored_wanted.max(gas_used).min(params.max_block_gas))
}

fn sub_refundable(total: u64, refundable: u64) -> Result<u64, ContractError> {
    let adjusted = total
        .checked_sub(refundable)
        .ok_or(ContractError::RefundableGasExceedsTotal { refundable, total })?;
    if adjusted > i64::MAX as u64 {
        return Err(ContractError::GasOverflowsInt64(adjusted));
    }
    Ok(adjusted)
}
