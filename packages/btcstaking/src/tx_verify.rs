use bitcoin::{ScriptBuf, Transaction, XOnlyPublicKey};
use rust_decimal::{prelude::*, Decimal};

use crate::error::Error;
use crate::scripts;
use crate::Result;

/// Outputs at or below this value are unspendable by policy
const DUST_LIMIT_SAT: u64 = 546;

/// Checks that the given rate is in the (0,1) range with a precision of at
/// most 2 decimal places.
pub fn check_slashing_rate(rate: &Decimal) -> Result<()> {
    if *rate <= Decimal::ZERO || *rate >= Decimal::ONE {
        return Err(Error::InvalidSlashingRate {});
    }
    // shift out two decimal places; anything left is excess precision
    let shifted = rate * Decimal::from(100u32);
    if shifted != shifted.trunc() {
        return Err(Error::InvalidSlashingRate {});
    }
    Ok(())
}

/// Validates a slashing transaction against the staking output it spends.
#[allow(clippy::too_many_arguments)]
fn validate_slashing_tx(
    slashing_tx: &Transaction,
    slashing_pk_script: &ScriptBuf,
    slashing_rate: &Decimal,
    slashing_tx_min_fee: u64,
    staking_output_value: u64,
    staker_pk: &XOnlyPublicKey,
    slashing_change_lock_time: u16,
    network: bitcoin::Network,
) -> Result<()> {
    if slashing_tx.input.len() != 1 {
        return Err(Error::TxInputCountMismatch(1, slashing_tx.input.len()));
    }
    if slashing_tx.input[0].sequence.is_rbf() {
        return Err(Error::TxIsReplaceable {});
    }
    if slashing_tx.lock_time.to_consensus_u32() > 0 {
        return Err(Error::TxHasLockTime {});
    }
    if slashing_tx.output.len() != 2 {
        return Err(Error::TxOutputCountMismatch(2, slashing_tx.output.len()));
    }

    let expected_slashing_amount = (Decimal::from(staking_output_value) * slashing_rate)
        .round()
        .to_u64()
        .ok_or(Error::InvalidSlashingRate {})?;
    if slashing_tx.output[0].value.to_sat() < expected_slashing_amount {
        return Err(Error::InsufficientSlashingAmount(expected_slashing_amount));
    }

    // the first output pays to the parametrised slashing pk script
    if slashing_tx.output[0].script_pubkey != *slashing_pk_script {
        return Err(Error::WrongSlashingPkScript {});
    }

    // the second output locks the change for the staker under
    // `slashing_change_lock_time`
    let expected_pk_script = scripts::build_relative_time_lock_pk_script(
        staker_pk,
        slashing_change_lock_time,
        network,
    )?;
    if slashing_tx.output[1].script_pubkey.ne(&expected_pk_script) {
        return Err(Error::WrongSlashingChangeScript {});
    }

    if slashing_tx
        .output
        .iter()
        .any(|out| out.value.to_sat() <= DUST_LIMIT_SAT)
    {
        return Err(Error::TxContainsDust {});
    }

    let total_output_value: u64 = slashing_tx
        .output
        .iter()
        .map(|out| out.value.to_sat())
        .sum();
    if staking_output_value <= total_output_value {
        return Err(Error::TxOverspends {});
    }

    let calculated_fee = staking_output_value - total_output_value;
    if calculated_fee < slashing_tx_min_fee {
        return Err(Error::InsufficientTxFee(calculated_fee, slashing_tx_min_fee));
    }

    Ok(())
}

/// Validates all relevant data of a slashing transaction spending the given
/// funding (staking or unbonding) transaction.
#[allow(clippy::too_many_arguments)]
pub fn check_transactions(
    slashing_tx: &Transaction,
    funding_transaction: &Transaction,
    funding_output_idx: u32,
    slashing_tx_min_fee: u64,
    slashing_rate: &Decimal,
    slashing_pk_script: &ScriptBuf,
    staker_pk: &XOnlyPublicKey,
    slashing_change_lock_time: u16,
    network: bitcoin::Network,
) -> Result<()> {
    if slashing_tx_min_fee == 0 {
        return Err(Error::ZeroSlashingTxFee {});
    }
    check_slashing_rate(slashing_rate)?;

    if funding_output_idx >= funding_transaction.output.len() as u32 {
        return Err(Error::InvalidFundingOutputIndex(
            funding_output_idx,
            funding_transaction.output.len(),
        ));
    }

    let staking_output = &funding_transaction.output[funding_output_idx as usize];

    validate_slashing_tx(
        slashing_tx,
        slashing_pk_script,
        slashing_rate,
        slashing_tx_min_fee,
        staking_output.value.to_sat(),
        staker_pk,
        slashing_change_lock_time,
        network,
    )?;

    // the slashing transaction input must point at the funding output
    let funding_tx_hash = funding_transaction.txid();
    if slashing_tx.input[0].previous_output.txid.ne(&funding_tx_hash) {
        return Err(Error::TxDoesNotSpendStakingOutput(
            funding_tx_hash.to_string(),
        ));
    }
    if slashing_tx.input[0].previous_output.vout != funding_output_idx {
        return Err(Error::TxDoesNotSpendStakingOutput(
            funding_tx_hash.to_string(),
        ));
    }

    Ok(())
}

/// Checks that the unbonding transaction spends the staking output and pays
/// out exactly the staking value minus the parametrised unbonding fee.
pub fn check_unbonding_tx(
    unbonding_tx: &Transaction,
    staking_tx: &Transaction,
    staking_output_idx: u32,
    unbonding_fee_sat: u64,
) -> Result<()> {
    if unbonding_tx.input.len() != 1 {
        return Err(Error::TxInputCountMismatch(1, unbonding_tx.input.len()));
    }
    if unbonding_tx.output.len() != 1 {
        return Err(Error::TxOutputCountMismatch(1, unbonding_tx.output.len()));
    }
    if unbonding_tx.lock_time.to_consensus_u32() > 0 {
        return Err(Error::TxHasLockTime {});
    }

    let staking_tx_hash = staking_tx.txid();
    if unbonding_tx.input[0].previous_output.txid.ne(&staking_tx_hash)
        || unbonding_tx.input[0].previous_output.vout != staking_output_idx
    {
        return Err(Error::TxDoesNotSpendStakingOutput(
            staking_tx_hash.to_string(),
        ));
    }

    if staking_output_idx >= staking_tx.output.len() as u32 {
        return Err(Error::InvalidFundingOutputIndex(
            staking_output_idx,
            staking_tx.output.len(),
        ));
    }
    let staking_value = staking_tx.output[staking_output_idx as usize].value.to_sat();
    if staking_value <= unbonding_fee_sat {
        return Err(Error::TxOverspends {});
    }
    let expected_value = staking_value - unbonding_fee_sat;
    let unbonding_value = unbonding_tx.output[0].value.to_sat();
    if unbonding_value != expected_value {
        return Err(Error::WrongUnbondingOutputValue(
            expected_value,
            unbonding_value,
        ));
    }

    Ok(())
}
