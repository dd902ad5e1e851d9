use bitcoin::absolute::LockTime;
use bitcoin::Transaction;
use cosmwasm_std::{Addr, QuerierWrapper};

use babylon_apis::btc_staking_api::InclusionProof;
use babylon_apis::Validate;
use babylon_bitcoin::merkle;

use crate::error::ContractError;
use crate::light_client;

/// The time-lock window of a delegation whose staking tx inclusion was
/// verified against the BTC light client
#[derive(Debug, PartialEq)]
pub struct TimelockPeriod {
    pub start_height: u32,
    pub end_height: u32,
    pub tip_height: u32,
}

/// Verifies the Merkle inclusion of `staking_tx` at the literal claimed
/// index, the k-deep confirmation rule and the time-lock headroom, returning
/// the resulting time-lock window.
pub fn verify_inclusion_proof_and_get_height(
    querier: &QuerierWrapper,
    btc_light_client: &Addr,
    confirmation_depth: u32,
    staking_tx: &Transaction,
    staking_time: u32,
    unbonding_time: u32,
    prf: &InclusionProof,
) -> Result<TimelockPeriod, ContractError> {
    prf.validate()?;

    // resolve the containing header
    let header_resp =
        light_client::query_header_by_hash(querier, btc_light_client, &prf.block_hash_hex)?;
    let header = light_client::parse_header(&header_resp)?;

    // Merkle inclusion at the literal claimed index; forged indices beyond
    // the branch depth are rejected inside
    let branch: Vec<Vec<u8>> = prf.branch.iter().map(|node| node.to_vec()).collect();
    merkle::verify_tx_inclusion(
        staking_tx,
        &branch,
        prf.index,
        &header.merkle_root.to_raw_hash(),
    )?;

    // coinbase-shaped transactions can never stake
    merkle::check_coinbase(staking_tx, prf.index)?;

    // the k-deep rule
    let tip_height = light_client::query_tip_height(querier, btc_light_client)?;
    let depth = tip_height
        .checked_sub(header_resp.height)
        .ok_or(ContractError::InsufficientConfirmationDepth(0, confirmation_depth))?;
    if depth < confirmation_depth {
        return Err(ContractError::InsufficientConfirmationDepth(
            depth,
            confirmation_depth,
        ));
    }

    // the time-lock must retain enough headroom for unbonding
    let start_height = header_resp.height;
    let end_height = start_height + staking_time;
    if tip_height + unbonding_time >= end_height {
        return Err(ContractError::InsufficientTimelock {
            tip: tip_height,
            end_height,
            unbonding_time,
        });
    }

    Ok(TimelockPeriod {
        start_height,
        end_height,
        tip_height,
    })
}

/// Verifies the k-deep inclusion of a stake-spending tx. No time-lock check:
/// the spend already happened on Bitcoin.
pub fn verify_spend_inclusion(
    querier: &QuerierWrapper,
    btc_light_client: &Addr,
    confirmation_depth: u32,
    spending_tx: &Transaction,
    prf: &InclusionProof,
) -> Result<(), ContractError> {
    prf.validate()?;

    let header_resp =
        light_client::query_header_by_hash(querier, btc_light_client, &prf.block_hash_hex)?;
    let header = light_client::parse_header(&header_resp)?;

    let branch: Vec<Vec<u8>> = prf.branch.iter().map(|node| node.to_vec()).collect();
    merkle::verify_tx_inclusion(
        spending_tx,
        &branch,
        prf.index,
        &header.merkle_root.to_raw_hash(),
    )?;

    let tip_height = light_client::query_tip_height(querier, btc_light_client)?;
    let depth = tip_height
        .checked_sub(header_resp.height)
        .ok_or(ContractError::InsufficientConfirmationDepth(0, confirmation_depth))?;
    if depth < confirmation_depth {
        return Err(ContractError::InsufficientConfirmationDepth(
            depth,
            confirmation_depth,
        ));
    }
    Ok(())
}

/// Rejects staking transactions whose lock time is not a block height or
/// exceeds the BTC time-lock limit
pub fn check_staking_tx_lock_time(staking_tx: &Transaction) -> Result<(), ContractError> {
    match staking_tx.lock_time {
        LockTime::Blocks(b) if b.to_consensus_u32() > u16::MAX as u32 => Err(
            ContractError::InvalidLockTime(b.to_consensus_u32(), u16::MAX as u32),
        ),
        LockTime::Blocks(_) => Ok(()),
        LockTime::Seconds(_) => Err(ContractError::InvalidLockTimeType {}),
    }
}

/// Full cryptographic validation of the delegator's pre-signed slashing
/// signatures over the staking transaction set.
#[cfg(feature = "full-validation")]
pub fn verify_delegator_slashing_sigs(
    staker_pk: &bitcoin::XOnlyPublicKey,
    fp_pks: &[bitcoin::XOnlyPublicKey],
    covenant_pks: &[bitcoin::XOnlyPublicKey],
    covenant_quorum: u32,
    staking_tx: &Transaction,
    staking_output_idx: u32,
    staking_time: u16,
    unbonding_time: u16,
    slashing_tx: &Transaction,
    delegator_slashing_sig: &[u8],
    unbonding_tx: &Transaction,
    unbonding_slashing_tx: &Transaction,
    delegator_unbonding_slashing_sig: &[u8],
) -> Result<(), ContractError> {
    use babylon_btcstaking::scripts::StakingScriptPaths;
    use babylon_btcstaking::sig_verify::verify_transaction_sig_with_output;
    use k256::schnorr::Signature;

    let staking_paths = StakingScriptPaths::new(
        staker_pk,
        fp_pks,
        covenant_pks,
        covenant_quorum as usize,
        staking_time,
    )?;
    let unbonding_paths = StakingScriptPaths::new(
        staker_pk,
        fp_pks,
        covenant_pks,
        covenant_quorum as usize,
        unbonding_time,
    )?;

    let staking_out = &staking_tx.output[staking_output_idx as usize];
    let sig = Signature::try_from(delegator_slashing_sig)
        .map_err(|e| ContractError::InvalidBtcTx(e.to_string()))?;
    verify_transaction_sig_with_output(
        slashing_tx,
        staking_out,
        staking_paths.slashing_path_script.as_script(),
        staker_pk,
        &sig,
    )?;

    let unbonding_out = &unbonding_tx.output[0];
    let sig = Signature::try_from(delegator_unbonding_slashing_sig)
        .map_err(|e| ContractError::InvalidBtcTx(e.to_string()))?;
    verify_transaction_sig_with_output(
        unbonding_slashing_tx,
        unbonding_out,
        unbonding_paths.slashing_path_script.as_script(),
        staker_pk,
        &sig,
    )?;

    Ok(())
}
