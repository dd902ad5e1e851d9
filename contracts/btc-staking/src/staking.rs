use std::collections::HashSet;
use std::str::FromStr;

use bitcoin::consensus::deserialize;
use bitcoin::{Transaction, Txid, XOnlyPublicKey};
use hex::ToHex;

use cosmwasm_std::{Binary, Decimal, DepsMut, Env, Event, MessageInfo, Response, Storage};

use babylon_apis::btc_staking_api::{
    CommissionRates, CovenantAdaptorSignatures, FinalityProviderDescription, InclusionProof,
    ProofOfPossessionBtc, SignatureInfo, BTCDelegationStatus, HASH_SIZE,
};
use babylon_apis::error::StakingApiError;
use babylon_apis::{parse_bip340_pk, Validate};
use babylon_bitcoin::chain_params::get_bitcoin_network;
use babylon_btcstaking::tx_verify;

use crate::error::ContractError;
use crate::light_client;
use crate::state::config::{ADMIN, CONFIG};
use crate::state::params::{self, Params};
use crate::state::power::{
    push_power_dist_event, record_btc_reorg, DelegationEventState, PowerDistUpdateEvent,
};
use crate::state::staking::{
    index_delegation, BtcDelegation, DelegationIndex, FinalityProvider, FpKind, UndelegationInfo,
    ALLOWED_STAKING_TX_HASHES, BTC_DELEGATORS, CONSUMER_DELEGATORS, DELEGATIONS, FPS, FP_BY_ADDR,
};
use crate::validation;

/// Seconds a finality provider must wait between commission edits
const COMMISSION_UPDATE_COOLDOWN_SECS: u64 = 24 * 60 * 60;

pub(crate) fn staking_tx_hash_from_hex(hash_hex: &str) -> Result<Txid, ContractError> {
    Txid::from_str(hash_hex).map_err(|_| ContractError::InvalidStakingTxHash(hash_hex.to_string()))
}

fn delegation_state_event(staking_tx_hash: &Txid, new_state: BTCDelegationStatus) -> Event {
    Event::new("btc_delegation_state_update")
        .add_attribute("module", "btc_staking")
        .add_attribute("staking_tx_hash", staking_tx_hash.to_string())
        .add_attribute("new_state", new_state.as_str())
}

/// handle_create_finality_provider registers a new finality provider with
/// the sender as its commission address
pub fn handle_create_finality_provider(
    deps: DepsMut,
    env: Env,
    info: &MessageInfo,
    description: FinalityProviderDescription,
    commission: CommissionRates,
    btc_pk_hex: String,
    pop: ProofOfPossessionBtc,
    bsn_id: Option<String>,
) -> Result<Response, ContractError> {
    description.validate()?;
    commission.validate()?;

    let params = params::get_params(deps.storage)?;
    if commission.rate < params.min_commission_rate {
        return Err(ContractError::CommissionBelowMinimum(
            params.min_commission_rate.to_string(),
        ));
    }

    let btc_pk = parse_bip340_pk(&btc_pk_hex)?;

    // Avoid overwriting existing finality providers, and enforce the unique
    // address binding
    if FPS.has(deps.storage, &btc_pk_hex) {
        return Err(ContractError::FinalityProviderAlreadyExists(btc_pk_hex));
    }
    if FP_BY_ADDR.has(deps.storage, info.sender.as_str()) {
        return Err(ContractError::FinalityProviderAddrTaken(
            info.sender.to_string(),
        ));
    }

    // The proof of possession binds the BTC key to the native address
    pop.verify(&btc_pk, info.sender.as_str())?;

    let config = CONFIG.load(deps.storage)?;
    let bsn_id = match bsn_id {
        Some(id) if !id.is_empty() => id,
        _ => config.own_chain_id.clone(),
    };

    let fp = FinalityProvider {
        addr: info.sender.to_string(),
        description,
        commission: commission.rate,
        max_commission_rate: commission.max_rate,
        max_commission_change_rate: commission.max_change_rate,
        commission_update_time: Some(env.block.time),
        btc_pk_hex: btc_pk_hex.clone(),
        bsn_id: bsn_id.clone(),
        slashed_height: 0,
        slashed_btc_height: 0,
        jailed: false,
    };
    FPS.save(deps.storage, &btc_pk_hex, &fp)?;
    FP_BY_ADDR.save(deps.storage, info.sender.as_str(), &btc_pk_hex)?;

    let ev = Event::new("new_finality_provider")
        .add_attribute("module", "btc_staking")
        .add_attribute("btc_pk", btc_pk_hex)
        .add_attribute("addr", info.sender.to_string())
        .add_attribute("bsn_id", bsn_id);
    Ok(Response::new().add_event(ev))
}

/// handle_edit_finality_provider updates the description and/or commission
/// of an existing finality provider
pub fn handle_edit_finality_provider(
    deps: DepsMut,
    env: Env,
    info: &MessageInfo,
    btc_pk_hex: String,
    description: Option<FinalityProviderDescription>,
    commission: Option<Decimal>,
) -> Result<Response, ContractError> {
    let mut fp = FPS
        .may_load(deps.storage, &btc_pk_hex)?
        .ok_or_else(|| ContractError::FinalityProviderNotFound(btc_pk_hex.clone()))?;

    if info.sender.as_str() != fp.addr {
        return Err(ContractError::Unauthorized);
    }
    if fp.is_slashed() {
        return Err(ContractError::FinalityProviderAlreadySlashed(btc_pk_hex));
    }

    if let Some(description) = description {
        description.validate()?;
        fp.description = description;
    }

    if let Some(new_commission) = commission {
        let params = params::get_params(deps.storage)?;
        if new_commission < params.min_commission_rate {
            return Err(ContractError::CommissionBelowMinimum(
                params.min_commission_rate.to_string(),
            ));
        }
        if new_commission > fp.max_commission_rate {
            return Err(ContractError::CommissionAboveMaximum(
                fp.max_commission_rate.to_string(),
            ));
        }
        let change = if new_commission > fp.commission {
            new_commission - fp.commission
        } else {
            fp.commission - new_commission
        };
        if change > fp.max_commission_change_rate {
            return Err(ContractError::CommissionChangeTooLarge(
                fp.max_commission_change_rate.to_string(),
            ));
        }
        if let Some(last_update) = fp.commission_update_time {
            if env.block.time < last_update.plus_seconds(COMMISSION_UPDATE_COOLDOWN_SECS) {
                return Err(ContractError::CommissionUpdateCooldown {});
            }
        }
        fp.commission = new_commission;
        fp.commission_update_time = Some(env.block.time);
    }

    FPS.save(deps.storage, &btc_pk_hex, &fp)?;

    let ev = Event::new("edit_finality_provider")
        .add_attribute("module", "btc_staking")
        .add_attribute("btc_pk", btc_pk_hex);
    Ok(Response::new().add_event(ev))
}

struct CheckedFps {
    kinds: Vec<FpKind>,
    #[cfg_attr(not(feature = "full-validation"), allow(dead_code))]
    fp_pks: Vec<XOnlyPublicKey>,
}

/// Checks the target finality provider list of a new delegation: existence,
/// slashing status, the Babylon-FP rule, the multi-staking cap and consumer
/// uniqueness
fn check_fp_list(
    storage: &dyn Storage,
    own_chain_id: &str,
    params: &Params,
    fp_btc_pk_list: &[String],
) -> Result<CheckedFps, ContractError> {
    if fp_btc_pk_list.is_empty() {
        return Err(StakingApiError::EmptyBtcPkList.into());
    }
    if fp_btc_pk_list.len() as u32 > params.max_multi_staked_fps {
        return Err(ContractError::TooManyFps(
            fp_btc_pk_list.len() as u32,
            params.max_multi_staked_fps,
        ));
    }

    let mut seen = HashSet::new();
    let mut consumer_ids = HashSet::new();
    let mut num_babylon = 0usize;
    let mut kinds = vec![];
    let mut fp_pks = vec![];
    for fp_pk_hex in fp_btc_pk_list {
        if !seen.insert(fp_pk_hex) {
            return Err(StakingApiError::DuplicatedBtcPk(fp_pk_hex.clone()).into());
        }
        let pk_bytes = parse_bip340_pk(fp_pk_hex)?;
        let fp_pk = XOnlyPublicKey::from_slice(&pk_bytes)
            .map_err(|_| StakingApiError::InvalidBtcPk(fp_pk_hex.clone()))?;
        fp_pks.push(fp_pk);

        let fp = FPS
            .may_load(storage, fp_pk_hex)?
            .ok_or_else(|| ContractError::FinalityProviderNotFound(fp_pk_hex.clone()))?;
        if fp.is_slashed() {
            return Err(ContractError::FinalityProviderAlreadySlashed(
                fp_pk_hex.clone(),
            ));
        }
        let kind = fp.kind(own_chain_id);
        match &kind {
            FpKind::Babylon => num_babylon += 1,
            FpKind::Consumer { bsn_id } => {
                if !consumer_ids.insert(bsn_id.clone()) {
                    return Err(ContractError::DuplicateConsumer(bsn_id.clone()));
                }
            }
        }
        kinds.push(kind);
    }
    if fp_btc_pk_list.len() > 1 && num_babylon == 0 {
        return Err(ContractError::NoBabylonFp {});
    }
    Ok(CheckedFps { kinds, fp_pks })
}

/// handle_create_btc_delegation validates and persists a new BTC delegation.
///
/// The delegation is created PENDING. It only gains voting power once
/// 1) its staking tx is proven k-deep, and
/// 2) it holds a covenant signature quorum.
#[allow(clippy::too_many_arguments)]
pub fn handle_create_btc_delegation(
    mut deps: DepsMut,
    env: Env,
    info: &MessageInfo,
    btc_pk_hex: String,
    fp_btc_pk_list: Vec<String>,
    pop: ProofOfPossessionBtc,
    staking_time: u32,
    staking_value: u64,
    staking_tx: Binary,
    staking_output_idx: u32,
    staking_tx_inclusion_proof: Option<InclusionProof>,
    slashing_tx: Binary,
    delegator_slashing_sig: Binary,
    unbonding_time: u32,
    unbonding_tx: Binary,
    unbonding_value: u64,
    unbonding_slashing_tx: Binary,
    delegator_unbonding_slashing_sig: Binary,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let (params_version, params) = params::get_latest(deps.storage)?;

    // Stateless checks: key shapes, tx decodability, signature presence
    let staker_btc_pk = parse_bip340_pk(&btc_pk_hex)?;
    let staker_pk = XOnlyPublicKey::from_slice(&staker_btc_pk)
        .map_err(|_| StakingApiError::InvalidBtcPk(btc_pk_hex.clone()))?;
    let staking_tx_parsed: Transaction = deserialize(&staking_tx)
        .map_err(|_| ContractError::InvalidBtcTx(staking_tx.encode_hex()))?;
    let slashing_tx_parsed: Transaction = deserialize(&slashing_tx)
        .map_err(|_| ContractError::InvalidBtcTx(slashing_tx.encode_hex()))?;
    let unbonding_tx_parsed: Transaction = deserialize(&unbonding_tx)
        .map_err(|_| ContractError::InvalidBtcTx(unbonding_tx.encode_hex()))?;
    let unbonding_slashing_tx_parsed: Transaction = deserialize(&unbonding_slashing_tx)
        .map_err(|_| ContractError::InvalidBtcTx(unbonding_slashing_tx.encode_hex()))?;
    validation::check_staking_tx_lock_time(&staking_tx_parsed)?;
    if unbonding_time > u16::MAX as u32 {
        return Err(ContractError::InvalidLockTime(
            unbonding_time,
            u16::MAX as u32,
        ));
    }
    if delegator_slashing_sig.is_empty() || delegator_unbonding_slashing_sig.is_empty() {
        return Err(StakingApiError::EmptySignature.into());
    }

    // The proof of possession binds the staker's BTC key to its native address
    pop.verify(&staker_btc_pk, info.sender.as_str())?;

    let staking_tx_hash = staking_tx_parsed.txid();
    let hash_key: &[u8; HASH_SIZE] = staking_tx_hash.as_ref();

    // Reject duplicates
    if DELEGATIONS.has(deps.storage, hash_key) {
        return Err(ContractError::DelegationAlreadyExists(
            staking_tx_hash.to_string(),
        ));
    }

    // While the allow list is active, only pre-approved staking txs may enter
    if params.allow_list_expiration_height > 0
        && env.block.height < params.allow_list_expiration_height
        && !ALLOWED_STAKING_TX_HASHES.has(deps.storage, hash_key)
    {
        return Err(ContractError::NotInAllowList(staking_tx_hash.to_string()));
    }

    // Target finality providers
    let checked_fps = check_fp_list(deps.storage, &config.own_chain_id, &params, &fp_btc_pk_list)?;

    // Staking value / time / unbonding time against the active params
    if staking_value < params.min_staking_value_sat || staking_value > params.max_staking_value_sat
    {
        return Err(ContractError::StakingValueOutOfBounds(
            staking_value,
            params.min_staking_value_sat,
            params.max_staking_value_sat,
        ));
    }
    if staking_time < params.min_staking_time_blocks
        || staking_time > params.max_staking_time_blocks
    {
        return Err(ContractError::StakingTimeOutOfBounds(
            staking_time,
            params.min_staking_time_blocks,
            params.max_staking_time_blocks,
        ));
    }
    let min_unbonding = params
        .min_unbonding_time_blocks
        .max(config.btc_confirmation_depth);
    if unbonding_time <= min_unbonding {
        return Err(ContractError::UnbondingTimeTooShort(
            unbonding_time,
            min_unbonding,
        ));
    }

    // The staking output must match the claimed value
    if staking_output_idx as usize >= staking_tx_parsed.output.len() {
        return Err(ContractError::InvalidBtcTx(
            "staking output index out of range".to_string(),
        ));
    }
    let staking_out_value = staking_tx_parsed.output[staking_output_idx as usize]
        .value
        .to_sat();
    if staking_out_value != staking_value {
        return Err(ContractError::StakingValueOutOfBounds(
            staking_out_value,
            staking_value,
            staking_value,
        ));
    }

    // Slashing tx consistency with the staking tx
    let slashing_rate = rust_decimal::Decimal::from_str(&params.slashing_rate.to_string())
        .map_err(|e| ContractError::InvalidParams(e.to_string()))?;
    let slashing_pk_script = bitcoin::ScriptBuf::from_bytes(hex::decode(
        &params.slashing_pk_script,
    )?);
    let network = get_bitcoin_network(&params.btc_network);
    tx_verify::check_transactions(
        &slashing_tx_parsed,
        &staking_tx_parsed,
        staking_output_idx,
        params.min_slashing_tx_fee_sat,
        &slashing_rate,
        &slashing_pk_script,
        &staker_pk,
        unbonding_time as u16,
        network,
    )?;

    // Unbonding tx spends the staking output with the parametrised fee
    tx_verify::check_unbonding_tx(
        &unbonding_tx_parsed,
        &staking_tx_parsed,
        staking_output_idx,
        params.unbonding_fee_sat,
    )?;
    if unbonding_tx_parsed.output[0].value.to_sat() != unbonding_value {
        return Err(ContractError::InvalidBtcTx(
            "unbonding value mismatch".to_string(),
        ));
    }
    // Unbonding slashing tx consistency with the unbonding tx
    tx_verify::check_transactions(
        &unbonding_slashing_tx_parsed,
        &unbonding_tx_parsed,
        0,
        params.min_slashing_tx_fee_sat,
        &slashing_rate,
        &slashing_pk_script,
        &staker_pk,
        unbonding_time as u16,
        network,
    )?;

    // Staker signatures over the slashing paths
    #[cfg(feature = "full-validation")]
    {
        let covenant_pks = covenant_pks_from_params(&params)?;
        validation::verify_delegator_slashing_sigs(
            &staker_pk,
            &checked_fps.fp_pks,
            &covenant_pks,
            params.covenant_quorum,
            &staking_tx_parsed,
            staking_output_idx,
            staking_time as u16,
            unbonding_time as u16,
            &slashing_tx_parsed,
            &delegator_slashing_sig,
            &unbonding_tx_parsed,
            &unbonding_slashing_tx_parsed,
            &delegator_unbonding_slashing_sig,
        )?;
    }

    // Inclusion proof now, or later via the pre-approval flow
    let (start_height, end_height) = match staking_tx_inclusion_proof {
        Some(prf) => {
            let period = validation::verify_inclusion_proof_and_get_height(
                &deps.querier,
                &config.btc_light_client,
                config.btc_confirmation_depth,
                &staking_tx_parsed,
                staking_time,
                unbonding_time,
                &prf,
            )?;
            (period.start_height, period.end_height)
        }
        None => (0, 0),
    };

    let delegation = BtcDelegation {
        staker_addr: info.sender.to_string(),
        btc_pk_hex,
        fp_btc_pk_list: fp_btc_pk_list.clone(),
        start_height,
        end_height,
        total_sat: staking_value,
        staking_time,
        staking_tx: staking_tx.to_vec(),
        staking_output_idx,
        slashing_tx: slashing_tx.to_vec(),
        delegator_slashing_sig: delegator_slashing_sig.to_vec(),
        covenant_sigs: vec![],
        unbonding_time,
        undelegation_info: UndelegationInfo {
            unbonding_tx: unbonding_tx.to_vec(),
            delegator_unbonding_sig: vec![],
            covenant_unbonding_sig_list: vec![],
            slashing_tx: unbonding_slashing_tx.to_vec(),
            delegator_slashing_sig: delegator_unbonding_slashing_sig.to_vec(),
            covenant_slashing_sigs: vec![],
        },
        params_version,
    };
    DELEGATIONS.save(deps.storage, hash_key, &delegation)?;

    // Index by finality provider, in the keyspace of its kind
    for (fp_pk_hex, kind) in fp_btc_pk_list.iter().zip(checked_fps.kinds.iter()) {
        index_delegation(
            deps.storage,
            kind,
            fp_pk_hex,
            &delegation.btc_pk_hex,
            hash_key,
        )?;
    }

    // With a proven inclusion the expiry is known; schedule the retirement
    // event so replay unbonds the delegation at the right BTC height
    if end_height > 0 {
        push_power_dist_event(
            deps.storage,
            end_height.saturating_sub(config.btc_confirmation_depth),
            &PowerDistUpdateEvent::BtcDelStateUpdate {
                staking_tx_hash: hash_key.to_vec(),
                new_state: DelegationEventState::Unbonded,
            },
        )?;
    }

    let ev = delegation_state_event(&staking_tx_hash, BTCDelegationStatus::Pending);
    Ok(Response::new().add_event(ev))
}

/// Parses the covenant committee of a params version into x-only keys
pub(crate) fn covenant_pks_from_params(
    params: &Params,
) -> Result<Vec<XOnlyPublicKey>, ContractError> {
    params
        .covenant_pks
        .iter()
        .map(|pk_hex| {
            let bytes = parse_bip340_pk(pk_hex)?;
            XOnlyPublicKey::from_slice(&bytes)
                .map_err(|_| StakingApiError::InvalidBtcPk(pk_hex.clone()).into())
        })
        .collect()
}

/// handle_add_covenant_sigs records one covenant member's pre-signatures.
/// Duplicate submissions are no-ops, as are submissions after the quorum is
/// reached. On reaching the quorum exactly once, the delegation is scheduled
/// to become ACTIVE (inclusion-proof flow) or left VERIFIED (pre-approval).
pub fn handle_add_covenant_sigs(
    deps: DepsMut,
    _env: Env,
    _info: &MessageInfo,
    pk_hex: String,
    staking_tx_hash_hex: String,
    slashing_tx_sigs: Vec<Binary>,
    unbonding_tx_sig: Binary,
    slashing_unbonding_tx_sigs: Vec<Binary>,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let staking_tx_hash = staking_tx_hash_from_hex(&staking_tx_hash_hex)?;
    let hash_key: &[u8; HASH_SIZE] = staking_tx_hash.as_ref();
    let mut delegation = DELEGATIONS
        .may_load(deps.storage, hash_key)?
        .ok_or_else(|| ContractError::DelegationNotFound(staking_tx_hash_hex.clone()))?;
    let params = params::get_params_by_version(deps.storage, delegation.params_version)?;

    // The sender's key must be in the covenant committee of the delegation's
    // params version
    if !params.covenant_pks.contains(&pk_hex) {
        return Err(ContractError::NotInCovenantCommittee(pk_hex));
    }
    let cov_pk_bytes = hex::decode(&pk_hex)?;

    // No-op once the quorum is reached; nothing new can activate twice
    if delegation.has_covenant_quorum(params.covenant_quorum) {
        return Ok(Response::new().add_attribute("action", "add_covenant_sigs_quorum_reached"));
    }
    // Idempotent on duplicate submissions from the same member
    if delegation
        .covenant_sigs
        .iter()
        .any(|sigs| sigs.cov_pk.as_slice() == cov_pk_bytes.as_slice())
    {
        return Ok(Response::new().add_attribute("action", "add_covenant_sigs_duplicate"));
    }

    // One adaptor signature per target finality provider, for both slashing
    // paths, plus the Schnorr signature on the unbonding tx
    let num_fps = delegation.fp_btc_pk_list.len();
    if slashing_tx_sigs.len() != num_fps {
        return Err(ContractError::WrongNumberOfCovenantSigs(
            num_fps,
            slashing_tx_sigs.len(),
        ));
    }
    if slashing_unbonding_tx_sigs.len() != num_fps {
        return Err(ContractError::WrongNumberOfCovenantSigs(
            num_fps,
            slashing_unbonding_tx_sigs.len(),
        ));
    }
    if unbonding_tx_sig.is_empty() {
        return Err(StakingApiError::EmptySignature.into());
    }

    #[cfg(feature = "full-validation")]
    verify_covenant_sigs(
        &delegation,
        &params,
        &cov_pk_bytes,
        &slashing_tx_sigs,
        &unbonding_tx_sig,
        &slashing_unbonding_tx_sigs,
    )?;

    delegation.covenant_sigs.push(CovenantAdaptorSignatures {
        cov_pk: Binary::new(cov_pk_bytes.clone()),
        adaptor_sigs: slashing_tx_sigs,
    });
    delegation
        .undelegation_info
        .covenant_unbonding_sig_list
        .push(SignatureInfo {
            pk: Binary::new(cov_pk_bytes.clone()),
            sig: unbonding_tx_sig,
        });
    delegation
        .undelegation_info
        .covenant_slashing_sigs
        .push(CovenantAdaptorSignatures {
            cov_pk: Binary::new(cov_pk_bytes),
            adaptor_sigs: slashing_unbonding_tx_sigs,
        });

    let mut res = Response::new().add_attribute("action", "add_covenant_sigs");
    if delegation.has_covenant_quorum(params.covenant_quorum) {
        if delegation.has_inclusion_proof() {
            // becomes ACTIVE at the current BTC tip; exactly one ACTIVE event
            // is ever emitted for a delegation
            let tip_height =
                light_client::query_tip_height(&deps.querier, &config.btc_light_client)?;
            push_power_dist_event(
                deps.storage,
                tip_height,
                &PowerDistUpdateEvent::BtcDelStateUpdate {
                    staking_tx_hash: hash_key.to_vec(),
                    new_state: DelegationEventState::Active,
                },
            )?;
            res = res.add_event(delegation_state_event(
                &staking_tx_hash,
                BTCDelegationStatus::Active,
            ));
        } else {
            // pre-approval flow: activation is deferred to the inclusion proof
            res = res.add_event(delegation_state_event(
                &staking_tx_hash,
                BTCDelegationStatus::Verified,
            ));
        }
    }
    DELEGATIONS.save(deps.storage, hash_key, &delegation)?;

    Ok(res)
}

/// Full cryptographic validation of one covenant member's pre-signatures
#[cfg(feature = "full-validation")]
fn verify_covenant_sigs(
    delegation: &BtcDelegation,
    params: &Params,
    cov_pk_bytes: &[u8],
    slashing_tx_sigs: &[Binary],
    unbonding_tx_sig: &Binary,
    slashing_unbonding_tx_sigs: &[Binary],
) -> Result<(), ContractError> {
    use babylon_btcstaking::adaptor_sig::AdaptorSignature;
    use babylon_btcstaking::scripts::StakingScriptPaths;
    use babylon_btcstaking::sig_verify::{
        enc_verify_transaction_sig_with_output, verify_transaction_sig_with_output,
    };
    use k256::schnorr::Signature;

    let cov_pk = XOnlyPublicKey::from_slice(cov_pk_bytes)
        .map_err(|_| StakingApiError::InvalidBtcPk(hex::encode(cov_pk_bytes)))?;
    let staker_pk_bytes = parse_bip340_pk(&delegation.btc_pk_hex)?;
    let staker_pk = XOnlyPublicKey::from_slice(&staker_pk_bytes)
        .map_err(|_| StakingApiError::InvalidBtcPk(delegation.btc_pk_hex.clone()))?;
    let fp_pks: Vec<XOnlyPublicKey> = delegation
        .fp_btc_pk_list
        .iter()
        .map(|pk_hex| {
            let bytes = parse_bip340_pk(pk_hex)?;
            XOnlyPublicKey::from_slice(&bytes)
                .map_err(|_| StakingApiError::InvalidBtcPk(pk_hex.clone()).into())
        })
        .collect::<Result<_, ContractError>>()?;
    let covenant_pks = covenant_pks_from_params(params)?;

    let staking_tx: Transaction = deserialize(&delegation.staking_tx)
        .map_err(|_| ContractError::InvalidBtcTx(delegation.staking_tx.encode_hex()))?;
    let slashing_tx: Transaction = deserialize(&delegation.slashing_tx)
        .map_err(|_| ContractError::InvalidBtcTx(delegation.slashing_tx.encode_hex()))?;
    let unbonding_tx: Transaction = deserialize(&delegation.undelegation_info.unbonding_tx)
        .map_err(|_| {
            ContractError::InvalidBtcTx(delegation.undelegation_info.unbonding_tx.encode_hex())
        })?;
    let unbonding_slashing_tx: Transaction =
        deserialize(&delegation.undelegation_info.slashing_tx).map_err(|_| {
            ContractError::InvalidBtcTx(delegation.undelegation_info.slashing_tx.encode_hex())
        })?;

    let staking_paths = StakingScriptPaths::new(
        &staker_pk,
        &fp_pks,
        &covenant_pks,
        params.covenant_quorum as usize,
        delegation.staking_time as u16,
    )?;
    let unbonding_paths = StakingScriptPaths::new(
        &staker_pk,
        &fp_pks,
        &covenant_pks,
        params.covenant_quorum as usize,
        delegation.unbonding_time as u16,
    )?;
    let staking_out = &staking_tx.output[delegation.staking_output_idx as usize];
    let unbonding_out = &unbonding_tx.output[0];

    for (fp_pk, asig_bytes) in fp_pks.iter().zip(slashing_tx_sigs.iter()) {
        let asig = AdaptorSignature::from_bytes(asig_bytes)?;
        enc_verify_transaction_sig_with_output(
            &slashing_tx,
            staking_out,
            staking_paths.slashing_path_script.as_script(),
            &cov_pk,
            fp_pk,
            &asig,
        )?;
    }
    let sig = Signature::try_from(unbonding_tx_sig.as_slice())
        .map_err(|e| ContractError::InvalidBtcTx(e.to_string()))?;
    verify_transaction_sig_with_output(
        &unbonding_tx,
        staking_out,
        staking_paths.unbonding_path_script.as_script(),
        &cov_pk,
        &sig,
    )?;
    for (fp_pk, asig_bytes) in fp_pks.iter().zip(slashing_unbonding_tx_sigs.iter()) {
        let asig = AdaptorSignature::from_bytes(asig_bytes)?;
        enc_verify_transaction_sig_with_output(
            &unbonding_slashing_tx,
            unbonding_out,
            unbonding_paths.slashing_path_script.as_script(),
            &cov_pk,
            fp_pk,
            &asig,
        )?;
    }
    Ok(())
}

/// handle_add_inclusion_proof attaches an inclusion proof to a VERIFIED
/// delegation, fixing its time-lock window and scheduling both its
/// activation and its retirement
pub fn handle_add_inclusion_proof(
    deps: DepsMut,
    _env: Env,
    staking_tx_hash_hex: String,
    prf: InclusionProof,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let staking_tx_hash = staking_tx_hash_from_hex(&staking_tx_hash_hex)?;
    let hash_key: &[u8; HASH_SIZE] = staking_tx_hash.as_ref();
    let mut delegation = DELEGATIONS
        .may_load(deps.storage, hash_key)?
        .ok_or_else(|| ContractError::DelegationNotFound(staking_tx_hash_hex.clone()))?;
    let params = params::get_params_by_version(deps.storage, delegation.params_version)?;

    if delegation.has_inclusion_proof() {
        return Err(ContractError::DelegationAlreadyProven {});
    }
    let tip_height = light_client::query_tip_height(&deps.querier, &config.btc_light_client)?;
    let status = delegation.get_status(tip_height, params.covenant_quorum);
    if status != BTCDelegationStatus::Verified {
        return Err(ContractError::DelegationWrongState {
            expected: BTCDelegationStatus::Verified,
            actual: status,
        });
    }

    let staking_tx: Transaction = deserialize(&delegation.staking_tx)
        .map_err(|_| ContractError::InvalidBtcTx(delegation.staking_tx.encode_hex()))?;
    let period = validation::verify_inclusion_proof_and_get_height(
        &deps.querier,
        &config.btc_light_client,
        config.btc_confirmation_depth,
        &staking_tx,
        delegation.staking_time,
        delegation.unbonding_time,
        &prf,
    )?;

    delegation.start_height = period.start_height;
    delegation.end_height = period.end_height;
    DELEGATIONS.save(deps.storage, hash_key, &delegation)?;

    push_power_dist_event(
        deps.storage,
        period.tip_height,
        &PowerDistUpdateEvent::BtcDelStateUpdate {
            staking_tx_hash: hash_key.to_vec(),
            new_state: DelegationEventState::Active,
        },
    )?;
    push_power_dist_event(
        deps.storage,
        period
            .end_height
            .saturating_sub(config.btc_confirmation_depth),
        &PowerDistUpdateEvent::BtcDelStateUpdate {
            staking_tx_hash: hash_key.to_vec(),
            new_state: DelegationEventState::Unbonded,
        },
    )?;

    let ev = delegation_state_event(&staking_tx_hash, BTCDelegationStatus::Active);
    Ok(Response::new().add_event(ev))
}

/// handle_btc_undelegate unbonds an active delegation early, upon the
/// staker-signed spend of the staking output
pub fn handle_btc_undelegate(
    deps: DepsMut,
    _env: Env,
    staking_tx_hash_hex: String,
    stake_spending_tx: Binary,
    stake_spending_tx_inclusion_proof: Option<InclusionProof>,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let staking_tx_hash = staking_tx_hash_from_hex(&staking_tx_hash_hex)?;
    let hash_key: &[u8; HASH_SIZE] = staking_tx_hash.as_ref();
    let mut delegation = DELEGATIONS
        .may_load(deps.storage, hash_key)?
        .ok_or_else(|| ContractError::DelegationNotFound(staking_tx_hash_hex.clone()))?;
    let params = params::get_params_by_version(deps.storage, delegation.params_version)?;

    let tip_height = light_client::query_tip_height(&deps.querier, &config.btc_light_client)?;
    let status = delegation.get_status(tip_height, params.covenant_quorum);
    if status != BTCDelegationStatus::Active {
        return Err(ContractError::DelegationNotActive(staking_tx_hash_hex));
    }

    let spending_tx: Transaction = deserialize(&stake_spending_tx)
        .map_err(|_| ContractError::InvalidBtcTx(stake_spending_tx.encode_hex()))?;
    let staking_tx: Transaction = deserialize(&delegation.staking_tx)
        .map_err(|_| ContractError::InvalidBtcTx(delegation.staking_tx.encode_hex()))?;
    let unbonding_tx: Transaction = deserialize(&delegation.undelegation_info.unbonding_tx)
        .map_err(|_| {
            ContractError::InvalidBtcTx(delegation.undelegation_info.unbonding_tx.encode_hex())
        })?;

    // The spend must consume the staking output and must be the pre-signed
    // unbonding tx
    if spending_tx.input.len() != 1
        || spending_tx.input[0].previous_output.txid != staking_tx_hash
        || spending_tx.input[0].previous_output.vout != delegation.staking_output_idx
    {
        return Err(ContractError::WrongStakeSpendingTx {});
    }
    if spending_tx.txid() != unbonding_tx.txid() {
        return Err(ContractError::WrongStakeSpendingTx {});
    }

    // Extract and verify the staker's Schnorr signature from the witness
    let staker_pk_bytes = parse_bip340_pk(&delegation.btc_pk_hex)?;
    let staker_pk = XOnlyPublicKey::from_slice(&staker_pk_bytes)
        .map_err(|_| StakingApiError::InvalidBtcPk(delegation.btc_pk_hex.clone()))?;
    let fp_pks: Vec<XOnlyPublicKey> = delegation
        .fp_btc_pk_list
        .iter()
        .map(|pk_hex| {
            let bytes = parse_bip340_pk(pk_hex)?;
            XOnlyPublicKey::from_slice(&bytes)
                .map_err(|_| StakingApiError::InvalidBtcPk(pk_hex.clone()).into())
        })
        .collect::<Result<_, ContractError>>()?;
    let covenant_pks = covenant_pks_from_params(&params)?;
    let script_paths = babylon_btcstaking::scripts::StakingScriptPaths::new(
        &staker_pk,
        &fp_pks,
        &covenant_pks,
        params.covenant_quorum as usize,
        delegation.staking_time as u16,
    )?;
    let staking_out = &staking_tx.output[delegation.staking_output_idx as usize];
    let staker_sig = babylon_btcstaking::sig_verify::find_staker_sig_in_witness(
        &spending_tx,
        staking_out,
        script_paths.unbonding_path_script.as_script(),
        &staker_pk,
    )?;

    // When the spend is already on Bitcoin, check it is k-deep
    if let Some(prf) = stake_spending_tx_inclusion_proof {
        validation::verify_spend_inclusion(
            &deps.querier,
            &config.btc_light_client,
            config.btc_confirmation_depth,
            &spending_tx,
            &prf,
        )?;
    }

    delegation.undelegation_info.delegator_unbonding_sig = staker_sig.to_bytes().to_vec();
    DELEGATIONS.save(deps.storage, hash_key, &delegation)?;

    push_power_dist_event(
        deps.storage,
        tip_height,
        &PowerDistUpdateEvent::BtcDelStateUpdate {
            staking_tx_hash: hash_key.to_vec(),
            new_state: DelegationEventState::Unbonded,
        },
    )?;

    let ev = delegation_state_event(&staking_tx_hash, BTCDelegationStatus::Unbonded);
    Ok(Response::new().add_event(ev))
}

/// handle_selective_slashing_evidence slashes a finality provider whose
/// secret key leaked through a selective slashing attempt. Valid regardless
/// of the delegation's own state
pub fn handle_selective_slashing_evidence(
    mut deps: DepsMut,
    env: Env,
    staking_tx_hash_hex: String,
    recovered_fp_btc_sk_hex: String,
) -> Result<Response, ContractError> {
    let staking_tx_hash = staking_tx_hash_from_hex(&staking_tx_hash_hex)?;
    let hash_key: &[u8; HASH_SIZE] = staking_tx_hash.as_ref();
    let delegation = DELEGATIONS
        .may_load(deps.storage, hash_key)?
        .ok_or_else(|| ContractError::DelegationNotFound(staking_tx_hash_hex.clone()))?;

    // Derive the public key of the revealed secret key
    let sk_bytes = hex::decode(&recovered_fp_btc_sk_hex)?;
    let sk = k256::schnorr::SigningKey::from_bytes(&sk_bytes)
        .map_err(|_| ContractError::InvalidBtcSk {})?;
    let fp_btc_pk_hex = hex::encode(sk.verifying_key().to_bytes());

    // The key must belong to one of the delegation's finality providers
    if !delegation.fp_btc_pk_list.contains(&fp_btc_pk_hex) {
        return Err(ContractError::EvidenceFpMismatch {});
    }

    let mut res = slash_finality_provider(&mut deps, &env, &fp_btc_pk_hex)?;
    res = res.add_event(
        Event::new("selective_slashing")
            .add_attribute("module", "btc_staking")
            .add_attribute("staking_tx_hash", staking_tx_hash.to_string())
            .add_attribute("fp_btc_pk", fp_btc_pk_hex),
    );
    Ok(res)
}

/// slash_finality_provider marks a finality provider slashed, zeroes its
/// power via the event pipeline, and emits one packet event per consumer
/// backing each of its delegations
pub fn slash_finality_provider(
    deps: &mut DepsMut,
    env: &Env,
    fp_btc_pk_hex: &str,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let mut fp = FPS
        .may_load(deps.storage, fp_btc_pk_hex)?
        .ok_or_else(|| ContractError::FinalityProviderNotFound(fp_btc_pk_hex.to_string()))?;
    if fp.is_slashed() {
        return Err(ContractError::FinalityProviderAlreadySlashed(
            fp_btc_pk_hex.to_string(),
        ));
    }
    let tip_height = light_client::query_tip_height(&deps.querier, &config.btc_light_client)?;

    fp.slashed_height = env.block.height;
    fp.slashed_btc_height = tip_height;
    FPS.save(deps.storage, fp_btc_pk_hex, &fp)?;

    push_power_dist_event(
        deps.storage,
        tip_height,
        &PowerDistUpdateEvent::SlashedFp {
            fp_btc_pk_hex: fp_btc_pk_hex.to_string(),
        },
    )?;

    // One slashed-delegation packet per (delegation, distinct consumer)
    let mut res = Response::new().add_event(
        Event::new("slashed_finality_provider")
            .add_attribute("module", "btc_staking")
            .add_attribute("finality_provider", fp_btc_pk_hex.to_string())
            .add_attribute("native_height", env.block.height.to_string())
            .add_attribute("btc_height", tip_height.to_string()),
    );
    for hash in delegation_hashes_of_fp(deps.storage, fp_btc_pk_hex)? {
        let hash_key: &[u8; HASH_SIZE] = hash
            .as_slice()
            .try_into()
            .map_err(|_| ContractError::InvalidStakingTxHash(hex::encode(&hash)))?;
        let delegation = DELEGATIONS.load(deps.storage, hash_key)?;
        let mut consumers = HashSet::new();
        for pk_hex in &delegation.fp_btc_pk_list {
            let del_fp = FPS
                .may_load(deps.storage, pk_hex)?
                .ok_or_else(|| ContractError::FinalityProviderNotFound(pk_hex.clone()))?;
            if let FpKind::Consumer { bsn_id } = del_fp.kind(&config.own_chain_id) {
                consumers.insert(bsn_id);
            }
        }
        let mut consumers: Vec<_> = consumers.into_iter().collect();
        consumers.sort();
        for consumer_id in consumers {
            res = res.add_event(
                Event::new("slashed_btc_delegation")
                    .add_attribute("module", "btc_staking")
                    .add_attribute("staking_tx_hash", hex::encode(&hash))
                    .add_attribute("consumer_id", consumer_id),
            );
        }
    }
    Ok(res)
}

/// All staking tx hashes delegated to the given finality provider, from both
/// delegator keyspaces
fn delegation_hashes_of_fp(
    storage: &dyn Storage,
    fp_btc_pk_hex: &str,
) -> Result<Vec<Vec<u8>>, ContractError> {
    let mut hashes = vec![];
    for index in [BTC_DELEGATORS, CONSUMER_DELEGATORS] {
        let entries: Vec<DelegationIndex> = index
            .prefix(fp_btc_pk_hex)
            .range(storage, None, None, cosmwasm_std::Order::Ascending)
            .map(|item| item.map(|(_, v)| v))
            .collect::<cosmwasm_std::StdResult<_>>()?;
        for entry in entries {
            hashes.extend(entry.staking_tx_hashes);
        }
    }
    Ok(hashes)
}

/// handle_jail_finality_provider excludes a finality provider from the power
/// table without touching its delegations. Restricted to the finality
/// collaborator or the admin
pub fn handle_jail_finality_provider(
    deps: DepsMut,
    env: Env,
    info: &MessageInfo,
    fp_btc_pk_hex: String,
) -> Result<Response, ContractError> {
    assert_finality_or_admin(&deps, info)?;
    let config = CONFIG.load(deps.storage)?;
    let mut fp = FPS
        .may_load(deps.storage, &fp_btc_pk_hex)?
        .ok_or_else(|| ContractError::FinalityProviderNotFound(fp_btc_pk_hex.clone()))?;
    if fp.is_slashed() {
        return Err(ContractError::FinalityProviderAlreadySlashed(fp_btc_pk_hex));
    }
    if fp.jailed {
        return Err(ContractError::FinalityProviderAlreadyJailed(fp_btc_pk_hex));
    }
    fp.jailed = true;
    FPS.save(deps.storage, &fp_btc_pk_hex, &fp)?;

    let tip_height = light_client::query_tip_height(&deps.querier, &config.btc_light_client)?;
    push_power_dist_event(
        deps.storage,
        tip_height,
        &PowerDistUpdateEvent::JailedFp {
            fp_btc_pk_hex: fp_btc_pk_hex.clone(),
        },
    )?;

    let ev = Event::new("jailed_finality_provider")
        .add_attribute("module", "btc_staking")
        .add_attribute("finality_provider", fp_btc_pk_hex)
        .add_attribute("height", env.block.height.to_string());
    Ok(Response::new().add_event(ev))
}

/// handle_unjail_finality_provider lifts a jail. Restricted to the finality
/// collaborator or the admin
pub fn handle_unjail_finality_provider(
    deps: DepsMut,
    env: Env,
    info: &MessageInfo,
    fp_btc_pk_hex: String,
) -> Result<Response, ContractError> {
    assert_finality_or_admin(&deps, info)?;
    let config = CONFIG.load(deps.storage)?;
    let mut fp = FPS
        .may_load(deps.storage, &fp_btc_pk_hex)?
        .ok_or_else(|| ContractError::FinalityProviderNotFound(fp_btc_pk_hex.clone()))?;
    if fp.is_slashed() {
        return Err(ContractError::FinalityProviderAlreadySlashed(fp_btc_pk_hex));
    }
    if !fp.jailed {
        return Err(ContractError::FinalityProviderNotJailed(fp_btc_pk_hex));
    }
    fp.jailed = false;
    FPS.save(deps.storage, &fp_btc_pk_hex, &fp)?;

    let tip_height = light_client::query_tip_height(&deps.querier, &config.btc_light_client)?;
    push_power_dist_event(
        deps.storage,
        tip_height,
        &PowerDistUpdateEvent::UnjailedFp {
            fp_btc_pk_hex: fp_btc_pk_hex.clone(),
        },
    )?;

    let ev = Event::new("unjailed_finality_provider")
        .add_attribute("module", "btc_staking")
        .add_attribute("finality_provider", fp_btc_pk_hex)
        .add_attribute("height", env.block.height.to_string());
    Ok(Response::new().add_event(ev))
}

fn assert_finality_or_admin(deps: &DepsMut, info: &MessageInfo) -> Result<(), ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if let Some(finality) = &config.btc_finality {
        if info.sender == *finality {
            return Ok(());
        }
    }
    if ADMIN.is_admin(deps.as_ref(), &info.sender)? {
        return Ok(());
    }
    Err(ContractError::Unauthorized)
}

/// handle_btc_rollback records a BTC chain roll-back reported by the light
/// client. The stored depth is the monotone max of everything observed
pub fn handle_btc_rollback(
    deps: DepsMut,
    info: &MessageInfo,
    from_height: u32,
    to_height: u32,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.btc_light_client {
        return Err(ContractError::Unauthorized);
    }
    let mut res = Response::new().add_attribute("action", "btc_roll_back");
    if to_height < from_height {
        let depth = from_height - to_height;
        let largest = record_btc_reorg(deps.storage, depth)?;
        res = res.add_event(
            Event::new("btc_roll_back")
                .add_attribute("module", "btc_staking")
                .add_attribute("from_height", from_height.to_string())
                .add_attribute("to_height", to_height.to_string())
                .add_attribute("largest_reorg", largest.to_string()),
        );
    }
    Ok(res)
}

/// handle_update_params appends a new params version. Restricted to the
/// governance authority
pub fn handle_update_params(
    deps: DepsMut,
    info: &MessageInfo,
    new_params: Params,
) -> Result<Response, ContractError> {
    ADMIN.assert_admin(deps.as_ref(), &info.sender)?;
    let version = params::add_params(deps.storage, &new_params)?;
    let ev = Event::new("update_params")
        .add_attribute("module", "btc_staking")
        .add_attribute("version", version.to_string())
        .add_attribute(
            "btc_activation_height",
            new_params.btc_activation_height.to_string(),
        );
    Ok(Response::new().add_event(ev))
}
