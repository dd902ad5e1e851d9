#[cfg(not(feature = "library"))]
use cosmwasm_std::entry_point;
use cosmwasm_std::{to_json_binary, Deps, DepsMut, Env, MessageInfo, QueryResponse, Response};
use cw2::set_contract_version;
use cw_utils::{maybe_addr, nonpayable};

use babylon_apis::btc_staking_api::HASH_SIZE;

use crate::error::ContractError;
use crate::msg::{ExecuteMsg, InstantiateMsg, QueryMsg, SudoMsg};
use crate::power_dist;
use crate::queries;
use crate::staking;
use crate::state::config::{Config, ADMIN, CONFIG};
use crate::state::params;
use crate::state::staking::ALLOWED_STAKING_TX_HASHES;

pub const CONTRACT_NAME: &str = env!("CARGO_PKG_NAME");
pub const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    mut deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    nonpayable(&info)?;
    if msg.btc_confirmation_depth == 0 {
        return Err(ContractError::InvalidParams(
            "BTC confirmation depth must be greater than 0".to_string(),
        ));
    }

    let api = deps.api;
    let denom = match msg.denom {
        Some(denom) => denom,
        None => deps.querier.query_bonded_denom()?,
    };
    let config = Config {
        denom,
        own_chain_id: env.block.chain_id.clone(),
        btc_light_client: api.addr_validate(&msg.btc_light_client)?,
        btc_confirmation_depth: msg.btc_confirmation_depth,
        btc_finality: msg
            .btc_finality
            .map(|addr| api.addr_validate(&addr))
            .transpose()?,
        coostaking: msg
            .coostaking
            .map(|addr| api.addr_validate(&addr))
            .transpose()?,
    };
    CONFIG.save(deps.storage, &config)?;

    ADMIN.set(deps.branch(), maybe_addr(api, msg.admin)?)?;

    // version 0 of the staking params
    let init_params = msg.params.unwrap_or_default();
    params::add_params(deps.storage, &init_params)?;

    for hash_hex in msg.allowed_staking_tx_hashes.unwrap_or_default() {
        let hash = staking::staking_tx_hash_from_hex(&hash_hex)?;
        let hash_key: &[u8; HASH_SIZE] = hash.as_ref();
        ALLOWED_STAKING_TX_HASHES.save(deps.storage, hash_key, &())?;
    }

    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    Ok(Response::new().add_attribute("action", "instantiate"))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    let api = deps.api;
    match msg {
        ExecuteMsg::UpdateAdmin { admin } => ADMIN
            .execute_update_admin(deps, info, maybe_addr(api, admin)?)
            .map_err(Into::into),
        ExecuteMsg::UpdateParams { params } => {
            staking::handle_update_params(deps, &info, params)
        }
        ExecuteMsg::CreateFinalityProvider {
            description,
            commission,
            btc_pk_hex,
            pop,
            bsn_id,
        } => staking::handle_create_finality_provider(
            deps,
            env,
            &info,
            description,
            commission,
            btc_pk_hex,
            pop,
            bsn_id,
        ),
        ExecuteMsg::EditFinalityProvider {
            btc_pk_hex,
            description,
            commission,
        } => staking::handle_edit_finality_provider(
            deps,
            env,
            &info,
            btc_pk_hex,
            description,
            commission,
        ),
        ExecuteMsg::CreateBtcDelegation {
            btc_pk_hex,
            fp_btc_pk_list,
            pop,
            staking_time,
            staking_value,
            staking_tx,
            staking_output_idx,
            staking_tx_inclusion_proof,
            slashing_tx,
            delegator_slashing_sig,
            unbonding_time,
            unbonding_tx,
            unbonding_value,
            unbonding_slashing_tx,
            delegator_unbonding_slashing_sig,
        } => staking::handle_create_btc_delegation(
            deps,
            env,
            &info,
            btc_pk_hex,
            fp_btc_pk_list,
            pop,
            staking_time,
            staking_value,
            staking_tx,
            staking_output_idx,
            staking_tx_inclusion_proof,
            slashing_tx,
            delegator_slashing_sig,
            unbonding_time,
            unbonding_tx,
            unbonding_value,
            unbonding_slashing_tx,
            delegator_unbonding_slashing_sig,
        ),
        ExecuteMsg::AddCovenantSigs {
            pk_hex,
            staking_tx_hash_hex,
            slashing_tx_sigs,
            unbonding_tx_sig,
            slashing_unbonding_tx_sigs,
        } => staking::handle_add_covenant_sigs(
            deps,
            env,
            &info,
            pk_hex,
            staking_tx_hash_hex,
            slashing_tx_sigs,
            unbonding_tx_sig,
            slashing_unbonding_tx_sigs,
        ),
        ExecuteMsg::AddBtcDelegationInclusionProof {
            staking_tx_hash_hex,
            staking_tx_inclusion_proof,
        } => staking::handle_add_inclusion_proof(
            deps,
            env,
            staking_tx_hash_hex,
            staking_tx_inclusion_proof,
        ),
        ExecuteMsg::BtcUndelegate {
            staking_tx_hash_hex,
            stake_spending_tx,
            stake_spending_tx_inclusion_proof,
        } => staking::handle_btc_undelegate(
            deps,
            env,
            staking_tx_hash_hex,
            stake_spending_tx,
            stake_spending_tx_inclusion_proof,
        ),
        ExecuteMsg::SelectiveSlashingEvidence {
            staking_tx_hash_hex,
            recovered_fp_btc_sk_hex,
        } => staking::handle_selective_slashing_evidence(
            deps,
            env,
            staking_tx_hash_hex,
            recovered_fp_btc_sk_hex,
        ),
        ExecuteMsg::JailFinalityProvider { fp_btc_pk_hex } => {
            staking::handle_jail_finality_provider(deps, env, &info, fp_btc_pk_hex)
        }
        ExecuteMsg::UnjailFinalityProvider { fp_btc_pk_hex } => {
            staking::handle_unjail_finality_provider(deps, env, &info, fp_btc_pk_hex)
        }
        ExecuteMsg::BtcRollBack {
            from_height,
            to_height,
        } => staking::handle_btc_rollback(deps, &info, from_height, to_height),
    }
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn sudo(mut deps: DepsMut, env: Env, msg: SudoMsg) -> Result<Response, ContractError> {
    match msg {
        SudoMsg::BeginBlock {} => power_dist::handle_begin_block(&mut deps, &env),
        SudoMsg::EndBlock {} => power_dist::handle_end_block(&mut deps, &env),
    }
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> Result<QueryResponse, ContractError> {
    match msg {
        QueryMsg::Config {} => Ok(to_json_binary(&queries::config(deps)?)?),
        QueryMsg::Params {} => Ok(to_json_binary(&queries::params(deps)?)?),
        QueryMsg::ParamsByVersion { version } => Ok(to_json_binary(&queries::params_by_version(
            deps, version,
        )?)?),
        QueryMsg::ParamsByBtcHeight { btc_height } => Ok(to_json_binary(
            &queries::params_by_btc_height(deps, btc_height)?,
        )?),
        QueryMsg::Admin {} => to_json_binary(&ADMIN.query_admin(deps)?).map_err(Into::into),
        QueryMsg::FinalityProvider { btc_pk_hex } => Ok(to_json_binary(
            &queries::finality_provider(deps, btc_pk_hex)?,
        )?),
        QueryMsg::FinalityProviders { start_after, limit } => Ok(to_json_binary(
            &queries::finality_providers(deps, start_after, limit)?,
        )?),
        QueryMsg::Delegation {
            staking_tx_hash_hex,
        } => Ok(to_json_binary(&queries::delegation(
            deps,
            staking_tx_hash_hex,
        )?)?),
        QueryMsg::Delegations {
            start_after,
            limit,
            active,
        } => Ok(to_json_binary(&queries::delegations(
            deps,
            start_after,
            limit,
            active,
        )?)?),
        QueryMsg::DelegationsByFp {
            btc_pk_hex,
            start_after,
            limit,
        } => Ok(to_json_binary(&queries::delegations_by_fp(
            deps,
            btc_pk_hex,
            start_after,
            limit,
        )?)?),
        QueryMsg::VotingPower { btc_pk_hex, height } => Ok(to_json_binary(
            &queries::voting_power(deps, btc_pk_hex, height)?,
        )?),
        QueryMsg::VotingPowerTable { height } => {
            Ok(to_json_binary(&queries::voting_power_table(deps, height)?)?)
        }
        QueryMsg::PendingEvents { btc_height } => {
            Ok(to_json_binary(&queries::pending_events(deps, btc_height)?)?)
        }
        QueryMsg::LargestBtcReorg {} => Ok(to_json_binary(&queries::largest_btc_reorg(deps)?)?),
        QueryMsg::ActivatedHeight {} => Ok(to_json_binary(&queries::activated_height(deps)?)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cosmwasm_std::testing::{message_info, mock_dependencies, mock_env};
    use cosmwasm_std::{Binary, Decimal};

    use babylon_apis::btc_staking_api::BTCDelegationStatus;
    use test_utils::datagen::{schnorr_sign_tx, StakingTestData};

    use crate::test_utils::{
        activate_delegation, covenant_sigs_msg, create_delegation_msg, delegation_status,
        instantiate_msg, mock_env_height, setup, test_params, MockBtcChain, CONFIRMATION_DEPTH,
        CREATOR, FP_OPERATOR, INIT_ADMIN, STAKER,
    };

    #[test]
    fn happy_path_delegation_becomes_active() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        // staking tx included at BTC height 10; tip at 30, so depth 20 >= k=6
        let proof = chain.mine_staking_block(&data, 3, 10, 10);
        let mut deps = setup(&data, &chain);

        let staker = deps.api.addr_make(STAKER);
        execute(
            deps.as_mut(),
            mock_env(),
            message_info(&staker, &[]),
            create_delegation_msg(&data, &staker, Some(proof)),
        )
        .unwrap();

        // no covenant quorum yet
        let del = queries::delegation(deps.as_ref(), data.staking_tx_hash_hex()).unwrap();
        assert_eq!(del.start_height, 10);
        assert_eq!(del.end_height, 10 + data.staking_time as u32);
        assert_eq!(delegation_status(&deps, &data, 30), BTCDelegationStatus::Pending);

        // three covenant signature sets reach the quorum
        for i in 0..3 {
            let __info = message_info(&deps.api.addr_make(CREATOR), &[]);
            execute(
                deps.as_mut(),
                mock_env(),
                __info,
                covenant_sigs_msg(&data, i),
            )
            .unwrap();
        }
        assert_eq!(delegation_status(&deps, &data, 30), BTCDelegationStatus::Active);

        // the power table of the next block includes the FP with the stake
        sudo(deps.as_mut(), mock_env(), SudoMsg::BeginBlock {}).unwrap();
        let power =
            queries::voting_power(deps.as_ref(), data.fp_pk_hex(0), mock_env().block.height)
                .unwrap();
        assert_eq!(power.power, 200_000_000);
        let table =
            queries::voting_power_table(deps.as_ref(), mock_env().block.height).unwrap();
        assert_eq!(table.fps.len(), 1);
        assert_eq!(table.fps[0].power, 200_000_000);

        let activated = queries::activated_height(deps.as_ref()).unwrap();
        assert_eq!(activated.height, Some(mock_env().block.height));
    }

    #[test]
    fn pre_approval_flow_activates_on_inclusion_proof() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        let proof = chain.mine_staking_block(&data, 3, 10, 10);
        let mut deps = setup(&data, &chain);

        // created without an inclusion proof
        let staker = deps.api.addr_make(STAKER);
        execute(
            deps.as_mut(),
            mock_env(),
            message_info(&staker, &[]),
            create_delegation_msg(&data, &staker, None),
        )
        .unwrap();
        assert_eq!(delegation_status(&deps, &data, 30), BTCDelegationStatus::Pending);

        // covenant quorum moves it to VERIFIED; no voting power yet
        for i in 0..3 {
            let __info = message_info(&deps.api.addr_make(CREATOR), &[]);
            execute(
                deps.as_mut(),
                mock_env(),
                __info,
                covenant_sigs_msg(&data, i),
            )
            .unwrap();
        }
        assert_eq!(delegation_status(&deps, &data, 30), BTCDelegationStatus::Verified);
        sudo(deps.as_mut(), mock_env(), SudoMsg::BeginBlock {}).unwrap();
        let power =
            queries::voting_power(deps.as_ref(), data.fp_pk_hex(0), mock_env().block.height)
                .unwrap();
        assert_eq!(power.power, 0);

        // the inclusion proof activates the delegation
        let __info = message_info(&deps.api.addr_make(CREATOR), &[]);
        execute(
            deps.as_mut(),
            mock_env(),
            __info,
            ExecuteMsg::AddBtcDelegationInclusionProof {
                staking_tx_hash_hex: data.staking_tx_hash_hex(),
                staking_tx_inclusion_proof: proof,
            },
        )
        .unwrap();
        assert_eq!(delegation_status(&deps, &data, 30), BTCDelegationStatus::Active);

        let height = mock_env().block.height + 1;
        sudo(deps.as_mut(), mock_env_height(height), SudoMsg::BeginBlock {}).unwrap();
        let power = queries::voting_power(deps.as_ref(), data.fp_pk_hex(0), height).unwrap();
        assert_eq!(power.power, 200_000_000);
    }

    #[test]
    fn undelegation_drops_power() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        let mut deps = setup(&data, &chain);
        activate_delegation(&mut deps, &data, &mut chain);

        // the staker signs the pre-signed unbonding tx and spends the stake
        let mut spend_tx = data.unbonding_tx.clone();
        let sig = schnorr_sign_tx(
            &data.staker_sk,
            &data.unbonding_tx,
            &data.staking_output(),
            &data.script_paths.unbonding_path_script,
        );
        spend_tx.input[0].witness.push(sig.to_bytes());

        // the spend is mined k-deep (the witness does not change the txid)
        let spend_proof = chain.mine_spend_block(&spend_tx, 2, 8, 20);
        chain.install(&mut deps);

        let __info = message_info(&deps.api.addr_make(CREATOR), &[]);
        execute(
            deps.as_mut(),
            mock_env(),
            __info,
            ExecuteMsg::BtcUndelegate {
                staking_tx_hash_hex: data.staking_tx_hash_hex(),
                stake_spending_tx: Binary::new(bitcoin::consensus::serialize(&spend_tx)),
                stake_spending_tx_inclusion_proof: Some(spend_proof),
            },
        )
        .unwrap();
        assert_eq!(
            delegation_status(&deps, &data, 30),
            BTCDelegationStatus::Unbonded
        );

        // power is gone at the next block
        let height = mock_env().block.height + 1;
        sudo(deps.as_mut(), mock_env_height(height), SudoMsg::BeginBlock {}).unwrap();
        let power = queries::voting_power(deps.as_ref(), data.fp_pk_hex(0), height).unwrap();
        assert_eq!(power.power, 0);
    }

    #[test]
    fn undelegation_rejects_foreign_spending_tx() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        let mut deps = setup(&data, &chain);
        activate_delegation(&mut deps, &data, &mut chain);

        // an unbonding tx without the staker's signature in the witness
        let __info = message_info(&deps.api.addr_make(CREATOR), &[]);
        let err = execute(
            deps.as_mut(),
            mock_env(),
            __info,
            ExecuteMsg::BtcUndelegate {
                staking_tx_hash_hex: data.staking_tx_hash_hex(),
                stake_spending_tx: Binary::new(bitcoin::consensus::serialize(&data.unbonding_tx)),
                stake_spending_tx_inclusion_proof: None,
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            ContractError::BtcStaking(babylon_btcstaking::error::Error::NoStakerSigInWitness {})
        );
    }

    #[test]
    fn expiry_event_fires_during_replay() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        let mut deps = setup(&data, &chain);
        activate_delegation(&mut deps, &data, &mut chain);

        let end_height = 10 + data.staking_time as u32;
        let expiry_height = end_height - CONFIRMATION_DEPTH;

        // the scheduled retirement event is still queued
        let pending = queries::pending_events(deps.as_ref(), expiry_height).unwrap();
        assert_eq!(pending.events.len(), 1);

        // advance the BTC tip to the scheduled height and process a block
        chain.tip_height = expiry_height;
        chain.install(&mut deps);
        let height = mock_env().block.height + 1;
        sudo(deps.as_mut(), mock_env_height(height), SudoMsg::BeginBlock {}).unwrap();

        let power = queries::voting_power(deps.as_ref(), data.fp_pk_hex(0), height).unwrap();
        assert_eq!(power.power, 0);
        // the queue at that height is drained
        let pending = queries::pending_events(deps.as_ref(), expiry_height).unwrap();
        assert!(pending.events.is_empty());
    }

    #[test]
    #[should_panic(expected = "halting")]
    fn reorg_at_confirmation_depth_halts() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let chain = MockBtcChain::with_tip(30);
        let mut deps = setup(&data, &chain);

        let lc = crate::test_utils::light_client_addr(&deps);
        execute(
            deps.as_mut(),
            mock_env(),
            message_info(&lc, &[]),
            ExecuteMsg::BtcRollBack {
                from_height: 100,
                to_height: 100 - CONFIRMATION_DEPTH,
            },
        )
        .unwrap();
        let reorg = queries::largest_btc_reorg(deps.as_ref()).unwrap();
        assert_eq!(reorg.depth, CONFIRMATION_DEPTH);

        sudo(deps.as_mut(), mock_env(), SudoMsg::BeginBlock {}).unwrap();
    }

    #[test]
    fn reorg_below_confirmation_depth_is_tolerated() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let chain = MockBtcChain::with_tip(30);
        let mut deps = setup(&data, &chain);

        let lc = crate::test_utils::light_client_addr(&deps);
        // two roll-backs; the stored depth is the monotone max
        for (from, to) in [(100, 97), (200, 200 - (CONFIRMATION_DEPTH - 1))] {
            execute(
                deps.as_mut(),
                mock_env(),
                message_info(&lc, &[]),
                ExecuteMsg::BtcRollBack {
                    from_height: from,
                    to_height: to,
                },
            )
            .unwrap();
        }
        let reorg = queries::largest_btc_reorg(deps.as_ref()).unwrap();
        assert_eq!(reorg.depth, CONFIRMATION_DEPTH - 1);

        sudo(deps.as_mut(), mock_env(), SudoMsg::BeginBlock {}).unwrap();
    }

    #[test]
    fn rollback_restricted_to_light_client() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let chain = MockBtcChain::with_tip(30);
        let mut deps = setup(&data, &chain);

        let __info = message_info(&deps.api.addr_make("other"), &[]);
        let err = execute(
            deps.as_mut(),
            mock_env(),
            __info,
            ExecuteMsg::BtcRollBack {
                from_height: 100,
                to_height: 90,
            },
        )
        .unwrap_err();
        assert_eq!(err, ContractError::Unauthorized);
    }

    #[test]
    fn forged_proof_index_is_rejected() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        // real index 3 in a block of 10 txs; branch depth 4
        let mut proof = chain.mine_staking_block(&data, 3, 10, 10);
        let mut deps = setup(&data, &chain);

        let depth = proof.branch.len();
        proof.index += 1 << depth;

        let staker = deps.api.addr_make(STAKER);
        let err = execute(
            deps.as_mut(),
            mock_env(),
            message_info(&staker, &[]),
            create_delegation_msg(&data, &staker, Some(proof)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ContractError::BtcError(babylon_bitcoin::error::Error::TxIndexOutOfRange {
                index: 3 + (1 << depth),
                depth,
            })
        );
    }

    #[test]
    fn insufficient_confirmation_depth_is_rejected() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(14);
        // depth 14 - 10 = 4 < k = 6
        let proof = chain.mine_staking_block(&data, 3, 10, 10);
        let mut deps = setup(&data, &chain);

        let staker = deps.api.addr_make(STAKER);
        let err = execute(
            deps.as_mut(),
            mock_env(),
            message_info(&staker, &[]),
            create_delegation_msg(&data, &staker, Some(proof)),
        )
        .unwrap_err();
        assert_eq!(err, ContractError::InsufficientConfirmationDepth(4, 6));
    }

    #[test]
    fn duplicate_delegation_is_rejected() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        let proof = chain.mine_staking_block(&data, 3, 10, 10);
        let mut deps = setup(&data, &chain);

        let staker = deps.api.addr_make(STAKER);
        execute(
            deps.as_mut(),
            mock_env(),
            message_info(&staker, &[]),
            create_delegation_msg(&data, &staker, Some(proof.clone())),
        )
        .unwrap();
        let err = execute(
            deps.as_mut(),
            mock_env(),
            message_info(&staker, &[]),
            create_delegation_msg(&data, &staker, Some(proof)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ContractError::DelegationAlreadyExists(data.staking_tx_hash_hex())
        );
    }

    #[test]
    fn delegation_to_unknown_fp_is_rejected() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        let proof = chain.mine_staking_block(&data, 3, 10, 10);

        // instantiate without registering any FP
        let mut deps = mock_dependencies();
        chain.install(&mut deps);
        let imsg = instantiate_msg(&deps, test_params(&data));
        let __info = message_info(&deps.api.addr_make(CREATOR), &[]);
        instantiate(
            deps.as_mut(),
            mock_env(),
            __info,
            imsg,
        )
        .unwrap();

        let staker = deps.api.addr_make(STAKER);
        let err = execute(
            deps.as_mut(),
            mock_env(),
            message_info(&staker, &[]),
            create_delegation_msg(&data, &staker, Some(proof)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ContractError::FinalityProviderNotFound(data.fp_pk_hex(0))
        );
    }

    #[test]
    fn covenant_sigs_are_idempotent_and_membership_checked() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        let proof = chain.mine_staking_block(&data, 3, 10, 10);
        let mut deps = setup(&data, &chain);

        let staker = deps.api.addr_make(STAKER);
        execute(
            deps.as_mut(),
            mock_env(),
            message_info(&staker, &[]),
            create_delegation_msg(&data, &staker, Some(proof)),
        )
        .unwrap();

        let sender = message_info(&deps.api.addr_make(CREATOR), &[]);
        // a key outside the committee is rejected
        let mut foreign = covenant_sigs_msg(&data, 0);
        if let ExecuteMsg::AddCovenantSigs { pk_hex, .. } = &mut foreign {
            *pk_hex = "ff".repeat(32);
        }
        let err = execute(deps.as_mut(), mock_env(), sender.clone(), foreign).unwrap_err();
        assert_eq!(err, ContractError::NotInCovenantCommittee("ff".repeat(32)));

        // the same member twice counts once
        execute(
            deps.as_mut(),
            mock_env(),
            sender.clone(),
            covenant_sigs_msg(&data, 0),
        )
        .unwrap();
        execute(
            deps.as_mut(),
            mock_env(),
            sender.clone(),
            covenant_sigs_msg(&data, 0),
        )
        .unwrap();
        let del = queries::delegation(deps.as_ref(), data.staking_tx_hash_hex()).unwrap();
        assert_eq!(del.covenant_sigs.len(), 1);
        assert_eq!(delegation_status(&deps, &data, 30), BTCDelegationStatus::Pending);

        // two more distinct members reach the quorum of 3
        execute(
            deps.as_mut(),
            mock_env(),
            sender.clone(),
            covenant_sigs_msg(&data, 1),
        )
        .unwrap();
        execute(deps.as_mut(), mock_env(), sender, covenant_sigs_msg(&data, 2)).unwrap();
        assert_eq!(delegation_status(&deps, &data, 30), BTCDelegationStatus::Active);
    }

    #[test]
    fn selective_slashing_zeroes_power() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        let mut deps = setup(&data, &chain);
        activate_delegation(&mut deps, &data, &mut chain);

        let sk_hex = hex::encode(data.fp_sks[0].to_bytes());
        let __info = message_info(&deps.api.addr_make(CREATOR), &[]);
        let res = execute(
            deps.as_mut(),
            mock_env(),
            __info,
            ExecuteMsg::SelectiveSlashingEvidence {
                staking_tx_hash_hex: data.staking_tx_hash_hex(),
                recovered_fp_btc_sk_hex: sk_hex,
            },
        )
        .unwrap();
        assert!(res
            .events
            .iter()
            .any(|ev| ev.ty == "slashed_finality_provider"));

        let fp = queries::finality_provider(deps.as_ref(), data.fp_pk_hex(0)).unwrap();
        assert!(fp.is_slashed());

        // the slashing event zeroes the power at the next block
        let height = mock_env().block.height + 1;
        sudo(deps.as_mut(), mock_env_height(height), SudoMsg::BeginBlock {}).unwrap();
        let power = queries::voting_power(deps.as_ref(), data.fp_pk_hex(0), height).unwrap();
        assert_eq!(power.power, 0);

        // a slashed FP cannot be jailed
        let admin = deps.api.addr_make(INIT_ADMIN);
        let err = execute(
            deps.as_mut(),
            mock_env(),
            message_info(&admin, &[]),
            ExecuteMsg::JailFinalityProvider {
                fp_btc_pk_hex: data.fp_pk_hex(0),
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            ContractError::FinalityProviderAlreadySlashed(data.fp_pk_hex(0))
        );
    }

    #[test]
    fn selective_slashing_rejects_unrelated_key() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        let mut deps = setup(&data, &chain);
        activate_delegation(&mut deps, &data, &mut chain);

        // the covenant member's key is not an FP of this delegation
        let sk_hex = hex::encode(data.covenant_sks[0].to_bytes());
        let __info = message_info(&deps.api.addr_make(CREATOR), &[]);
        let err = execute(
            deps.as_mut(),
            mock_env(),
            __info,
            ExecuteMsg::SelectiveSlashingEvidence {
                staking_tx_hash_hex: data.staking_tx_hash_hex(),
                recovered_fp_btc_sk_hex: sk_hex,
            },
        )
        .unwrap_err();
        assert_eq!(err, ContractError::EvidenceFpMismatch {});
    }

    #[test]
    fn jailing_toggles_power() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        let mut deps = setup(&data, &chain);
        activate_delegation(&mut deps, &data, &mut chain);

        let admin = deps.api.addr_make(INIT_ADMIN);
        execute(
            deps.as_mut(),
            mock_env(),
            message_info(&admin, &[]),
            ExecuteMsg::JailFinalityProvider {
                fp_btc_pk_hex: data.fp_pk_hex(0),
            },
        )
        .unwrap();
        let height = mock_env().block.height + 1;
        sudo(deps.as_mut(), mock_env_height(height), SudoMsg::BeginBlock {}).unwrap();
        let power = queries::voting_power(deps.as_ref(), data.fp_pk_hex(0), height).unwrap();
        assert_eq!(power.power, 0);

        execute(
            deps.as_mut(),
            mock_env(),
            message_info(&admin, &[]),
            ExecuteMsg::UnjailFinalityProvider {
                fp_btc_pk_hex: data.fp_pk_hex(0),
            },
        )
        .unwrap();
        let height = height + 1;
        sudo(deps.as_mut(), mock_env_height(height), SudoMsg::BeginBlock {}).unwrap();
        let power = queries::voting_power(deps.as_ref(), data.fp_pk_hex(0), height).unwrap();
        assert_eq!(power.power, 200_000_000);
    }

    #[test]
    fn commission_edit_rules() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let chain = MockBtcChain::with_tip(30);
        let mut deps = setup(&data, &chain);

        let fp_op = deps.api.addr_make(&format!("{FP_OPERATOR}0"));

        // within the 24h cooldown of creation
        let err = execute(
            deps.as_mut(),
            mock_env(),
            message_info(&fp_op, &[]),
            ExecuteMsg::EditFinalityProvider {
                btc_pk_hex: data.fp_pk_hex(0),
                description: None,
                commission: Some(Decimal::percent(6)),
            },
        )
        .unwrap_err();
        assert_eq!(err, ContractError::CommissionUpdateCooldown {});

        let mut later = mock_env();
        later.block.time = later.block.time.plus_seconds(24 * 60 * 60 + 1);

        // a change beyond the max change rate (1%)
        let err = execute(
            deps.as_mut(),
            later.clone(),
            message_info(&fp_op, &[]),
            ExecuteMsg::EditFinalityProvider {
                btc_pk_hex: data.fp_pk_hex(0),
                description: None,
                commission: Some(Decimal::percent(7)),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::CommissionChangeTooLarge(_)));

        // only the registered address may edit
        let __info = message_info(&deps.api.addr_make("other"), &[]);
        let err = execute(
            deps.as_mut(),
            later.clone(),
            __info,
            ExecuteMsg::EditFinalityProvider {
                btc_pk_hex: data.fp_pk_hex(0),
                description: None,
                commission: Some(Decimal::percent(6)),
            },
        )
        .unwrap_err();
        assert_eq!(err, ContractError::Unauthorized);

        // a +1% edit after the cooldown goes through
        execute(
            deps.as_mut(),
            later,
            message_info(&fp_op, &[]),
            ExecuteMsg::EditFinalityProvider {
                btc_pk_hex: data.fp_pk_hex(0),
                description: None,
                commission: Some(Decimal::percent(6)),
            },
        )
        .unwrap();
        let fp = queries::finality_provider(deps.as_ref(), data.fp_pk_hex(0)).unwrap();
        assert_eq!(fp.commission, Decimal::percent(6));
    }

    #[test]
    fn update_params_is_admin_gated_and_versioned() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let chain = MockBtcChain::with_tip(30);
        let mut deps = setup(&data, &chain);

        let mut new_params = test_params(&data);
        new_params.btc_activation_height = 100;

        let __info = message_info(&deps.api.addr_make("other"), &[]);
        let err = execute(
            deps.as_mut(),
            mock_env(),
            __info,
            ExecuteMsg::UpdateParams {
                params: new_params.clone(),
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            ContractError::Admin(cw_controllers::AdminError::NotAdmin {})
        );

        let admin = deps.api.addr_make(INIT_ADMIN);
        execute(
            deps.as_mut(),
            mock_env(),
            message_info(&admin, &[]),
            ExecuteMsg::UpdateParams {
                params: new_params.clone(),
            },
        )
        .unwrap();

        // version 1 is live and resolvable by BTC height
        let p = queries::params_by_version(deps.as_ref(), 1).unwrap();
        assert_eq!(p.btc_activation_height, 100);
        let by_height = queries::params_by_btc_height(deps.as_ref(), 99).unwrap();
        assert_eq!(by_height.version, 0);
        let by_height = queries::params_by_btc_height(deps.as_ref(), 100).unwrap();
        assert_eq!(by_height.version, 1);
    }

    #[test]
    fn delegations_by_fp_pagination() {
        let mut rng = rand::thread_rng();
        let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
        let mut chain = MockBtcChain::with_tip(30);
        let mut deps = setup(&data, &chain);
        activate_delegation(&mut deps, &data, &mut chain);

        let res =
            queries::delegations_by_fp(deps.as_ref(), data.fp_pk_hex(0), None, None).unwrap();
        assert_eq!(res.hashes, vec![data.staking_tx_hash_hex()]);

        let err = queries::delegations_by_fp(deps.as_ref(), "ab".repeat(32), None, None)
            .unwrap_err();
        assert!(matches!(err, ContractError::FinalityProviderNotFound(_)));
    }
}
