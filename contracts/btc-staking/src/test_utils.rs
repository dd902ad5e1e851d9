//! Shared fixtures for contract tests: a mock BTC light client wired into
//! the querier, staking params derived from generated transaction sets, and
//! message builders.

use bitcoin::consensus::serialize;
use bitcoin::Transaction;
use cosmwasm_std::testing::{MockApi, MockQuerier, MockStorage};
use cosmwasm_std::{
    from_json, to_json_binary, Addr, Binary, ContractResult, Decimal, OwnedDeps, SystemError,
    SystemResult, WasmQuery,
};

use babylon_apis::btc_light_client_api::{BtcHeaderResponse, BtcLightClientQueryMsg};
use babylon_apis::btc_staking_api::{
    CommissionRates, FinalityProviderDescription, InclusionProof, ProofOfPossessionBtc,
};
use babylon_bitcoin::chain_params::Network;
use test_utils::datagen::{
    build_btc_header, build_merkle_proof, filler_tx, pop_sign, StakingTestData,
};

use crate::msg::{ExecuteMsg, InstantiateMsg};
use crate::state::params::Params;

pub(crate) const CREATOR: &str = "creator";
pub(crate) const INIT_ADMIN: &str = "initial_admin";
pub(crate) const LIGHT_CLIENT: &str = "btc_light_client";
pub(crate) const STAKER: &str = "staker";
pub(crate) const FP_OPERATOR: &str = "fp_operator";

pub(crate) const CONFIRMATION_DEPTH: u32 = 6;

pub(crate) type TestDeps = OwnedDeps<MockStorage, MockApi, MockQuerier>;

/// A mock BTC chain the light client querier answers from
#[derive(Clone, Default)]
pub(crate) struct MockBtcChain {
    /// `(block_hash_hex, header_hex, height)`
    pub headers: Vec<(String, String, u32)>,
    pub tip_height: u32,
}

impl MockBtcChain {
    pub fn with_tip(tip_height: u32) -> Self {
        MockBtcChain {
            headers: vec![],
            tip_height,
        }
    }

    /// Installs this chain as the wasm querier of the mock light client
    pub fn install(&self, deps: &mut TestDeps) {
        let headers = self.headers.clone();
        let tip_height = self.tip_height;
        deps.querier.update_wasm(move |query| match query {
            WasmQuery::Smart { msg, .. } => {
                let query: BtcLightClientQueryMsg = match from_json(msg) {
                    Ok(q) => q,
                    Err(e) => {
                        return SystemResult::Err(SystemError::InvalidRequest {
                            error: e.to_string(),
                            request: msg.clone(),
                        })
                    }
                };
                match query {
                    BtcLightClientQueryMsg::BtcTipHeader {} => {
                        let resp = BtcHeaderResponse {
                            header_hex: String::new(),
                            hash_hex: String::new(),
                            height: tip_height,
                        };
                        SystemResult::Ok(ContractResult::Ok(to_json_binary(&resp).unwrap()))
                    }
                    BtcLightClientQueryMsg::BtcHeaderByHash { hash } => {
                        match headers.iter().find(|(h, _, _)| *h == hash) {
                            Some((hash_hex, header_hex, height)) => {
                                let resp = BtcHeaderResponse {
                                    header_hex: header_hex.clone(),
                                    hash_hex: hash_hex.clone(),
                                    height: *height,
                                };
                                SystemResult::Ok(ContractResult::Ok(
                                    to_json_binary(&resp).unwrap(),
                                ))
                            }
                            None => SystemResult::Ok(ContractResult::Err(format!(
                                "header {hash} not found"
                            ))),
                        }
                    }
                    BtcLightClientQueryMsg::BtcBaseHeader {} => {
                        SystemResult::Ok(ContractResult::Err("no base header".to_string()))
                    }
                }
            }
            _ => SystemResult::Err(SystemError::UnsupportedRequest {
                kind: "only smart queries are mocked".to_string(),
            }),
        });
    }

    /// Mines a block at `height` containing `data`'s staking tx at `index`
    /// among `num_txs` transactions, returning the inclusion proof
    pub fn mine_staking_block(
        &mut self,
        data: &StakingTestData,
        index: usize,
        num_txs: usize,
        height: u32,
    ) -> InclusionProof {
        let mut txs: Vec<Transaction> = (0..num_txs as u64).map(|i| filler_tx(i + 1)).collect();
        txs[index] = data.staking_tx.clone();
        let (root, branch) = build_merkle_proof(&txs, index);
        let header = build_btc_header(root);
        let hash_hex = header.block_hash().to_string();
        let header_hex = hex::encode(serialize(&header));
        self.headers.push((hash_hex.clone(), header_hex, height));
        InclusionProof {
            block_hash_hex: hash_hex,
            index: index as u32,
            branch: branch.into_iter().map(Binary::new).collect(),
        }
    }

    /// Mines a block containing the (signed) unbonding tx, for undelegation
    /// evidence
    pub fn mine_spend_block(
        &mut self,
        spending_tx: &Transaction,
        index: usize,
        num_txs: usize,
        height: u32,
    ) -> InclusionProof {
        let mut txs: Vec<Transaction> = (0..num_txs as u64).map(|i| filler_tx(i + 100)).collect();
        txs[index] = spending_tx.clone();
        let (root, branch) = build_merkle_proof(&txs, index);
        let header = build_btc_header(root);
        let hash_hex = header.block_hash().to_string();
        let header_hex = hex::encode(serialize(&header));
        self.headers.push((hash_hex.clone(), header_hex, height));
        InclusionProof {
            block_hash_hex: hash_hex,
            index: index as u32,
            branch: branch.into_iter().map(Binary::new).collect(),
        }
    }
}

/// Params matching a generated staking transaction set
pub(crate) fn test_params(data: &StakingTestData) -> Params {
    Params {
        covenant_pks: (0..data.covenant_pks.len())
            .map(|i| data.covenant_pk_hex(i))
            .collect(),
        covenant_quorum: data.covenant_quorum,
        btc_network: Network::Regtest,
        min_staking_value_sat: 10_000,
        max_staking_value_sat: 10_000_000_000,
        min_staking_time_blocks: 100,
        max_staking_time_blocks: 65_000,
        slashing_pk_script: hex::encode(data.slashing_pk_script.as_bytes()),
        min_slashing_tx_fee_sat: 1_000,
        slashing_rate: Decimal::percent(10),
        min_commission_rate: Decimal::percent(1),
        min_unbonding_time_blocks: 200,
        unbonding_fee_sat: data.unbonding_fee,
        max_multi_staked_fps: 3,
        max_staker_quorum: 10,
        max_staker_num: 20,
        allow_list_expiration_height: 0,
        btc_activation_height: 1,
    }
}

pub(crate) fn instantiate_msg(deps: &TestDeps, params: Params) -> InstantiateMsg {
    InstantiateMsg {
        btc_light_client: deps.api.addr_make(LIGHT_CLIENT).to_string(),
        btc_confirmation_depth: CONFIRMATION_DEPTH,
        btc_finality: None,
        coostaking: None,
        denom: Some("ubbn".to_string()),
        params: Some(params),
        admin: Some(deps.api.addr_make(INIT_ADMIN).to_string()),
        allowed_staking_tx_hashes: None,
    }
}

pub(crate) fn light_client_addr(deps: &TestDeps) -> Addr {
    deps.api.addr_make(LIGHT_CLIENT)
}

/// A CreateFinalityProvider message for `data.fp_sks[fp_idx]`, signed by the
/// operator address
pub(crate) fn create_fp_msg(data: &StakingTestData, fp_idx: usize, addr: &Addr) -> ExecuteMsg {
    ExecuteMsg::CreateFinalityProvider {
        description: FinalityProviderDescription {
            moniker: format!("fp{fp_idx}"),
            identity: format!("Finality Provider {fp_idx}"),
            website: "https://fp.example".to_string(),
            security_contact: "security@fp.example".to_string(),
            details: "details".to_string(),
        },
        commission: CommissionRates {
            rate: Decimal::percent(5),
            max_rate: Decimal::percent(20),
            max_change_rate: Decimal::percent(1),
        },
        btc_pk_hex: data.fp_pk_hex(fp_idx),
        pop: ProofOfPossessionBtc {
            btc_sig_type: ProofOfPossessionBtc::SIG_TYPE_BIP340,
            btc_sig: Binary::new(pop_sign(&data.fp_sks[fp_idx], addr.as_str())),
        },
        bsn_id: None,
    }
}

/// Same as [`create_fp_msg`] but registering the FP for a consumer chain
pub(crate) fn create_fp_msg_with_bsn(
    data: &StakingTestData,
    fp_idx: usize,
    addr: &Addr,
    bsn_id: &str,
) -> ExecuteMsg {
    match create_fp_msg(data, fp_idx, addr) {
        ExecuteMsg::CreateFinalityProvider {
            description,
            commission,
            btc_pk_hex,
            pop,
            ..
        } => ExecuteMsg::CreateFinalityProvider {
            description,
            commission,
            btc_pk_hex,
            pop,
            bsn_id: Some(bsn_id.to_string()),
        },
        _ => unreachable!(),
    }
}

/// A CreateBtcDelegation message for the generated transaction set, signed
/// by the staker address
pub(crate) fn create_delegation_msg(
    data: &StakingTestData,
    staker: &Addr,
    proof: Option<InclusionProof>,
) -> ExecuteMsg {
    ExecuteMsg::CreateBtcDelegation {
        btc_pk_hex: data.staker_pk_hex(),
        fp_btc_pk_list: (0..data.fp_pks.len()).map(|i| data.fp_pk_hex(i)).collect(),
        pop: ProofOfPossessionBtc {
            btc_sig_type: ProofOfPossessionBtc::SIG_TYPE_BIP340,
            btc_sig: Binary::new(pop_sign(&data.staker_sk, staker.as_str())),
        },
        staking_time: data.staking_time as u32,
        staking_value: data.staking_value,
        staking_tx: Binary::new(serialize(&data.staking_tx)),
        staking_output_idx: 0,
        staking_tx_inclusion_proof: proof,
        slashing_tx: Binary::new(serialize(&data.slashing_tx)),
        delegator_slashing_sig: Binary::new(vec![0x01; 64]),
        unbonding_time: data.unbonding_time as u32,
        unbonding_tx: Binary::new(serialize(&data.unbonding_tx)),
        unbonding_value: data.staking_value - data.unbonding_fee,
        unbonding_slashing_tx: Binary::new(serialize(&data.unbonding_slashing_tx)),
        delegator_unbonding_slashing_sig: Binary::new(vec![0x02; 64]),
    }
}

/// An AddCovenantSigs message of the `cov_idx`-th covenant member with
/// structurally valid (dummy) signatures
pub(crate) fn covenant_sigs_msg(data: &StakingTestData, cov_idx: usize) -> ExecuteMsg {
    let num_fps = data.fp_pks.len();
    ExecuteMsg::AddCovenantSigs {
        pk_hex: data.covenant_pk_hex(cov_idx),
        staking_tx_hash_hex: data.staking_tx_hash_hex(),
        slashing_tx_sigs: vec![Binary::new(vec![0x03; 65]); num_fps],
        unbonding_tx_sig: Binary::new(vec![0x04; 64]),
        slashing_unbonding_tx_sigs: vec![Binary::new(vec![0x05; 65]); num_fps],
    }
}

pub(crate) fn mock_env_height(height: u64) -> cosmwasm_std::Env {
    let mut env = cosmwasm_std::testing::mock_env();
    env.block.height = height;
    env
}

/// Instantiates the contract and registers all finality providers of `data`,
/// each with a distinct operator address (`fp_operator{i}`)
pub(crate) fn setup(data: &StakingTestData, chain: &MockBtcChain) -> TestDeps {
    setup_with_params(data, chain, test_params(data))
}

pub(crate) fn setup_with_params(
    data: &StakingTestData,
    chain: &MockBtcChain,
    params: Params,
) -> TestDeps {
    use cosmwasm_std::testing::{message_info, mock_dependencies, mock_env};

    let mut deps = mock_dependencies();
    chain.install(&mut deps);
    let imsg = instantiate_msg(&deps, params);
    let info = message_info(&deps.api.addr_make(CREATOR), &[]);
    crate::contract::instantiate(deps.as_mut(), mock_env(), info, imsg).unwrap();
    for i in 0..data.fp_pks.len() {
        let fp_op = deps.api.addr_make(&format!("{FP_OPERATOR}{i}"));
        crate::contract::execute(
            deps.as_mut(),
            mock_env(),
            message_info(&fp_op, &[]),
            create_fp_msg(data, i, &fp_op),
        )
        .unwrap();
    }
    deps
}

/// Runs a delegation through proof, covenant quorum and one BeginBlock,
/// leaving it ACTIVE with power recorded at the mock height
pub(crate) fn activate_delegation(
    deps: &mut TestDeps,
    data: &StakingTestData,
    chain: &mut MockBtcChain,
) {
    use cosmwasm_std::testing::{message_info, mock_env};

    let proof = chain.mine_staking_block(data, 3, 10, 10);
    chain.install(deps);
    let staker = deps.api.addr_make(STAKER);
    crate::contract::execute(
        deps.as_mut(),
        mock_env(),
        message_info(&staker, &[]),
        create_delegation_msg(data, &staker, Some(proof)),
    )
    .unwrap();
    for i in 0..data.covenant_quorum as usize {
        let __info = message_info(&deps.api.addr_make(CREATOR), &[]);
        crate::contract::execute(
            deps.as_mut(),
            mock_env(),
            __info,
            covenant_sigs_msg(data, i),
        )
        .unwrap();
    }
    crate::contract::sudo(deps.as_mut(), mock_env(), crate::msg::SudoMsg::BeginBlock {}).unwrap();
}

/// The status of `data`'s delegation at the given BTC tip
pub(crate) fn delegation_status(
    deps: &TestDeps,
    data: &StakingTestData,
    tip: u32,
) -> babylon_apis::btc_staking_api::BTCDelegationStatus {
    let del = crate::queries::delegation(deps.as_ref(), data.staking_tx_hash_hex()).unwrap();
    del.get_status(tip, data.covenant_quorum)
}
