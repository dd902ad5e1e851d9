//! Multi-contract tests over cw-multi-test: the staking contract against a
//! real (mock) light client contract, and the coostaking contract against a
//! reward-gauge sink, with bank balances in the loop.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{
    coin, coins, to_json_binary, Decimal, Deps, DepsMut, Empty, Env, MessageInfo, QueryResponse,
    Response, StdError, StdResult, Uint128,
};
use cw_multi_test::{App, Contract, ContractWrapper, Executor};
use cw_storage_plus::{Item, Map};

use babylon_apis::btc_light_client_api::{BtcHeaderResponse, BtcLightClientQueryMsg};
use test_utils::datagen::StakingTestData;

use crate::msg::{QueryMsg, SudoMsg, VotingPowerResponse};
use crate::test_utils::{
    covenant_sigs_msg, create_delegation_msg, create_fp_msg, test_params, MockBtcChain,
    CONFIRMATION_DEPTH,
};

const DENOM: &str = "ubbn";

/// A minimal BTC light client contract: headers and a movable tip, answering
/// the query API the staking contract consumes
mod mock_lc {
    use super::*;

    pub const TIP: Item<u32> = Item::new("tip");
    /// hash -> (header_hex, height)
    pub const HEADERS: Map<&str, (String, u32)> = Map::new("headers");

    #[cw_serde]
    pub struct InstantiateMsg {
        pub tip_height: u32,
        pub headers: Vec<(String, String, u32)>,
    }

    #[cw_serde]
    pub enum ExecuteMsg {
        SetTip { height: u32 },
    }

    pub fn instantiate(
        deps: DepsMut,
        _env: Env,
        _info: MessageInfo,
        msg: InstantiateMsg,
    ) -> StdResult<Response> {
        TIP.save(deps.storage, &msg.tip_height)?;
        for (hash, header, height) in msg.headers {
            HEADERS.save(deps.storage, &hash, &(header, height))?;
        }
        Ok(Response::new())
    }

    pub fn execute(
        deps: DepsMut,
        _env: Env,
        _info: MessageInfo,
        msg: ExecuteMsg,
    ) -> StdResult<Response> {
        match msg {
            ExecuteMsg::SetTip { height } => {
                TIP.save(deps.storage, &height)?;
                Ok(Response::new())
            }
        }
    }

    pub fn query(deps: Deps, _env: Env, msg: BtcLightClientQueryMsg) -> StdResult<QueryResponse> {
        match msg {
            BtcLightClientQueryMsg::BtcTipHeader {} => to_json_binary(&BtcHeaderResponse {
                header_hex: String::new(),
                hash_hex: String::new(),
                height: TIP.load(deps.storage)?,
            }),
            BtcLightClientQueryMsg::BtcHeaderByHash { hash } => {
                let (header_hex, height) = HEADERS
                    .may_load(deps.storage, &hash)?
                    .ok_or_else(|| StdError::generic_err(format!("header {hash} not found")))?;
                to_json_binary(&BtcHeaderResponse {
                    header_hex,
                    hash_hex: hash,
                    height,
                })
            }
            BtcLightClientQueryMsg::BtcBaseHeader {} => {
                Err(StdError::generic_err("no base header"))
            }
        }
    }
}

/// A reward-gauge sink: accepts any incentive message and keeps the attached
/// funds on its balance
mod mock_incentive {
    use super::*;
    use babylon_apis::incentive_api::IncentiveExecuteMsg;

    #[cw_serde]
    pub struct InstantiateMsg {}

    pub fn instantiate(
        _deps: DepsMut,
        _env: Env,
        _info: MessageInfo,
        _msg: InstantiateMsg,
    ) -> StdResult<Response> {
        Ok(Response::new())
    }

    pub fn execute(
        _deps: DepsMut,
        _env: Env,
        _info: MessageInfo,
        _msg: IncentiveExecuteMsg,
    ) -> StdResult<Response> {
        Ok(Response::new())
    }

    pub fn query(_deps: Deps, _env: Env, _msg: Empty) -> StdResult<QueryResponse> {
        Err(StdError::generic_err("no queries"))
    }
}

fn contract_staking() -> Box<dyn Contract<Empty>> {
    Box::new(
        ContractWrapper::new(
            crate::contract::execute,
            crate::contract::instantiate,
            crate::contract::query,
        )
        .with_sudo(crate::contract::sudo),
    )
}

fn contract_coostaking() -> Box<dyn Contract<Empty>> {
    Box::new(
        ContractWrapper::new(
            btc_coostaking::contract::execute,
            btc_coostaking::contract::instantiate,
            btc_coostaking::contract::query,
        )
        .with_sudo(btc_coostaking::contract::sudo),
    )
}

fn contract_mock_lc() -> Box<dyn Contract<Empty>> {
    Box::new(ContractWrapper::new(
        mock_lc::execute,
        mock_lc::instantiate,
        mock_lc::query,
    ))
}

fn contract_mock_incentive() -> Box<dyn Contract<Empty>> {
    Box::new(ContractWrapper::new(
        mock_incentive::execute,
        mock_incentive::instantiate,
        mock_incentive::query,
    ))
}

#[test]
fn delegation_lifecycle_against_light_client_contract() {
    let mut rng = rand::thread_rng();
    let data = StakingTestData::with_fps(&mut rng, 1, 3, 3);
    let mut chain = MockBtcChain::with_tip(30);
    let proof = chain.mine_staking_block(&data, 3, 10, 10);

    let mut app = App::default();
    let owner = app.api().addr_make("owner");
    let staker = app.api().addr_make("staker");
    let fp_op = app.api().addr_make("fp_operator");

    let lc_code = app.store_code(contract_mock_lc());
    let lc_addr = app
        .instantiate_contract(
            lc_code,
            owner.clone(),
            &mock_lc::InstantiateMsg {
                tip_height: chain.tip_height,
                headers: chain.headers.clone(),
            },
            &[],
            "btc-light-client",
            None,
        )
        .unwrap();

    let staking_code = app.store_code(contract_staking());
    let staking_addr = app
        .instantiate_contract(
            staking_code,
            owner.clone(),
            &crate::msg::InstantiateMsg {
                btc_light_client: lc_addr.to_string(),
                btc_confirmation_depth: CONFIRMATION_DEPTH,
                btc_finality: None,
                coostaking: None,
                denom: Some(DENOM.to_string()),
                params: Some(test_params(&data)),
                admin: Some(owner.to_string()),
                allowed_staking_tx_hashes: None,
            },
            &[],
            "btc-staking",
            None,
        )
        .unwrap();

    // register the FP and the delegation; the inclusion proof resolves its
    // header through the light client contract
    app.execute_contract(
        fp_op.clone(),
        staking_addr.clone(),
        &create_fp_msg(&data, 0, &fp_op),
        &[],
    )
    .unwrap();
    app.execute_contract(
        staker.clone(),
        staking_addr.clone(),
        &create_delegation_msg(&data, &staker, Some(proof)),
        &[],
    )
    .unwrap();
    for i in 0..3 {
        app.execute_contract(
            owner.clone(),
            staking_addr.clone(),
            &covenant_sigs_msg(&data, i),
            &[],
        )
        .unwrap();
    }

    // BeginBlock picks the ACTIVE event up at the tip
    app.wasm_sudo(staking_addr.clone(), &SudoMsg::BeginBlock {})
        .unwrap();
    let height = app.block_info().height;
    let power: VotingPowerResponse = app
        .wrap()
        .query_wasm_smart(
            &staking_addr,
            &QueryMsg::VotingPower {
                btc_pk_hex: data.fp_pk_hex(0),
                height,
            },
        )
        .unwrap();
    assert_eq!(power.power, data.staking_value);

    // move the BTC tip to the scheduled expiry; the next block retires the
    // delegation
    let expiry = 10 + data.staking_time as u32 - CONFIRMATION_DEPTH;
    app.execute_contract(
        owner,
        lc_addr,
        &mock_lc::ExecuteMsg::SetTip { height: expiry },
        &[],
    )
    .unwrap();
    app.update_block(|block| block.height += 1);
    app.wasm_sudo(staking_addr.clone(), &SudoMsg::BeginBlock {})
        .unwrap();
    let height = app.block_info().height;
    let power: VotingPowerResponse = app
        .wrap()
        .query_wasm_smart(
            &staking_addr,
            &QueryMsg::VotingPower {
                btc_pk_hex: data.fp_pk_hex(0),
                height,
            },
        )
        .unwrap();
    assert_eq!(power.power, 0);
}

#[test]
fn coostaking_rewards_flow_through_bank_and_gauge() {
    let mut app = App::new(|router, api, storage| {
        router
            .bank
            .init_balance(
                storage,
                &api.addr_make("fee_router"),
                coins(1_000_000, DENOM),
            )
            .unwrap();
    });
    let owner = app.api().addr_make("owner");
    let fee_router = app.api().addr_make("fee_router");
    let staking_stub = app.api().addr_make("staking_stub");
    let alice = app.api().addr_make("alice");

    let incentive_code = app.store_code(contract_mock_incentive());
    let incentive_addr = app
        .instantiate_contract(
            incentive_code,
            owner.clone(),
            &mock_incentive::InstantiateMsg {},
            &[],
            "incentive",
            None,
        )
        .unwrap();

    let coostaking_code = app.store_code(contract_coostaking());
    let coostaking_addr = app
        .instantiate_contract(
            coostaking_code,
            owner.clone(),
            &btc_coostaking::msg::InstantiateMsg {
                staking: staking_stub.to_string(),
                epoching: None,
                incentive: incentive_addr.to_string(),
                denom: Some(DENOM.to_string()),
                params: Some(btc_coostaking::state::Params {
                    coostaking_portion: Decimal::percent(10),
                    score_ratio_btc_by_baby: Uint128::one(),
                }),
                admin: Some(owner.to_string()),
            },
            &[],
            "btc-coostaking",
            None,
        )
        .unwrap();

    // alice coostakes on both legs: score 1000
    app.execute_contract(
        staking_stub,
        coostaking_addr.clone(),
        &btc_coostaking::msg::ExecuteMsg::UpdateCoostakerSats {
            updates: vec![btc_coostaking::msg::CoostakerSatsUpdate {
                staker_addr: alice.to_string(),
                added_sat: 1_000,
                removed_sat: 0,
            }],
        },
        &[],
    )
    .unwrap();
    app.execute_contract(
        owner.clone(),
        coostaking_addr.clone(),
        &btc_coostaking::msg::ExecuteMsg::UpdateCoostakerBaby {
            staker_addr: alice.to_string(),
            active_baby: Uint128::new(1_000),
        },
        &[],
    )
    .unwrap();

    // the fee router forwards the coostaking portion; the sweep books the
    // balance delta on BeginBlock
    app.send_tokens(
        fee_router,
        coostaking_addr.clone(),
        &[coin(40_000, DENOM)],
    )
    .unwrap();
    app.wasm_sudo(
        coostaking_addr.clone(),
        &btc_coostaking::msg::SudoMsg::BeginBlock {},
    )
    .unwrap();

    // withdrawal settles the period and ships the rewards to alice's gauge
    app.execute_contract(
        alice.clone(),
        coostaking_addr.clone(),
        &btc_coostaking::msg::ExecuteMsg::WithdrawRewards {},
        &[],
    )
    .unwrap();
    let gauge_balance = app
        .wrap()
        .query_balance(&incentive_addr, DENOM)
        .unwrap();
    assert_eq!(gauge_balance.amount, Uint128::new(40_000));
    let pool_balance = app
        .wrap()
        .query_balance(&coostaking_addr, DENOM)
        .unwrap();
    assert_eq!(pool_balance.amount, Uint128::zero());

    // a second withdrawal has nothing left to ship
    app.execute_contract(
        alice,
        coostaking_addr,
        &btc_coostaking::msg::ExecuteMsg::WithdrawRewards {},
        &[],
    )
    .unwrap();
    let gauge_balance = app
        .wrap()
        .query_balance(&incentive_addr, DENOM)
        .unwrap();
    assert_eq!(gauge_balance.amount, Uint128::new(40_000));
}
