#[cfg(not(feature = "library"))]
use cosmwasm_std::entry_point;
use cosmwasm_std::{
    to_json_binary, Coin, Deps, DepsMut, Env, Event, MessageInfo, QueryResponse, Response,
    Uint128, WasmMsg,
};
use cw2::set_contract_version;
use cw_utils::maybe_addr;

use babylon_apis::incentive_api::{IncentiveExecuteMsg, StakeholderType};

use crate::error::ContractError;
use crate::msg::{CoostakerSatsUpdate, ExecuteMsg, InstantiateMsg, QueryMsg, SudoMsg};
use crate::queries;
use crate::rewards;
use crate::state::{Config, ACCOUNTED_BALANCE, ADMIN, CONFIG, PARAMS};

pub const CONTRACT_NAME: &str = env!("CARGO_PKG_NAME");
pub const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    mut deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    cw_utils::nonpayable(&info)?;
    let api = deps.api;
    let denom = match msg.denom {
        Some(denom) => denom,
        None => deps.querier.query_bonded_denom()?,
    };
    let config = Config {
        denom,
        staking: api.addr_validate(&msg.staking)?,
        epoching: msg
            .epoching
            .map(|addr| api.addr_validate(&addr))
            .transpose()?,
        incentive: api.addr_validate(&msg.incentive)?,
    };
    CONFIG.save(deps.storage, &config)?;

    ADMIN.set(deps.branch(), maybe_addr(api, msg.admin)?)?;

    let params = msg.params.unwrap_or_default();
    params.validate()?;
    PARAMS.save(deps.storage, &params)?;

    rewards::initialize(deps.storage)?;
    ACCOUNTED_BALANCE.save(deps.storage, &Uint128::zero())?;

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
            ADMIN.assert_admin(deps.as_ref(), &info.sender)?;
            params.validate()?;
            PARAMS.save(deps.storage, &params)?;
            Ok(Response::new().add_attribute("action", "update_params"))
        }
        ExecuteMsg::UpdateCoostakerSats { updates } => {
            handle_update_coostaker_sats(deps, &info, updates)
        }
        ExecuteMsg::UpdateCoostakerBaby {
            staker_addr,
            active_baby,
        } => handle_update_coostaker_baby(deps, &info, staker_addr, active_baby),
        ExecuteMsg::AddRewards {} => handle_add_rewards(deps, &info),
        ExecuteMsg::WithdrawRewards {} => handle_withdraw_rewards(deps, env, &info),
    }
}

/// Ships pending rewards to a coostaker's reward gauge through the incentive
/// contract, adjusting the accounted bond-denom balance
fn ship_rewards(
    deps: &mut DepsMut,
    config: &Config,
    staker_addr: &str,
    pending: Vec<Coin>,
) -> Result<Option<WasmMsg>, ContractError> {
    if pending.is_empty() {
        return Ok(None);
    }
    let mut accounted = ACCOUNTED_BALANCE.load(deps.storage)?;
    for coin in &pending {
        if coin.denom == config.denom {
            accounted = accounted.saturating_sub(coin.amount);
        }
    }
    ACCOUNTED_BALANCE.save(deps.storage, &accounted)?;
    Ok(Some(WasmMsg::Execute {
        contract_addr: config.incentive.to_string(),
        msg: to_json_binary(&IncentiveExecuteMsg::AccumulateRewardGauge {
            stakeholder_type: StakeholderType::Coostaker,
            address: staker_addr.to_string(),
        })?,
        funds: pending,
    }))
}

fn handle_update_coostaker_sats(
    mut deps: DepsMut,
    info: &MessageInfo,
    updates: Vec<CoostakerSatsUpdate>,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if info.sender != config.staking {
        return Err(ContractError::Unauthorized);
    }
    let params = PARAMS.load(deps.storage)?;

    let mut res = Response::new().add_attribute("action", "update_coostaker_sats");
    for update in updates {
        let addr = deps.api.addr_validate(&update.staker_addr)?;
        let pending = rewards::withdraw_and_modify(
            deps.storage,
            &addr,
            params.score_ratio_btc_by_baby,
            |tracker| {
                tracker.active_sat = tracker
                    .active_sat
                    .saturating_add(update.added_sat)
                    .saturating_sub(update.removed_sat);
            },
        )?;
        if let Some(msg) = ship_rewards(&mut deps, &config, addr.as_str(), pending)? {
            res = res.add_message(msg);
        }
    }
    Ok(res)
}

fn handle_update_coostaker_baby(
    mut deps: DepsMut,
    info: &MessageInfo,
    staker_addr: String,
    active_baby: Uint128,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let authorized = match &config.epoching {
        Some(epoching) => info.sender == *epoching,
        None => ADMIN.is_admin(deps.as_ref(), &info.sender)?,
    };
    if !authorized {
        return Err(ContractError::Unauthorized);
    }
    let params = PARAMS.load(deps.storage)?;

    let addr = deps.api.addr_validate(&staker_addr)?;
    let pending = rewards::withdraw_and_modify(
        deps.storage,
        &addr,
        params.score_ratio_btc_by_baby,
        |tracker| {
            tracker.active_baby = active_baby;
        },
    )?;
    let mut res = Response::new().add_attribute("action", "update_coostaker_baby");
    if let Some(msg) = ship_rewards(&mut deps, &config, addr.as_str(), pending)? {
        res = res.add_message(msg);
    }
    Ok(res)
}

fn handle_add_rewards(deps: DepsMut, info: &MessageInfo) -> Result<Response, ContractError> {
    if info.funds.is_empty() {
        return Err(cw_utils::PaymentError::NoFunds {}.into());
    }
    let config = CONFIG.load(deps.storage)?;
    rewards::add_rewards(deps.storage, &info.funds)?;
    let mut accounted = ACCOUNTED_BALANCE.load(deps.storage)?;
    for coin in &info.funds {
        if coin.denom == config.denom {
            accounted += coin.amount;
        }
    }
    ACCOUNTED_BALANCE.save(deps.storage, &accounted)?;
    Ok(Response::new().add_attribute("action", "add_rewards"))
}

fn handle_withdraw_rewards(
    mut deps: DepsMut,
    _env: Env,
    info: &MessageInfo,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let params = PARAMS.load(deps.storage)?;
    if !crate::state::COOSTAKER_TRACKERS.has(deps.storage, &info.sender) {
        return Err(ContractError::TrackerNotFound(info.sender.to_string()));
    }
    // a withdrawal is a score-preserving modification
    let pending = rewards::withdraw_and_modify(
        deps.storage,
        &info.sender,
        params.score_ratio_btc_by_baby,
        |_| {},
    )?;
    let mut res = Response::new()
        .add_attribute("action", "withdraw_rewards")
        .add_attribute("coostaker", info.sender.to_string());
    if let Some(msg) = ship_rewards(&mut deps, &config, info.sender.as_str(), pending)? {
        res = res.add_message(msg);
    }
    Ok(res)
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn sudo(mut deps: DepsMut, env: Env, msg: SudoMsg) -> Result<Response, ContractError> {
    match msg {
        SudoMsg::BeginBlock {} => handle_begin_block(&mut deps, &env),
        SudoMsg::EndBlock {} => Ok(Response::new()),
    }
}

/// Books the bond-denom revenue that arrived since the last block into the
/// rewards pool. Revenue reaches the contract account from the fee router,
/// which applies the coostaking portion to the fee collector balance
fn handle_begin_block(deps: &mut DepsMut, env: &Env) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let balance = deps
        .querier
        .query_balance(env.contract.address.clone(), config.denom.clone())?;
    let accounted = ACCOUNTED_BALANCE.load(deps.storage)?;
    let delta = balance.amount.saturating_sub(accounted);
    if delta.is_zero() {
        return Ok(Response::new());
    }
    rewards::add_rewards(
        deps.storage,
        &[Coin {
            denom: config.denom.clone(),
            amount: delta,
        }],
    )?;
    ACCOUNTED_BALANCE.save(deps.storage, &balance.amount)?;
    Ok(Response::new().add_event(
        Event::new("coostaking_rewards_swept")
            .add_attribute("module", "btc_coostaking")
            .add_attribute("amount", delta.to_string())
            .add_attribute("denom", config.denom),
    ))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> Result<QueryResponse, ContractError> {
    match msg {
        QueryMsg::Config {} => Ok(to_json_binary(&queries::config(deps)?)?),
        QueryMsg::Params {} => Ok(to_json_binary(&queries::params(deps)?)?),
        QueryMsg::Admin {} => to_json_binary(&ADMIN.query_admin(deps)?).map_err(Into::into),
        QueryMsg::CurrentRewards {} => Ok(to_json_binary(&queries::current_rewards(deps)?)?),
        QueryMsg::HistoricalRewards { period } => Ok(to_json_binary(
            &queries::historical_rewards(deps, period)?,
        )?),
        QueryMsg::CoostakerTracker { address } => Ok(to_json_binary(&queries::coostaker_tracker(
            deps, address,
        )?)?),
        QueryMsg::PendingRewards { address } => Ok(to_json_binary(&queries::pending_rewards(
            deps, address,
        )?)?),
    }
}
