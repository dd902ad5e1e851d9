#[cfg(not(feature = "library"))]
use cosmwasm_std::entry_point;
use cosmwasm_std::{
    to_json_binary, Deps, DepsMut, Env, Event, MessageInfo, QueryResponse, Response,
};
use cw2::set_contract_version;
use cw_utils::{maybe_addr, nonpayable};

use crate::error::ContractError;
use crate::feemarket::{effective_block_gas, next_base_gas_price};
use crate::msg::{
    BaseGasPriceResponse, BlockGasResponse, ExecuteMsg, InstantiateMsg, QueryMsg, SudoMsg,
};
use crate::state::{
    ADMIN, BASE_GAS_PRICE, BLOCK_GAS, PARAMS, REFUNDABLE_GAS_USED, REFUNDABLE_GAS_WANTED,
};

pub const CONTRACT_NAME: &str = env!("CARGO_PKG_NAME");
pub const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    mut deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    nonpayable(&info)?;
    let api = deps.api;
    ADMIN.set(deps.branch(), maybe_addr(api, msg.admin)?)?;

    let params = msg.params.unwrap_or_default();
    params.validate()?;
    BASE_GAS_PRICE.save(deps.storage, &params.min_base_gas_price)?;
    BLOCK_GAS.save(deps.storage, &0)?;
    PARAMS.save(deps.storage, &params)?;

    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    Ok(Response::new().add_attribute("action", "instantiate"))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    _env: Env,
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
        ExecuteMsg::RegisterRefundableGas {
            gas_wanted,
            gas_used,
        } => {
            ADMIN.assert_admin(deps.as_ref(), &info.sender)?;
            let wanted = REFUNDABLE_GAS_WANTED.may_load(deps.storage)?.unwrap_or(0);
            let used = REFUNDABLE_GAS_USED.may_load(deps.storage)?.unwrap_or(0);
            REFUNDABLE_GAS_WANTED.save(deps.storage, &(wanted + gas_wanted))?;
            REFUNDABLE_GAS_USED.save(deps.storage, &(used + gas_used))?;
            Ok(Response::new().add_attribute("action", "register_refundable_gas"))
        }
    }
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn sudo(mut deps: DepsMut, env: Env, msg: SudoMsg) -> Result<Response, ContractError> {
    match msg {
        SudoMsg::BeginBlock {} => handle_begin_block(&mut deps, &env),
        SudoMsg::EndBlock {
            gas_wanted,
            gas_used,
        } => handle_end_block(&mut deps, &env, gas_wanted, gas_used),
    }
}

fn handle_begin_block(deps: &mut DepsMut, _env: &Env) -> Result<Response, ContractError> {
    let params = PARAMS.load(deps.storage)?;
    let current = BASE_GAS_PRICE.load(deps.storage)?;
    let block_gas = BLOCK_GAS.load(deps.storage)?;

    let next = next_base_gas_price(&params, current, block_gas);
    BASE_GAS_PRICE.save(deps.storage, &next)?;

    Ok(Response::new().add_event(
        Event::new("fee_market")
            .add_attribute("base_fee", next.to_string())
            .add_attribute("block_gas", block_gas.to_string())
            .add_attribute("denom", params.denom),
    ))
}

fn handle_end_block(
    deps: &mut DepsMut,
    env: &Env,
    gas_wanted: u64,
    gas_used: u64,
) -> Result<Response, ContractError> {
    let params = PARAMS.load(deps.storage)?;
    let refundable_wanted = REFUNDABLE_GAS_WANTED.may_load(deps.storage)?.unwrap_or(0);
    let refundable_used = REFUNDABLE_GAS_USED.may_load(deps.storage)?.unwrap_or(0);

    let block_gas = effective_block_gas(
        &params,
        gas_wanted,
        gas_used,
        refundable_wanted,
        refundable_used,
    )?;
    BLOCK_GAS.save(deps.storage, &block_gas)?;

    // transient counters die with the block that wrote them
    REFUNDABLE_GAS_WANTED.remove(deps.storage);
    REFUNDABLE_GAS_USED.remove(deps.storage);

    Ok(Response::new().add_event(
        Event::new("block_gas")
            .add_attribute("height", env.block.height.to_string())
            .add_attribute("amount", block_gas.to_string()),
    ))
}

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> Result<QueryResponse, ContractError> {
    match msg {
        QueryMsg::Params {} => Ok(to_json_binary(&PARAMS.load(deps.storage)?)?),
        QueryMsg::Admin {} => to_json_binary(&ADMIN.query_admin(deps)?).map_err(Into::into),
        QueryMsg::BaseGasPrice {} => Ok(to_json_binary(&BaseGasPriceResponse {
            base_gas_price: BASE_GAS_PRICE.load(deps.storage)?,
        })?),
        QueryMsg::BlockGas {} => Ok(to_json_binary(&BlockGasResponse {
            block_gas: BLOCK_GAS.load(deps.storage)?,
        })?),
    }
}
