use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::Decimal;

use crate::state::Params;

#[cw_serde]
pub struct InstantiateMsg {
    pub params: Option<Params>,
    /// The authority allowed to report refundable gas (the host's refund
    /// decorator)
    pub admin: Option<String>,
}

#[cw_serde]
pub enum ExecuteMsg {
    /// Change the admin
    UpdateAdmin { admin: Option<String> },
    /// Replace the fee-market params. Restricted to the admin
    UpdateParams { params: Params },
    /// Track gas of a refundable transaction in the current block.
    /// Restricted to the admin. The counters are discarded at block end
    RegisterRefundableGas { gas_wanted: u64, gas_used: u64 },
}

#[cw_serde]
pub enum SudoMsg {
    /// Called by the host before the block's transactions: recomputes and
    /// emits the base fee from the previous block's tracked gas
    BeginBlock {},
    /// Called by the host after the block's transactions, with the block's
    /// gas totals. Persists the effective tracked gas minus refundables
    EndBlock { gas_wanted: u64, gas_used: u64 },
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(Params)]
    Params {},
    #[returns(cw_controllers::AdminResponse)]
    Admin {},
    #[returns(BaseGasPriceResponse)]
    BaseGasPrice {},
    #[returns(BlockGasResponse)]
    BlockGas {},
}

#[cw_serde]
pub struct BaseGasPriceResponse {
    pub base_gas_price: Decimal,
}

#[cw_serde]
pub struct BlockGasResponse {
    pub block_gas: u64,
}
