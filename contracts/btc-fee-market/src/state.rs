use cosmwasm_schema::cw_serde;
use cosmwasm_std::Decimal;
use cw_controllers::Admin;
use cw_storage_plus::Item;

use crate::error::ContractError;

pub(crate) const PARAMS: Item<Params> = Item::new("params");
/// Storage for admin (the host's refund decorator authority)
pub(crate) const ADMIN: Admin = Admin::new("admin");

/// Base gas price of the current block
pub(crate) const BASE_GAS_PRICE: Item<Decimal> = Item::new("base_gas_price");
/// Effective tracked gas of the previous block
pub(crate) const BLOCK_GAS: Item<u64> = Item::new("block_gas");

/// Refundable gas counters of the block in flight. They live under their own
/// prefixes, distinct from any base fee-market keys, and are cleared at the
/// end of the block that wrote them
pub(crate) const REFUNDABLE_GAS_WANTED: Item<u64> = Item::new("refundable_gas_wanted");
pub(crate) const REFUNDABLE_GAS_USED: Item<u64> = Item::new("refundable_gas_used");

#[cw_serde]
pub struct Params {
    /// Fee denom reported in the base fee event
    pub denom: String,
    /// Floor of the base gas price
    pub min_base_gas_price: Decimal,
    /// EIP-1559 change denominator; 8 bounds a single-block move to 12.5%
    pub base_fee_change_denominator: u64,
    /// Target utilisation is `max_block_gas / elasticity_multiplier`
    pub elasticity_multiplier: u64,
    /// Gas ceiling of a block
    pub max_block_gas: u64,
    /// Floor multiplier applied to gas wanted when computing effective gas
    pub min_gas_multiplier: Decimal,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            denom: "ubbn".to_string(),
            min_base_gas_price: Decimal::permille(2),
            base_fee_change_denominator: 8,
            elasticity_multiplier: 2,
            max_block_gas: 100_000_000,
            min_gas_multiplier: Decimal::percent(50),
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.base_fee_change_denominator == 0 {
            return Err(ContractError::InvalidParams(
                "base fee change denominator must be positive".to_string(),
            ));
        }
        if self.elasticity_multiplier == 0 {
            return Err(ContractError::InvalidParams(
                "elasticity multiplier must be positive".to_string(),
            ));
        }
        if self.max_block_gas == 0 {
            return Err(ContractError::InvalidParams(
                "max block gas must be positive".to_string(),
            ));
        }
        if self.min_gas_multiplier > Decimal::one() {
            return Err(ContractError::InvalidParams(
                "min gas multiplier cannot exceed 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn target_block_gas(&self) -> u64 {
        self.max_block_gas / self.elasticity_multiplier
    }
}
