use cosmwasm_schema::cw_serde;
use cosmwasm_std::Addr;

use cw_controllers::Admin;
use cw_storage_plus::Item;

pub(crate) const CONFIG: Item<Config> = Item::new("config");
/// Storage for admin (the governance authority)
pub(crate) const ADMIN: Admin = Admin::new("admin");

/// Config holds the collaborator wiring of the staking contract
#[cw_serde]
pub struct Config {
    /// Bond denom of the native chain
    pub denom: String,
    /// Chain id of the native chain. Finality providers registered without a
    /// BSN id (or with this one) are Babylon finality providers
    pub own_chain_id: String,
    /// Address of the BTC light client contract
    pub btc_light_client: Addr,
    /// Number of confirmations required before a staking tx is considered
    /// k-deep
    pub btc_confirmation_depth: u32,
    /// Address of the finality contract, queried for timestamped public
    /// randomness. When unset, all finality providers count as timestamped
    pub btc_finality: Option<Addr>,
    /// Address of the coostaking contract receiving BTC stake updates
    pub coostaking: Option<Addr>,
}
