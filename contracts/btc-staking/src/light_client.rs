use cosmwasm_std::{Addr, QuerierWrapper};

use babylon_apis::btc_light_client_api::{BtcHeaderResponse, BtcLightClientQueryMsg};
use babylon_bitcoin::BlockHeader;

use crate::error::ContractError;

/// The current tip of the BTC light client
pub fn query_tip(
    querier: &QuerierWrapper,
    btc_light_client: &Addr,
) -> Result<BtcHeaderResponse, ContractError> {
    querier
        .query_wasm_smart(btc_light_client, &BtcLightClientQueryMsg::BtcTipHeader {})
        .map_err(|e| ContractError::LightClientError(e.to_string()))
}

/// The current tip height of the BTC light client
pub fn query_tip_height(
    querier: &QuerierWrapper,
    btc_light_client: &Addr,
) -> Result<u32, ContractError> {
    Ok(query_tip(querier, btc_light_client)?.height)
}

/// Resolves a header by its block hash; fails with `HeaderNotFound` when the
/// light client does not know it
pub fn query_header_by_hash(
    querier: &QuerierWrapper,
    btc_light_client: &Addr,
    hash_hex: &str,
) -> Result<BtcHeaderResponse, ContractError> {
    querier
        .query_wasm_smart(
            btc_light_client,
            &BtcLightClientQueryMsg::BtcHeaderByHash {
                hash: hash_hex.to_string(),
            },
        )
        .map_err(|_| ContractError::HeaderNotFound(hash_hex.to_string()))
}

/// Deserializes the raw header carried in a light client response
pub fn parse_header(resp: &BtcHeaderResponse) -> Result<BlockHeader, ContractError> {
    let header_bytes = hex::decode(&resp.header_hex)?;
    babylon_bitcoin::deserialize(&header_bytes)
        .map_err(|_| ContractError::InvalidBtcTx(resp.header_hex.clone()))
}
