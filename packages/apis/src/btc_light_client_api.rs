/// Query API of the BTC light client collaborator, as consumed by the
/// staking contract.
use cosmwasm_schema::cw_serde;

#[cw_serde]
pub enum BtcLightClientQueryMsg {
    /// The header with the most accumulated work
    BtcTipHeader {},
    /// The base header the light client was initialised from
    BtcBaseHeader {},
    /// A header looked up by its (big-endian hex) block hash
    BtcHeaderByHash { hash: String },
}

#[cw_serde]
pub struct BtcHeaderResponse {
    /// The 80-byte Bitcoin header, hex-encoded
    pub header_hex: String,
    /// The header's block hash, big-endian hex
    pub hash_hex: String,
    /// Height of the header in the Bitcoin chain
    pub height: u32,
}
