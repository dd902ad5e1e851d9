/// Query API of the finality collaborator, as consumed by the staking
/// contract's power distribution.
use cosmwasm_schema::cw_serde;

#[cw_serde]
pub enum FinalityQueryMsg {
    /// Whether the finality provider has BTC-timestamped public randomness
    /// covering the given height. Voting power is only granted once it does.
    HasTimestampedPubRand { fp_btc_pk_hex: String, height: u64 },
}

#[cw_serde]
pub struct HasTimestampedPubRandResponse {
    pub timestamped: bool,
}
