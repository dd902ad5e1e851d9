use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Binary, Decimal};

use babylon_apis::btc_staking_api::{
    CommissionRates, FinalityProviderDescription, InclusionProof, ProofOfPossessionBtc,
};

use crate::state::config::Config;
use crate::state::params::Params;
use crate::state::power::PowerDistUpdateEvent;
use crate::state::staking::{BtcDelegation, FinalityProvider};

#[cw_serde]
pub struct InstantiateMsg {
    /// Address of the BTC light client contract
    pub btc_light_client: String,
    /// Confirmations required before a staking tx is considered k-deep
    pub btc_confirmation_depth: u32,
    /// Address of the finality contract; optional
    pub btc_finality: Option<String>,
    /// Address of the coostaking contract; optional
    pub coostaking: Option<String>,
    /// Bond denom; queried from the staking module when unset
    pub denom: Option<String>,
    /// Initial staking parameters (version 0)
    pub params: Option<Params>,
    /// Governance authority; unset means immutable params
    pub admin: Option<String>,
    /// Staking tx hashes (hex) allowed to delegate while the allow list is
    /// active
    pub allowed_staking_tx_hashes: Option<Vec<String>>,
}

#[cw_serde]
pub enum ExecuteMsg {
    /// Change the admin
    UpdateAdmin { admin: Option<String> },
    /// Append a new staking params version. Restricted to the governance
    /// authority
    UpdateParams { params: Params },
    /// Register a new finality provider. The sender becomes the FP's
    /// commission address
    CreateFinalityProvider {
        description: FinalityProviderDescription,
        commission: CommissionRates,
        btc_pk_hex: String,
        pop: ProofOfPossessionBtc,
        /// Consumer chain id; unset registers a Babylon finality provider
        bsn_id: Option<String>,
    },
    /// Edit the description and/or commission of an existing finality
    /// provider. The sender must be the FP's registered address
    EditFinalityProvider {
        btc_pk_hex: String,
        description: Option<FinalityProviderDescription>,
        commission: Option<Decimal>,
    },
    /// Create a BTC delegation. The sender becomes the staker address
    CreateBtcDelegation {
        btc_pk_hex: String,
        fp_btc_pk_list: Vec<String>,
        pop: ProofOfPossessionBtc,
        staking_time: u32,
        staking_value: u64,
        staking_tx: Binary,
        staking_output_idx: u32,
        /// Absent in the pre-approval flow
        staking_tx_inclusion_proof: Option<InclusionProof>,
        slashing_tx: Binary,
        delegator_slashing_sig: Binary,
        unbonding_time: u32,
        unbonding_tx: Binary,
        unbonding_value: u64,
        unbonding_slashing_tx: Binary,
        delegator_unbonding_slashing_sig: Binary,
    },
    /// Submit one covenant member's pre-signatures for a delegation
    AddCovenantSigs {
        pk_hex: String,
        staking_tx_hash_hex: String,
        slashing_tx_sigs: Vec<Binary>,
        unbonding_tx_sig: Binary,
        slashing_unbonding_tx_sigs: Vec<Binary>,
    },
    /// Attach an inclusion proof to a VERIFIED delegation (pre-approval flow)
    AddBtcDelegationInclusionProof {
        staking_tx_hash_hex: String,
        staking_tx_inclusion_proof: InclusionProof,
    },
    /// Report the staker-signed spend of the staking output, unbonding the
    /// delegation early
    BtcUndelegate {
        staking_tx_hash_hex: String,
        stake_spending_tx: Binary,
        stake_spending_tx_inclusion_proof: Option<InclusionProof>,
    },
    /// Submit a finality provider secret key extracted from a selective
    /// slashing attempt
    SelectiveSlashingEvidence {
        staking_tx_hash_hex: String,
        recovered_fp_btc_sk_hex: String,
    },
    /// Jail a finality provider. Restricted to the finality collaborator or
    /// the admin
    JailFinalityProvider { fp_btc_pk_hex: String },
    /// Unjail a finality provider. Restricted to the finality collaborator or
    /// the admin
    UnjailFinalityProvider { fp_btc_pk_hex: String },
    /// BTC light client roll-back notification. Restricted to the light
    /// client address
    BtcRollBack { from_height: u32, to_height: u32 },
}

#[cw_serde]
pub enum SudoMsg {
    /// Called by the host once per block before transactions are processed.
    /// Replays pending power distribution events up to the current BTC tip
    /// and records the voting power table
    BeginBlock {},
    /// Called by the host once per block after transactions are processed
    EndBlock {},
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(Config)]
    Config {},
    #[returns(Params)]
    Params {},
    #[returns(Params)]
    ParamsByVersion { version: u32 },
    #[returns(ParamsByBtcHeightResponse)]
    ParamsByBtcHeight { btc_height: u32 },
    #[returns(cw_controllers::AdminResponse)]
    Admin {},
    #[returns(FinalityProvider)]
    FinalityProvider { btc_pk_hex: String },
    #[returns(FinalityProvidersResponse)]
    FinalityProviders {
        start_after: Option<String>,
        limit: Option<u32>,
    },
    #[returns(BtcDelegation)]
    Delegation { staking_tx_hash_hex: String },
    #[returns(BtcDelegationsResponse)]
    Delegations {
        start_after: Option<String>,
        limit: Option<u32>,
        active: Option<bool>,
    },
    /// Staking tx hashes of a finality provider's delegations, paginated
    /// over the per-FP delegator index
    #[returns(DelegationsByFpResponse)]
    DelegationsByFp {
        btc_pk_hex: String,
        start_after: Option<String>,
        limit: Option<u32>,
    },
    #[returns(VotingPowerResponse)]
    VotingPower { btc_pk_hex: String, height: u64 },
    #[returns(VotingPowerTableResponse)]
    VotingPowerTable { height: u64 },
    /// Events still queued at a BTC height; drained by replay
    #[returns(PendingEventsResponse)]
    PendingEvents { btc_height: u32 },
    #[returns(LargestBtcReorgResponse)]
    LargestBtcReorg {},
    #[returns(ActivatedHeightResponse)]
    ActivatedHeight {},
}

#[cw_serde]
pub struct ParamsByBtcHeightResponse {
    pub version: u32,
    pub params: Params,
}

#[cw_serde]
pub struct FinalityProvidersResponse {
    pub fps: Vec<FinalityProvider>,
}

#[cw_serde]
pub struct BtcDelegationsResponse {
    pub delegations: Vec<BtcDelegation>,
}

#[cw_serde]
pub struct DelegationsByFpResponse {
    pub hashes: Vec<String>,
}

#[cw_serde]
pub struct FinalityProviderInfo {
    pub btc_pk_hex: String,
    /// Finality provider power, in satoshis
    pub power: u64,
}

#[cw_serde]
pub struct VotingPowerResponse {
    pub power: u64,
}

#[cw_serde]
pub struct VotingPowerTableResponse {
    pub fps: Vec<FinalityProviderInfo>,
}

#[cw_serde]
pub struct PendingEventsResponse {
    pub events: Vec<PowerDistUpdateEvent>,
}

#[cw_serde]
pub struct LargestBtcReorgResponse {
    pub depth: u32,
}

#[cw_serde]
pub struct ActivatedHeightResponse {
    pub height: Option<u64>,
}
