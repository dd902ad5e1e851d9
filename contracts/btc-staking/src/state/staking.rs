use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Decimal, StdResult, Storage, Timestamp};
use cw_storage_plus::Map;

use babylon_apis::btc_staking_api::{
    BTCDelegationStatus, CovenantAdaptorSignatures, FinalityProviderDescription, SignatureInfo,
    HASH_SIZE,
};
use babylon_apis::Bytes;

/// Finality providers by their BTC public key
pub(crate) const FPS: Map<&str, FinalityProvider> = Map::new("fps");
/// BTC public key of the finality provider registered by a native address.
/// Enforces the unique FP-per-address binding
pub(crate) const FP_BY_ADDR: Map<&str, String> = Map::new("fp_by_addr");

/// Delegations by staking tx hash
pub(crate) const DELEGATIONS: Map<&[u8; HASH_SIZE], BtcDelegation> = Map::new("delegations");
/// Staking tx hashes of a Babylon finality provider's delegator, keyed by
/// `(fp_btc_pk, del_btc_pk)`, in insertion order
pub(crate) const BTC_DELEGATORS: Map<(&str, &str), DelegationIndex> = Map::new("btc_delegators");
/// Same shape as `BTC_DELEGATORS`, for consumer finality providers
pub(crate) const CONSUMER_DELEGATORS: Map<(&str, &str), DelegationIndex> =
    Map::new("consumer_delegators");

/// Staking tx hashes allowed to delegate while the allow list is active
pub(crate) const ALLOWED_STAKING_TX_HASHES: Map<&[u8; HASH_SIZE], ()> =
    Map::new("allowed_staking_tx_hashes");

/// The kind of a finality provider: native to this chain, or registered for
/// a consumer chain (BSN)
#[cw_serde]
pub enum FpKind {
    Babylon,
    Consumer { bsn_id: String },
}

#[cw_serde]
pub struct FinalityProvider {
    /// addr is the native address the finality provider receives commission to
    pub addr: String,
    /// description defines the description terms for the finality provider
    pub description: FinalityProviderDescription,
    /// commission defines the commission rate of the finality provider
    pub commission: Decimal,
    /// max_commission_rate is the upper bound the commission can ever reach
    pub max_commission_rate: Decimal,
    /// max_commission_change_rate bounds a single commission edit
    pub max_commission_change_rate: Decimal,
    /// commission_update_time is the time of the last commission edit
    pub commission_update_time: Option<Timestamp>,
    /// btc_pk_hex is the Bitcoin secp256k1 PK of this finality provider.
    /// The PK follows encoding in BIP-340 spec in hex format
    pub btc_pk_hex: String,
    /// bsn_id is the id of the consumer chain the finality provider operates
    /// on; equal to the own chain id for Babylon finality providers
    pub bsn_id: String,
    /// slashed_height is the native height when the finality provider was
    /// slashed; zero when it is not slashed
    pub slashed_height: u64,
    /// slashed_btc_height is the BTC height when the finality provider was
    /// slashed; zero when it is not slashed
    pub slashed_btc_height: u32,
    /// jailed indicates whether the finality provider is jailed
    pub jailed: bool,
}

impl FinalityProvider {
    pub fn is_slashed(&self) -> bool {
        self.slashed_height > 0
    }

    pub fn kind(&self, own_chain_id: &str) -> FpKind {
        if self.bsn_id == own_chain_id {
            FpKind::Babylon
        } else {
            FpKind::Consumer {
                bsn_id: self.bsn_id.clone(),
            }
        }
    }
}

/// Ordered list of staking tx hashes of one `(fp, delegator)` pair
#[cw_serde]
#[derive(Default)]
pub struct DelegationIndex {
    pub staking_tx_hashes: Vec<Bytes>,
}

/// Chooses the delegator index keyspace for a finality provider kind
pub fn delegator_index(kind: &FpKind) -> Map<(&'static str, &'static str), DelegationIndex> {
    match kind {
        FpKind::Babylon => BTC_DELEGATORS,
        FpKind::Consumer { .. } => CONSUMER_DELEGATORS,
    }
}

/// Appends a staking tx hash to the delegator index of the given FP kind
pub fn index_delegation(
    storage: &mut dyn Storage,
    kind: &FpKind,
    fp_btc_pk_hex: &str,
    del_btc_pk_hex: &str,
    staking_tx_hash: &[u8; HASH_SIZE],
) -> StdResult<()> {
    let index = delegator_index(kind);
    let mut entry = index
        .may_load(storage, (fp_btc_pk_hex, del_btc_pk_hex))?
        .unwrap_or_default();
    entry.staking_tx_hashes.push(staking_tx_hash.to_vec());
    index.save(storage, (fp_btc_pk_hex, del_btc_pk_hex), &entry)
}

#[cw_serde]
pub struct BtcDelegation {
    /// staker_addr is the address to receive rewards from BTC delegation
    pub staker_addr: String,
    /// btc_pk_hex is the Bitcoin secp256k1 PK of the BTC delegator.
    /// The PK follows encoding in BIP-340 spec in hex format
    pub btc_pk_hex: String,
    /// fp_btc_pk_list is the list of BIP-340 PKs of the finality providers
    /// that this BTC delegation delegates to
    pub fp_btc_pk_list: Vec<String>,
    /// start_height is the start BTC height of the time-lock; zero until an
    /// inclusion proof is accepted
    pub start_height: u32,
    /// end_height is the end BTC height of the time-lock; zero until an
    /// inclusion proof is accepted
    pub end_height: u32,
    /// total_sat is the total BTC stakes in this delegation, quantified in
    /// satoshi
    pub total_sat: u64,
    /// staking_time is the time-lock of the staking output, in BTC blocks.
    /// Determines `end_height` once an inclusion proof fixes `start_height`
    pub staking_time: u32,
    /// staking_tx is the staking tx
    pub staking_tx: Bytes,
    /// staking_output_idx is the index of the staking output in the staking tx
    pub staking_output_idx: u32,
    /// slashing_tx is the slashing tx
    pub slashing_tx: Bytes,
    /// delegator_slashing_sig is the signature on the slashing tx by the
    /// delegator (i.e. SK corresponding to btc_pk).
    /// It will be a part of the witness for the staking tx output
    pub delegator_slashing_sig: Bytes,
    /// covenant_sigs is a list of adaptor signatures on the slashing tx by
    /// each covenant member.
    /// It will be a part of the witness for the staking tx output
    pub covenant_sigs: Vec<CovenantAdaptorSignatures>,
    /// unbonding_time is used in unbonding output time-lock path and in
    /// slashing transactions change outputs
    pub unbonding_time: u32,
    /// undelegation_info is the undelegation info of this delegation
    pub undelegation_info: UndelegationInfo,
    /// params version used to validate the delegation
    pub params_version: u32,
}

impl BtcDelegation {
    /// Whether the inclusion of the staking tx in the BTC chain was proven
    pub fn has_inclusion_proof(&self) -> bool {
        self.start_height > 0 || self.end_height > 0
    }

    /// Whether enough covenant members pre-signed the slashing and unbonding
    /// paths
    pub fn has_covenant_quorum(&self, quorum: u32) -> bool {
        self.covenant_sigs.len() as u32 >= quorum
    }

    pub fn is_unbonded_early(&self) -> bool {
        !self.undelegation_info.delegator_unbonding_sig.is_empty()
    }

    /// Derives the delegation status. A pure function of the delegation, the
    /// BTC tip and the covenant quorum; the SLASHED view is per finality
    /// provider and handled by the caller.
    pub fn get_status(&self, btc_tip: u32, covenant_quorum: u32) -> BTCDelegationStatus {
        if self.is_unbonded_early() {
            return BTCDelegationStatus::Unbonded;
        }
        if !self.has_inclusion_proof() {
            return if self.has_covenant_quorum(covenant_quorum) {
                BTCDelegationStatus::Verified
            } else {
                BTCDelegationStatus::Pending
            };
        }
        if !self.has_covenant_quorum(covenant_quorum) {
            return BTCDelegationStatus::Pending;
        }
        // the time-lock is expired once fewer than `unbonding_time` BTC
        // blocks remain before `end_height`
        if btc_tip as u64 + self.unbonding_time as u64 >= self.end_height as u64 {
            return BTCDelegationStatus::Expired;
        }
        if btc_tip < self.start_height {
            return BTCDelegationStatus::Pending;
        }
        BTCDelegationStatus::Active
    }
}

#[cw_serde]
pub struct UndelegationInfo {
    /// unbonding_tx is the transaction which will transfer the funds from
    /// staking output to unbonding output. Unbonding output will usually have
    /// lower timelock than staking output
    pub unbonding_tx: Bytes,
    /// delegator_unbonding_sig is the signature on the unbonding tx by the
    /// delegator (i.e. SK corresponding to btc_pk).
    /// It effectively proves that the delegator wants to unbond and thus the
    /// chain will consider this BTC delegation unbonded
    pub delegator_unbonding_sig: Bytes,
    /// covenant_unbonding_sig_list is the list of signatures on the unbonding
    /// tx by covenant members
    pub covenant_unbonding_sig_list: Vec<SignatureInfo>,
    /// slashing_tx is the unbonding slashing tx
    pub slashing_tx: Bytes,
    /// delegator_slashing_sig is the signature on the unbonding slashing tx
    /// by the delegator (i.e. SK corresponding to btc_pk).
    /// It will be a part of the witness for the unbonding tx output
    pub delegator_slashing_sig: Bytes,
    /// covenant_slashing_sigs is a list of adaptor signatures on the
    /// unbonding slashing tx by each covenant member.
    /// It will be a part of the witness for the unbonding tx output
    pub covenant_slashing_sigs: Vec<CovenantAdaptorSignatures>,
}
