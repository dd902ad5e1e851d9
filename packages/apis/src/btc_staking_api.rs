/// BTC staking API types shared between the staking contract, its
/// collaborators and clients.
use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Binary, Decimal};
use k256::schnorr::signature::Verifier;
use k256::schnorr::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::StakingApiError;

/// Hash size in bytes
pub const HASH_SIZE: usize = 32;

/// BIP-340 public key size in bytes
pub const BIP340_PK_SIZE: usize = 32;

/// Schnorr signature size in bytes
pub const SCHNORR_SIG_SIZE: usize = 64;

#[cw_serde]
pub struct FinalityProviderDescription {
    /// moniker is the name of the finality provider
    pub moniker: String,
    /// identity is the identity of the finality provider
    pub identity: String,
    /// website is the website of the finality provider
    pub website: String,
    /// security_contact is the security contact of the finality provider
    pub security_contact: String,
    /// details is the details of the finality provider
    pub details: String,
}

impl FinalityProviderDescription {
    /// Description field lengths
    pub const MAX_MONIKER_LENGTH: usize = 70;
    pub const MAX_IDENTITY_LENGTH: usize = 3000;
    pub const MAX_WEBSITE_LENGTH: usize = 140;
    pub const MAX_SECURITY_CONTACT_LENGTH: usize = 140;
    pub const MAX_DETAILS_LENGTH: usize = 280;
}

/// CommissionRates defines the initial commission rates to be used for
/// creating a finality provider
#[cw_serde]
pub struct CommissionRates {
    /// rate is the commission rate charged to delegators, as a fraction
    pub rate: Decimal,
    /// max_rate defines the maximum commission rate which this finality
    /// provider can ever charge
    pub max_rate: Decimal,
    /// max_change_rate defines the maximum daily increase of the commission
    pub max_change_rate: Decimal,
}

/// ProofOfPossessionBtc is the proof of possession that a staker's native
/// address and a Bitcoin secp256k1 secret key are held by the same person
#[cw_serde]
pub struct ProofOfPossessionBtc {
    /// btc_sig_type indicates the type of btc_sig in the pop
    pub btc_sig_type: i32,
    /// btc_sig is the signature generated via sign(sk_btc, address)
    /// the signature follows encoding in BIP-340 spec
    pub btc_sig: Binary,
}

impl ProofOfPossessionBtc {
    /// BIP-340 signature over the sha256 digest of the signer's address bytes
    pub const SIG_TYPE_BIP340: i32 = 0;

    /// Verifies the proof of possession against the given BIP-340 public key
    /// and the bech32 address string it binds to.
    pub fn verify(&self, btc_pk: &[u8], addr: &str) -> Result<(), StakingApiError> {
        if self.btc_sig_type != Self::SIG_TYPE_BIP340 {
            return Err(StakingApiError::InvalidPop(format!(
                "unsupported signature type: {}",
                self.btc_sig_type
            )));
        }
        let verifying_key = VerifyingKey::from_bytes(btc_pk)
            .map_err(|e| StakingApiError::InvalidBtcPk(e.to_string()))?;
        let sig = Signature::try_from(self.btc_sig.as_slice())
            .map_err(|e| StakingApiError::InvalidPop(e.to_string()))?;
        let msg_hash = Sha256::digest(addr.as_bytes());
        verifying_key
            .verify(&msg_hash, &sig)
            .map_err(|e| StakingApiError::InvalidPop(e.to_string()))
    }
}

/// BTCDelegationStatus is the status of a delegation, derived from its state,
/// the current BTC tip and the covenant quorum.
///
/// The typical path is PENDING -> (VERIFIED ->) ACTIVE -> UNBONDED/EXPIRED.
#[cw_serde]
#[derive(Copy)]
pub enum BTCDelegationStatus {
    /// PENDING defines a delegation waiting for covenant signatures
    Pending,
    /// VERIFIED defines a delegation that has covenant quorum but whose
    /// staking tx inclusion has not been proven yet (pre-approval flow)
    Verified,
    /// ACTIVE defines a delegation that has voting power
    Active,
    /// UNBONDED defines a delegation unbonded early by the staker
    Unbonded,
    /// EXPIRED defines a delegation whose time-lock has run out
    Expired,
    /// SLASHED defines a delegation whose finality provider was slashed
    Slashed,
}

impl BTCDelegationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BTCDelegationStatus::Pending => "pending",
            BTCDelegationStatus::Verified => "verified",
            BTCDelegationStatus::Active => "active",
            BTCDelegationStatus::Unbonded => "unbonded",
            BTCDelegationStatus::Expired => "expired",
            BTCDelegationStatus::Slashed => "slashed",
        }
    }
}

/// CovenantAdaptorSignatures is a list of adaptor signatures signed by a
/// covenant member with different finality providers' public keys as
/// encryption keys
#[cw_serde]
pub struct CovenantAdaptorSignatures {
    /// cov_pk is the BIP-340 public key of the covenant member
    pub cov_pk: Binary,
    /// adaptor_sigs is a list of adaptor signatures, one per finality
    /// provider of the delegation, in the delegation's FP list order
    pub adaptor_sigs: Vec<Binary>,
}

/// SignatureInfo is a BIP-340 signature together with its signer's BIP-340 PK
#[cw_serde]
pub struct SignatureInfo {
    pub pk: Binary,
    pub sig: Binary,
}

/// InclusionProof proves that a transaction is committed in a Bitcoin block
#[cw_serde]
pub struct InclusionProof {
    /// block_hash_hex is the hash of the Bitcoin header containing the tx
    pub block_hash_hex: String,
    /// index is the literal leaf index of the tx in the block
    pub index: u32,
    /// branch is the Merkle branch, sibling hashes bottom-up
    pub branch: Vec<Binary>,
}
