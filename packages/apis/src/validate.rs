use cosmwasm_std::Decimal;

use crate::btc_staking_api::{
    CommissionRates, FinalityProviderDescription, InclusionProof, BIP340_PK_SIZE, HASH_SIZE,
};
use crate::error::StakingApiError;

/// A trait for validating the API structs / input.
pub trait Validate {
    fn validate(&self) -> Result<(), StakingApiError>;
}

impl Validate for FinalityProviderDescription {
    fn validate(&self) -> Result<(), StakingApiError> {
        if self.moniker.is_empty() {
            return Err(StakingApiError::description_err("Moniker cannot be empty"));
        }
        if self.moniker.len() > FinalityProviderDescription::MAX_MONIKER_LENGTH {
            return Err(StakingApiError::description_err(format!(
                "Invalid moniker length; got: {}, max: {}",
                self.moniker.len(),
                FinalityProviderDescription::MAX_MONIKER_LENGTH
            )));
        }
        if self.identity.len() > FinalityProviderDescription::MAX_IDENTITY_LENGTH {
            return Err(StakingApiError::description_err(format!(
                "Invalid identity length; got: {}, max: {}",
                self.identity.len(),
                FinalityProviderDescription::MAX_IDENTITY_LENGTH
            )));
        }
        if self.website.len() > FinalityProviderDescription::MAX_WEBSITE_LENGTH {
            return Err(StakingApiError::description_err(format!(
                "Invalid website length; got: {}, max: {}",
                self.website.len(),
                FinalityProviderDescription::MAX_WEBSITE_LENGTH
            )));
        }
        if self.security_contact.len() > FinalityProviderDescription::MAX_SECURITY_CONTACT_LENGTH {
            return Err(StakingApiError::description_err(format!(
                "Invalid security contact length; got: {}, max: {}",
                self.security_contact.len(),
                FinalityProviderDescription::MAX_SECURITY_CONTACT_LENGTH
            )));
        }
        if self.details.len() > FinalityProviderDescription::MAX_DETAILS_LENGTH {
            return Err(StakingApiError::description_err(format!(
                "Invalid details length; got: {}, max: {}",
                self.details.len(),
                FinalityProviderDescription::MAX_DETAILS_LENGTH
            )));
        }
        Ok(())
    }
}

impl Validate for CommissionRates {
    fn validate(&self) -> Result<(), StakingApiError> {
        if self.max_rate > Decimal::one() {
            return Err(StakingApiError::InvalidCommissionRates(
                "max rate cannot be more than 100%".to_string(),
            ));
        }
        if self.rate > self.max_rate {
            return Err(StakingApiError::InvalidCommissionRates(
                "rate cannot be more than the max rate".to_string(),
            ));
        }
        if self.max_change_rate > self.max_rate {
            return Err(StakingApiError::InvalidCommissionRates(
                "max change rate cannot be more than the max rate".to_string(),
            ));
        }
        Ok(())
    }
}

impl Validate for InclusionProof {
    fn validate(&self) -> Result<(), StakingApiError> {
        let hash = hex::decode(&self.block_hash_hex)?;
        if hash.len() != HASH_SIZE {
            return Err(StakingApiError::InvalidInclusionProof(format!(
                "block hash is {} bytes, expected {}",
                hash.len(),
                HASH_SIZE
            )));
        }
        if self.branch.is_empty() {
            return Err(StakingApiError::InvalidInclusionProof(
                "empty Merkle branch".to_string(),
            ));
        }
        for node in &self.branch {
            if node.len() != HASH_SIZE {
                return Err(StakingApiError::InvalidInclusionProof(format!(
                    "Merkle branch node is {} bytes, expected {}",
                    node.len(),
                    HASH_SIZE
                )));
            }
        }
        Ok(())
    }
}

/// Decodes and checks a hex-encoded BIP-340 public key.
pub fn parse_bip340_pk(pk_hex: &str) -> Result<[u8; BIP340_PK_SIZE], StakingApiError> {
    if pk_hex.is_empty() {
        return Err(StakingApiError::EmptyBtcPk);
    }
    let bytes = hex::decode(pk_hex)?;
    bytes
        .try_into()
        .map_err(|_| StakingApiError::InvalidBtcPk(pk_hex.to_string()))
}
