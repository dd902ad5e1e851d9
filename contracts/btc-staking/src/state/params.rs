use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Decimal, Order, StdResult, Storage};
use cw_storage_plus::{Bound, Map};
use derivative::Derivative;

use babylon_bitcoin::chain_params::Network;

use crate::error::ContractError;

/// Versioned staking parameters, keyed by version
pub(crate) const PARAMS: Map<u32, Params> = Map::new("params");
/// BTC activation height of each params version. Sorted iteration over this
/// map resolves the version active at any BTC height
pub(crate) const PARAMS_BY_BTC_HEIGHT: Map<u32, u32> = Map::new("params_btc_height");

/// Params define the staking parameters selectable via governance
#[cw_serde]
#[derive(Derivative)]
#[derivative(Default)]
pub struct Params {
    /// `covenant_pks` is the list of public keys held by the covenant
    /// committee. Each PK follows encoding in BIP-340 spec on Bitcoin
    pub covenant_pks: Vec<String>,
    /// `covenant_quorum` is the minimum number of signatures needed for the
    /// covenant multi-signature
    #[derivative(Default(value = "1"))]
    pub covenant_quorum: u32,
    /// `btc_network` is the network the BTC staking protocol is running on
    #[derivative(Default(value = "Network::Regtest"))]
    pub btc_network: Network,
    /// `min_staking_value_sat` is the minimum amount of satoshis a delegation
    /// can stake
    #[derivative(Default(value = "10_000"))]
    pub min_staking_value_sat: u64,
    /// `max_staking_value_sat` is the maximum amount of satoshis a delegation
    /// can stake
    #[derivative(Default(value = "10_000_000_000"))]
    pub max_staking_value_sat: u64,
    /// `min_staking_time_blocks` is the minimum staking time-lock in BTC blocks
    #[derivative(Default(value = "100"))]
    pub min_staking_time_blocks: u32,
    /// `max_staking_time_blocks` is the maximum staking time-lock in BTC blocks
    #[derivative(Default(value = "65_000"))]
    pub max_staking_time_blocks: u32,
    /// `slashing_pk_script` is the pk script that the slashed BTC goes to,
    /// hex-encoded
    #[derivative(Default(
        value = "String::from(\"76a914010101010101010101010101010101010101010188ac\")"
    ))]
    pub slashing_pk_script: String,
    /// `min_slashing_tx_fee_sat` is the minimum amount of tx fee (quantified
    /// in satoshi) needed for the pre-signed slashing tx
    #[derivative(Default(value = "1000"))]
    pub min_slashing_tx_fee_sat: u64,
    /// `slashing_rate` determines the portion of the staked amount to be
    /// slashed, as a decimal in (0,1)
    #[derivative(Default(value = "Decimal::percent(10)"))]
    pub slashing_rate: Decimal,
    /// `min_commission_rate` is the chain-wide minimum commission rate that a
    /// finality provider can charge their delegators
    pub min_commission_rate: Decimal,
    /// `min_unbonding_time_blocks` is the minimum time-lock of the unbonding
    /// output, in BTC blocks
    #[derivative(Default(value = "200"))]
    pub min_unbonding_time_blocks: u32,
    /// `unbonding_fee_sat` is the exact fee of the pre-signed unbonding tx
    #[derivative(Default(value = "2_000"))]
    pub unbonding_fee_sat: u64,
    /// `max_multi_staked_fps` caps the number of finality providers a single
    /// delegation can be restaked to
    #[derivative(Default(value = "3"))]
    pub max_multi_staked_fps: u32,
    /// `max_staker_quorum` caps the quorum of multisig stakers
    #[derivative(Default(value = "10"))]
    pub max_staker_quorum: u32,
    /// `max_staker_num` caps the number of multisig stakers
    #[derivative(Default(value = "20"))]
    pub max_staker_num: u32,
    /// `allow_list_expiration_height` is the native height at which the
    /// staking-tx allow list expires. Zero disables the allow list
    pub allow_list_expiration_height: u64,
    /// `btc_activation_height` is the BTC height at which this params version
    /// becomes active
    #[derivative(Default(value = "1"))]
    pub btc_activation_height: u32,
}

impl Params {
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.covenant_pks.is_empty() {
            return Err(ContractError::InvalidParams(
                "covenant committee cannot be empty".to_string(),
            ));
        }
        if self.covenant_quorum == 0 || self.covenant_quorum as usize > self.covenant_pks.len() {
            return Err(ContractError::InvalidParams(
                "covenant quorum must be in [1, len(covenant_pks)]".to_string(),
            ));
        }
        for pk in &self.covenant_pks {
            let bytes = hex::decode(pk)
                .map_err(|e| ContractError::InvalidParams(format!("covenant pk: {e}")))?;
            if bytes.len() != babylon_apis::btc_staking_api::BIP340_PK_SIZE {
                return Err(ContractError::InvalidParams(format!(
                    "covenant pk {pk} is not a BIP-340 public key"
                )));
            }
        }
        if self.slashing_rate <= Decimal::zero() || self.slashing_rate >= Decimal::one() {
            return Err(ContractError::InvalidParams(
                "slashing rate must be in (0,1)".to_string(),
            ));
        }
        if self.min_staking_value_sat > self.max_staking_value_sat {
            return Err(ContractError::InvalidParams(
                "min staking value cannot exceed max staking value".to_string(),
            ));
        }
        if self.min_staking_time_blocks == 0
            || self.min_staking_time_blocks > self.max_staking_time_blocks
        {
            return Err(ContractError::InvalidParams(
                "staking time bounds are invalid".to_string(),
            ));
        }
        if self.max_staking_time_blocks > u16::MAX as u32 {
            return Err(ContractError::InvalidParams(
                "max staking time cannot exceed the BTC time-lock limit".to_string(),
            ));
        }
        if self.min_slashing_tx_fee_sat == 0 {
            return Err(ContractError::InvalidParams(
                "min slashing tx fee must be positive".to_string(),
            ));
        }
        if self.max_multi_staked_fps < 2 {
            return Err(ContractError::InvalidParams(
                "max multi-staked finality providers must be at least 2".to_string(),
            ));
        }
        hex::decode(&self.slashing_pk_script)
            .map_err(|e| ContractError::InvalidParams(format!("slashing pk script: {e}")))?;
        Ok(())
    }
}

/// Appends a new params version. The activation height must be strictly
/// larger than every previously stored one.
pub fn add_params(storage: &mut dyn Storage, params: &Params) -> Result<u32, ContractError> {
    params.validate()?;

    let last = PARAMS
        .keys(storage, None, None, Order::Descending)
        .next()
        .transpose()?;
    let version = match last {
        Some(v) => {
            let prev = PARAMS.load(storage, v)?;
            if params.btc_activation_height <= prev.btc_activation_height {
                return Err(ContractError::ActivationHeightNotIncreasing {
                    prev: prev.btc_activation_height,
                    new: params.btc_activation_height,
                });
            }
            v + 1
        }
        None => 0,
    };
    PARAMS.save(storage, version, params)?;
    PARAMS_BY_BTC_HEIGHT.save(storage, params.btc_activation_height, &version)?;
    Ok(version)
}

/// The latest params version and its number
pub fn get_latest(storage: &dyn Storage) -> StdResult<(u32, Params)> {
    PARAMS
        .range(storage, None, None, Order::Descending)
        .next()
        .expect("params are set at instantiation")
}

/// The latest params version
pub fn get_params(storage: &dyn Storage) -> StdResult<Params> {
    Ok(get_latest(storage)?.1)
}

pub fn get_params_by_version(
    storage: &dyn Storage,
    version: u32,
) -> Result<Params, ContractError> {
    PARAMS
        .may_load(storage, version)?
        .ok_or(ContractError::ParamsVersionNotFound(version))
}

/// The params version active at the given BTC height: the one with the
/// greatest activation height `<= btc_height`.
pub fn get_params_for_btc_height(
    storage: &dyn Storage,
    btc_height: u32,
) -> Result<(u32, Params), ContractError> {
    let version = PARAMS_BY_BTC_HEIGHT
        .range(
            storage,
            None,
            Some(Bound::inclusive(btc_height)),
            Order::Descending,
        )
        .next()
        .transpose()?
        .map(|(_, v)| v)
        .ok_or(ContractError::NoParamsForBtcHeight(btc_height))?;
    let params = get_params_by_version(storage, version)?;
    Ok((version, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::mock_dependencies;

    fn params_at(height: u32) -> Params {
        Params {
            covenant_pks: vec!["aa".repeat(32)],
            btc_activation_height: height,
            ..Default::default()
        }
    }

    #[test]
    fn test_versions_strictly_increase() {
        let mut deps = mock_dependencies();

        let v0 = add_params(deps.as_mut().storage, &params_at(10)).unwrap();
        let v1 = add_params(deps.as_mut().storage, &params_at(20)).unwrap();
        assert_eq!((v0, v1), (0, 1));

        // equal or lower activation heights are rejected
        let err = add_params(deps.as_mut().storage, &params_at(20)).unwrap_err();
        assert_eq!(
            err,
            ContractError::ActivationHeightNotIncreasing { prev: 20, new: 20 }
        );
        let err = add_params(deps.as_mut().storage, &params_at(15)).unwrap_err();
        assert_eq!(
            err,
            ContractError::ActivationHeightNotIncreasing { prev: 20, new: 15 }
        );
    }

    #[test]
    fn test_lookup_by_version_and_height() {
        let mut deps = mock_dependencies();

        add_params(deps.as_mut().storage, &params_at(10)).unwrap();
        add_params(deps.as_mut().storage, &params_at(20)).unwrap();
        add_params(deps.as_mut().storage, &params_at(30)).unwrap();

        // by version, exactly what was set
        for (v, h) in [(0u32, 10u32), (1, 20), (2, 30)] {
            let p = get_params_by_version(deps.as_ref().storage, v).unwrap();
            assert_eq!(p.btc_activation_height, h);
        }
        assert_eq!(
            get_params_by_version(deps.as_ref().storage, 3).unwrap_err(),
            ContractError::ParamsVersionNotFound(3)
        );

        // latest
        assert_eq!(
            get_params(deps.as_ref().storage).unwrap().btc_activation_height,
            30
        );

        // by BTC height: greatest activation height <= h
        for (h, expected_version) in [(10u32, 0u32), (15, 0), (20, 1), (29, 1), (30, 2), (1000, 2)]
        {
            let (v, _) = get_params_for_btc_height(deps.as_ref().storage, h).unwrap();
            assert_eq!(v, expected_version, "height {h}");
        }
        assert_eq!(
            get_params_for_btc_height(deps.as_ref().storage, 9).unwrap_err(),
            ContractError::NoParamsForBtcHeight(9)
        );
    }

    #[test]
    fn test_params_validation() {
        let mut p = params_at(10);
        p.covenant_pks = vec![];
        assert!(matches!(
            p.validate().unwrap_err(),
            ContractError::InvalidParams(_)
        ));

        let mut p = params_at(10);
        p.covenant_quorum = 2;
        assert!(p.validate().is_err());

        let mut p = params_at(10);
        p.slashing_rate = Decimal::one();
        assert!(p.validate().is_err());

        let mut p = params_at(10);
        p.max_multi_staked_fps = 1;
        assert!(p.validate().is_err());
    }
}
