/// Execute API of the incentive / reward-gauge collaborator. Reward coins
/// ride along as message funds.
use cosmwasm_schema::cw_serde;

#[cw_serde]
pub enum StakeholderType {
    FinalityProvider,
    BtcStaker,
    Coostaker,
}

impl StakeholderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StakeholderType::FinalityProvider => "finality_provider",
            StakeholderType::BtcStaker => "btc_staker",
            StakeholderType::Coostaker => "coostaker",
        }
    }
}

#[cw_serde]
pub enum IncentiveExecuteMsg {
    /// Accumulate the attached funds in the reward gauge of the given
    /// stakeholder address
    AccumulateRewardGauge {
        stakeholder_type: StakeholderType,
        address: String,
    },
    /// Accumulate the attached funds as BTC-delegation rewards of the given
    /// finality provider
    AddFinalityProviderRewards { fp_addr: String },
}
