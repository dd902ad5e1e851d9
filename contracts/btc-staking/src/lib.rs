pub mod contract;
pub mod error;
pub mod light_client;
pub mod msg;
pub mod power_dist;
pub mod queries;
pub mod staking;
pub mod state;
pub mod validation;

#[cfg(test)]
mod multitest;
#[cfg(test)]
mod test_utils;
