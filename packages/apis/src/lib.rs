pub mod btc_light_client_api;
pub mod btc_staking_api;
pub mod error;
pub mod finality_api;
pub mod incentive_api;
mod validate;

pub type Bytes = Vec<u8>;

pub use validate::{parse_bip340_pk, Validate};
