pub use bitcoin::{
    block::{Header as BlockHeader, Version},
    consensus::encode::Error as EncodeError,
    consensus::{deserialize, serialize},
    hash_types,
    hashes::hex::HexToArrayError as HexError,
    BlockHash, CompactTarget, Target, Transaction, Txid, Work,
};

pub mod chain_params;
pub mod error;
pub mod merkle;

pub type Result<T> = std::result::Result<T, error::Error>;
