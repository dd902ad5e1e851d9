use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Transaction index {index} is out of range for a Merkle branch of depth {depth}")]
    TxIndexOutOfRange { index: u32, depth: usize },
    #[error("Merkle branch node has invalid length: {0}")]
    BadMerkleNodeLength(usize),
    #[error("The transaction is not included in the Bitcoin chain")]
    TxNotIncluded {},
    #[error("Coinbase transactions cannot be staking transactions")]
    CoinbaseTx {},
}
