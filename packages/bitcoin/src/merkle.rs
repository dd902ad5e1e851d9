use bitcoin::blockdata::transaction::Transaction;
use bitcoin::hashes::{sha256d, Hash};

use crate::error::Error;
use crate::Result;

/// Size of a Merkle tree node, i.e. a double-SHA256 hash
const MERKLE_NODE_SIZE: usize = 32;

/// Verifies that `tx` is committed under `root` at the literal claimed
/// `tx_index`, following the branch bottom-up.
///
/// The claimed index must be the true leaf index: any `tx_index >= 2^depth`
/// is rejected outright. Without this bound a miner could take a valid proof
/// for leaf `i` and resubmit it with index `i + k * 2^depth`, as the branch
/// walk only inspects the lowest `depth` bits.
pub fn verify_tx_inclusion(
    tx: &Transaction,
    branch: &[Vec<u8>],
    tx_index: u32,
    root: &sha256d::Hash,
) -> Result<()> {
    let depth = branch.len();
    // depth >= 32 admits any u32 index, so only the shift below needs guarding
    if depth < u32::BITS as usize && (tx_index >> depth) != 0 {
        return Err(Error::TxIndexOutOfRange {
            index: tx_index,
            depth,
        });
    }

    let mut current_hash = tx.txid().to_raw_hash();
    for (i, next_hash) in branch.iter().enumerate() {
        if next_hash.len() != MERKLE_NODE_SIZE {
            return Err(Error::BadMerkleNodeLength(next_hash.len()));
        }
        let mut concat = vec![];
        // extracts the i-th bit of the tx index
        if ((tx_index >> i) & 1) == 1 {
            // the transaction is in the right subtree of the current node
            concat.extend_from_slice(next_hash);
            concat.extend_from_slice(&current_hash[..]);
        } else {
            // the transaction is in the left subtree of the current node
            concat.extend_from_slice(&current_hash[..]);
            concat.extend_from_slice(next_hash);
        }

        current_hash = sha256d::Hash::hash(&concat);
    }

    if &current_hash != root {
        return Err(Error::TxNotIncluded {});
    }
    Ok(())
}

/// Rejects transactions whose claimed index and input shape identify them as
/// a coinbase. Redundant with the index bound in [`verify_tx_inclusion`] but
/// kept as an independent check.
pub fn check_coinbase(tx: &Transaction, tx_index: u32) -> Result<()> {
    if tx_index == 0 && tx.is_coinbase() {
        return Err(Error::CoinbaseTx {});
    }
    Ok(())
}
