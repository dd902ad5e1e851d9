//! Deterministic data generation for tests: keypairs, staking transaction
//! sets, Merkle blocks and signatures of all flavours used by the staking
//! protocol.

use bitcoin::absolute::LockTime;
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::sighash::{Prevouts, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, OutPoint, Script, ScriptBuf, Sequence, Transaction, TxIn, TxMerkleNode, TxOut, Txid,
    Witness, XOnlyPublicKey,
};
use k256::elliptic_curve::group::prime::PrimeCurveAffine;
use k256::elliptic_curve::ops::{MulByGenerator, Reduce};
use k256::elliptic_curve::point::{AffineCoordinates, DecompressPoint};
use k256::schnorr::signature::Signer;
use k256::schnorr::{Signature as SchnorrSignature, SigningKey};
use k256::{AffinePoint, ProjectivePoint, Scalar, U256};
use rand::RngCore;
use sha2::{Digest, Sha256};

use babylon_btcstaking::scripts::StakingScriptPaths;

/// Generates a fresh BIP-340 keypair
pub fn new_keypair(rng: &mut impl RngCore) -> (SigningKey, XOnlyPublicKey) {
    loop {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        if let Ok(sk) = SigningKey::from_bytes(&bytes) {
            let pk = x_only_pk(&sk);
            return (sk, pk);
        }
    }
}

/// The x-only public key of a signing key
pub fn x_only_pk(sk: &SigningKey) -> XOnlyPublicKey {
    XOnlyPublicKey::from_slice(&sk.verifying_key().to_bytes()).unwrap()
}

/// BIP-340 proof-of-possession signature binding `addr` to the key
pub fn pop_sign(sk: &SigningKey, addr: &str) -> Vec<u8> {
    let msg_hash = Sha256::digest(addr.as_bytes());
    let sig: SchnorrSignature = sk.sign(&msg_hash);
    sig.to_bytes().to_vec()
}

fn calc_sighash(tx: &Transaction, funding_output: &TxOut, path_script: &Script) -> [u8; 32] {
    let tap_leaf_hash = path_script.tapscript_leaf_hash();
    let mut sighash_cache = SighashCache::new(tx);
    sighash_cache
        .taproot_script_spend_signature_hash(
            0,
            &Prevouts::All(&[funding_output]),
            tap_leaf_hash,
            bitcoin::TapSighashType::Default,
        )
        .unwrap()
        .to_raw_hash()
        .to_byte_array()
}

/// Schnorr signature over the taproot script-spend sighash of `tx`
pub fn schnorr_sign_tx(
    sk: &SigningKey,
    tx: &Transaction,
    funding_output: &TxOut,
    path_script: &Script,
) -> SchnorrSignature {
    let sighash = calc_sighash(tx, funding_output, path_script);
    sk.sign(&sighash)
}

fn tagged_hash(tag: &[u8]) -> Sha256 {
    let tag_hash = Sha256::digest(tag);
    let mut digest = Sha256::new();
    digest.update(tag_hash);
    digest.update(tag_hash);
    digest
}

/// Produces a Schnorr adaptor signature of `msg` under `sk`, encrypted to
/// `enc_pk`, in the `(R, s_hat, needs_negation)` serialization.
pub fn adaptor_sign(sk: &SigningKey, enc_pk: &XOnlyPublicKey, msg: [u8; 32]) -> Vec<u8> {
    let x: Scalar = **sk.as_nonzero_scalar();
    let p_bytes = sk.verifying_key().to_bytes();

    let t_affine = AffinePoint::decompress(
        k256::FieldBytes::from_slice(&enc_pk.serialize()),
        k256::elliptic_curve::subtle::Choice::from(0u8),
    )
    .unwrap();
    let t = ProjectivePoint::from(t_affine);

    let mut nonce_bytes = [0u8; 32];
    let mut counter = 0u64;
    loop {
        // deterministic nonce stream derived from the message
        let mut hasher = Sha256::new();
        hasher.update(msg);
        hasher.update(p_bytes.as_slice());
        hasher.update(counter.to_be_bytes());
        nonce_bytes.copy_from_slice(&hasher.finalize());
        counter += 1;

        let k = <Scalar as Reduce<U256>>::reduce_bytes(&nonce_bytes.into());
        if k == Scalar::ZERO {
            continue;
        }
        let r_hat = ProjectivePoint::mul_by_generator(&k);
        let r = r_hat + t;
        let r_affine = r.to_affine();
        if r_affine.is_identity().into() {
            continue;
        }
        // keep the even-y form so no negation is needed
        if r_affine.y_is_odd().into() {
            continue;
        }

        let e = <Scalar as Reduce<U256>>::reduce_bytes(
            &tagged_hash(b"BIP0340/challenge")
                .chain_update(r_affine.x())
                .chain_update(p_bytes.as_slice())
                .chain_update(msg)
                .finalize(),
        );
        let s_hat = k + e * x;

        let mut out = Vec::with_capacity(66);
        out.push(0x02);
        out.extend_from_slice(&r_affine.x());
        out.extend_from_slice(&s_hat.to_bytes());
        out.push(0x00);
        return out;
    }
}

/// Computes the block Merkle root and the inclusion branch for the leaf at
/// `index`: pairwise double-SHA256, duplicating an odd tail.
pub fn build_merkle_proof(txs: &[Transaction], index: usize) -> (sha256d::Hash, Vec<Vec<u8>>) {
    let mut level: Vec<sha256d::Hash> = txs.iter().map(|tx| tx.txid().to_raw_hash()).collect();
    let mut branch = vec![];
    let mut idx = index;
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        let sibling = if idx % 2 == 0 {
            level[idx + 1]
        } else {
            level[idx - 1]
        };
        branch.push(sibling[..].to_vec());
        level = level
            .chunks(2)
            .map(|pair| {
                let mut concat = pair[0][..].to_vec();
                concat.extend_from_slice(&pair[1][..]);
                sha256d::Hash::hash(&concat)
            })
            .collect();
        idx /= 2;
    }
    (level[0], branch)
}

/// A Bitcoin header committing to the given Merkle root
pub fn build_btc_header(merkle_root: sha256d::Hash) -> babylon_bitcoin::BlockHeader {
    babylon_bitcoin::BlockHeader {
        version: bitcoin::block::Version::from_consensus(2),
        prev_blockhash: bitcoin::BlockHash::all_zeros(),
        merkle_root: TxMerkleNode::from_raw_hash(merkle_root),
        time: 1_700_000_000,
        bits: bitcoin::CompactTarget::from_consensus(0x207f_ffff),
        nonce: 0,
    }
}

/// A filler transaction with a recognisable output value
pub fn filler_tx(tag: u64) -> Transaction {
    Transaction {
        version: Version(2),
        lock_time: LockTime::ZERO,
        input: vec![],
        output: vec![TxOut {
            value: Amount::from_sat(tag),
            script_pubkey: ScriptBuf::new(),
        }],
    }
}

fn tx_in(txid: Txid, vout: u32) -> TxIn {
    TxIn {
        previous_output: OutPoint { txid, vout },
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    }
}

/// A full, mutually consistent staking transaction set: staking, slashing,
/// unbonding and unbonding-slashing txs, together with the keys and script
/// paths needed to sign and verify them.
pub struct StakingTestData {
    pub staker_sk: SigningKey,
    pub staker_pk: XOnlyPublicKey,
    pub fp_sks: Vec<SigningKey>,
    pub fp_pks: Vec<XOnlyPublicKey>,
    pub covenant_sks: Vec<SigningKey>,
    pub covenant_pks: Vec<XOnlyPublicKey>,
    pub covenant_quorum: u32,
    pub staking_value: u64,
    pub staking_time: u16,
    pub unbonding_time: u16,
    pub unbonding_fee: u64,
    pub slashing_pk_script: ScriptBuf,
    pub staking_tx: Transaction,
    pub slashing_tx: Transaction,
    pub unbonding_tx: Transaction,
    pub unbonding_slashing_tx: Transaction,
    /// Script paths of the staking output
    pub script_paths: StakingScriptPaths,
    /// Script paths of the unbonding output
    pub unbonding_script_paths: StakingScriptPaths,
}

impl StakingTestData {
    pub fn new(rng: &mut impl RngCore, num_covenant: usize, covenant_quorum: u32) -> Self {
        Self::with_fps(rng, 2, num_covenant, covenant_quorum)
    }

    pub fn with_fps(
        rng: &mut impl RngCore,
        num_fps: usize,
        num_covenant: usize,
        covenant_quorum: u32,
    ) -> Self {
        let (staker_sk, staker_pk) = new_keypair(rng);
        let (fp_sks, fp_pks): (Vec<_>, Vec<_>) = (0..num_fps).map(|_| new_keypair(rng)).unzip();
        let (covenant_sks, covenant_pks): (Vec<_>, Vec<_>) =
            (0..num_covenant).map(|_| new_keypair(rng)).unzip();

        let staking_value: u64 = 200_000_000;
        let staking_time: u16 = 1000;
        let unbonding_time: u16 = 201;
        let unbonding_fee: u64 = 2_000;
        let slashing_rate = 10; // percent
        let slashing_fee: u64 = 2_000;

        let slashing_pk_script = ScriptBuf::from_bytes(
            hex::decode("76a914010101010101010101010101010101010101010188ac").unwrap(),
        );

        let script_paths = StakingScriptPaths::new(
            &staker_pk,
            &fp_pks,
            &covenant_pks,
            covenant_quorum as usize,
            staking_time,
        )
        .unwrap();
        let unbonding_script_paths = StakingScriptPaths::new(
            &staker_pk,
            &fp_pks,
            &covenant_pks,
            covenant_quorum as usize,
            unbonding_time,
        )
        .unwrap();

        // the staking output commitment itself is not inspected by the
        // validation paths, only its value and position
        let staking_tx = Transaction {
            version: Version(2),
            lock_time: LockTime::ZERO,
            input: vec![tx_in(Txid::all_zeros(), 7)],
            output: vec![TxOut {
                value: Amount::from_sat(staking_value),
                script_pubkey: script_paths.time_lock_path_script.clone(),
            }],
        };
        let staking_txid = staking_tx.txid();

        let slashing_change_script = babylon_btcstaking::scripts::build_relative_time_lock_pk_script(
            &staker_pk,
            unbonding_time,
            bitcoin::Network::Regtest,
        )
        .unwrap();

        let slashed_amount = staking_value * slashing_rate / 100;
        let slashing_tx = Transaction {
            version: Version(2),
            lock_time: LockTime::ZERO,
            input: vec![tx_in(staking_txid, 0)],
            output: vec![
                TxOut {
                    value: Amount::from_sat(slashed_amount),
                    script_pubkey: slashing_pk_script.clone(),
                },
                TxOut {
                    value: Amount::from_sat(staking_value - slashed_amount - slashing_fee),
                    script_pubkey: slashing_change_script.clone(),
                },
            ],
        };

        let unbonding_value = staking_value - unbonding_fee;
        let unbonding_tx = Transaction {
            version: Version(2),
            lock_time: LockTime::ZERO,
            input: vec![tx_in(staking_txid, 0)],
            output: vec![TxOut {
                value: Amount::from_sat(unbonding_value),
                script_pubkey: unbonding_script_paths.time_lock_path_script.clone(),
            }],
        };
        let unbonding_txid = unbonding_tx.txid();

        let unbonding_slashed_amount = unbonding_value * slashing_rate / 100;
        let unbonding_slashing_tx = Transaction {
            version: Version(2),
            lock_time: LockTime::ZERO,
            input: vec![tx_in(unbonding_txid, 0)],
            output: vec![
                TxOut {
                    value: Amount::from_sat(unbonding_slashed_amount),
                    script_pubkey: slashing_pk_script.clone(),
                },
                TxOut {
                    value: Amount::from_sat(
                        unbonding_value - unbonding_slashed_amount - slashing_fee,
                    ),
                    script_pubkey: slashing_change_script,
                },
            ],
        };

        StakingTestData {
            staker_sk,
            staker_pk,
            fp_sks,
            fp_pks,
            covenant_sks,
            covenant_pks,
            covenant_quorum,
            staking_value,
            staking_time,
            unbonding_time,
            unbonding_fee,
            slashing_pk_script,
            staking_tx,
            slashing_tx,
            unbonding_tx,
            unbonding_slashing_tx,
            script_paths,
            unbonding_script_paths,
        }
    }

    pub fn staking_output(&self) -> TxOut {
        self.staking_tx.output[0].clone()
    }

    pub fn unbonding_output(&self) -> TxOut {
        self.unbonding_tx.output[0].clone()
    }

    pub fn staking_tx_hash_hex(&self) -> String {
        self.staking_tx.txid().to_string()
    }

    /// The staker's hex-encoded BIP-340 public key
    pub fn staker_pk_hex(&self) -> String {
        hex::encode(self.staker_pk.serialize())
    }

    /// Hex-encoded BIP-340 public keys of the finality providers
    pub fn fp_pk_hex(&self, i: usize) -> String {
        hex::encode(self.fp_pks[i].serialize())
    }

    /// Hex-encoded BIP-340 public keys of the covenant committee
    pub fn covenant_pk_hex(&self, i: usize) -> String {
        hex::encode(self.covenant_pks[i].serialize())
    }
}
