use crate::error::Error;
use crate::Result;
use bitcoin::blockdata::opcodes::all::*;
use bitcoin::blockdata::script::Builder;
use bitcoin::key::Secp256k1;
use bitcoin::secp256k1::PublicKey;
use bitcoin::taproot::TaprootBuilder;
use bitcoin::{Address, XOnlyPublicKey};
use bitcoin::{Network, ScriptBuf};

/// The BIP-341 "nothing up my sleeve" point, used as the unspendable
/// key-path internal key of all staking-related taproot outputs
const UNSPENDABLE_KEY: &str = "0250929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0";

fn unspendable_key_path_internal_pub_key() -> XOnlyPublicKey {
    let key_bytes = hex::decode(UNSPENDABLE_KEY).unwrap();
    let (pk_x, _) = PublicKey::from_slice(&key_bytes)
        .unwrap()
        .x_only_public_key();
    pk_x
}

/// Sorts public keys in lexicographical order of their serialization
pub fn sort_keys(keys: &mut [XOnlyPublicKey]) {
    keys.sort_by(|a, b| a.serialize().cmp(&b.serialize()));
}

/// Prepares keys for a multisig script, ensuring there are no duplicates
pub fn prepare_keys_for_multisig_script(keys: &[XOnlyPublicKey]) -> Result<Vec<XOnlyPublicKey>> {
    if keys.len() < 2 {
        return Err(Error::InsufficientMultisigKeys {});
    }

    let mut sorted_keys = keys.to_vec();
    sort_keys(&mut sorted_keys);

    for window in sorted_keys.windows(2) {
        if window[0] == window[1] {
            return Err(Error::DuplicateKeys {});
        }
    }

    Ok(sorted_keys)
}

fn assemble_multisig_script(
    pubkeys: &[XOnlyPublicKey],
    quorum: usize,
    with_verify: bool,
) -> Result<ScriptBuf> {
    if quorum > pubkeys.len() {
        return Err(Error::QuorumExceedsKeyCount {});
    }

    let mut builder = Builder::new();
    for (i, key) in pubkeys.iter().enumerate() {
        builder = builder.push_slice(key.serialize());
        if i == 0 {
            builder = builder.push_opcode(OP_CHECKSIG);
        } else {
            builder = builder.push_opcode(OP_CHECKSIGADD);
        }
    }

    builder = builder.push_int(quorum as i64);
    if with_verify {
        builder = builder.push_opcode(OP_NUMEQUALVERIFY);
    } else {
        builder = builder.push_opcode(OP_NUMEQUAL);
    }

    Ok(builder.into_script())
}

/// Creates an m-of-n multisig script over the given keys
pub fn build_multisig_script(
    keys: &[XOnlyPublicKey],
    quorum: usize,
    with_verify: bool,
) -> Result<ScriptBuf> {
    let prepared_keys = prepare_keys_for_multisig_script(keys)?;
    assemble_multisig_script(&prepared_keys, quorum, with_verify)
}

/// Creates a CSV timelock script for the given key
pub fn build_time_lock_script(pub_key: &XOnlyPublicKey, lock_time: u16) -> Result<ScriptBuf> {
    let builder = Builder::new()
        .push_slice(pub_key.serialize())
        .push_opcode(OP_CHECKSIGVERIFY)
        .push_int(lock_time as i64)
        .push_opcode(OP_CSV);
    Ok(builder.into_script())
}

/// Creates a single-key signature script
pub fn build_single_key_sig_script(
    pub_key: &XOnlyPublicKey,
    with_verify: bool,
) -> Result<ScriptBuf> {
    let mut builder = Builder::new().push_slice(pub_key.serialize());

    if with_verify {
        builder = builder.push_opcode(OP_CHECKSIGVERIFY);
    } else {
        builder = builder.push_opcode(OP_CHECKSIG);
    }

    Ok(builder.into_script())
}

/// Builds the taproot pk script of a single-leaf tree holding a CSV
/// timelock script for `pk`. Slashing change outputs must pay to this.
pub fn build_relative_time_lock_pk_script(
    pk: &XOnlyPublicKey,
    lock_time: u16,
    network: Network,
) -> Result<ScriptBuf> {
    let secp = Secp256k1::new();
    let internal_key = unspendable_key_path_internal_pub_key();
    let script = build_time_lock_script(pk, lock_time)?;

    let builder = TaprootBuilder::new()
        .add_leaf(0, script)
        .map_err(|_| Error::AddLeafFailed {})?;
    let taproot_spend_info = builder
        .finalize(&secp, internal_key)
        .map_err(|_| Error::FinalizeTaprootFailed {})?;

    let secp = Secp256k1::verification_only();
    let taproot_address = Address::p2tr(
        &secp,
        taproot_spend_info.internal_key(),
        taproot_spend_info.merkle_root(),
        network,
    );

    Ok(taproot_address.script_pubkey())
}

fn aggregate_scripts(scripts: &[ScriptBuf]) -> ScriptBuf {
    let mut final_script = Vec::new();
    for script in scripts {
        final_script.extend_from_slice(script.as_bytes());
    }
    ScriptBuf::from_bytes(final_script)
}

/// The script paths of a staking (or unbonding) output:
/// normal time-lock expiry, on-demand early unbonding, and slashing.
pub struct StakingScriptPaths {
    // <Staker_PK> OP_CHECKSIGVERIFY <Lock_Time_Blocks> OP_CHECKSEQUENCEVERIFY
    pub time_lock_path_script: ScriptBuf,
    // <Staker_PK> OP_CHECKSIGVERIFY
    // <Covenant_PK1> OP_CHECKSIG ... <Covenant_PKN> OP_CHECKSIGADD M OP_NUMEQUAL
    pub unbonding_path_script: ScriptBuf,
    // <Staker_PK> OP_CHECKSIGVERIFY
    // <FP_PK1> OP_CHECKSIG ... <FP_PKN> OP_CHECKSIGADD 1 OP_NUMEQUALVERIFY
    // <Covenant_PK1> OP_CHECKSIG ... <Covenant_PKN> OP_CHECKSIGADD M OP_NUMEQUAL
    pub slashing_path_script: ScriptBuf,
}

impl StakingScriptPaths {
    pub fn new(
        staker_key: &XOnlyPublicKey,
        fp_keys: &[XOnlyPublicKey],
        covenant_keys: &[XOnlyPublicKey],
        covenant_quorum: usize,
        lock_time: u16,
    ) -> Result<Self> {
        let time_lock_path_script = build_time_lock_script(staker_key, lock_time)?;
        let covenant_multisig_script =
            build_multisig_script(covenant_keys, covenant_quorum, false)?;
        let staker_sig_script = build_single_key_sig_script(staker_key, true)?;
        let fp_script = if fp_keys.len() == 1 {
            build_single_key_sig_script(&fp_keys[0], true)?
        } else {
            build_multisig_script(fp_keys, 1, true)?
        };
        let unbonding_path_script =
            aggregate_scripts(&[staker_sig_script.clone(), covenant_multisig_script.clone()]);
        let slashing_path_script =
            aggregate_scripts(&[staker_sig_script, fp_script, covenant_multisig_script]);

        Ok(StakingScriptPaths {
            time_lock_path_script,
            unbonding_path_script,
            slashing_path_script,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};

    fn generate_public_key(data: &[u8]) -> XOnlyPublicKey {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(data).expect("slice with correct length");
        let (pk_x, _) = PublicKey::from_secret_key(&secp, &secret_key).x_only_public_key();
        pk_x
    }

    #[test]
    fn test_sort_keys() {
        let mut keys = vec![
            generate_public_key(&[1; 32]),
            generate_public_key(&[2; 32]),
            generate_public_key(&[3; 32]),
        ];

        sort_keys(&mut keys);

        let serialized_keys: Vec<Vec<u8>> =
            keys.iter().map(|key| key.serialize().to_vec()).collect();
        assert!(
            serialized_keys.windows(2).all(|w| w[0] <= w[1]),
            "Keys should be sorted lexicographically"
        );
    }

    #[test]
    fn test_multisig_script_rejects_duplicates() {
        let keys = vec![generate_public_key(&[1; 32]), generate_public_key(&[1; 32])];
        let err = build_multisig_script(&keys, 2, false).unwrap_err();
        assert_eq!(err, Error::DuplicateKeys {});
    }

    #[test]
    fn test_multisig_script_rejects_excess_quorum() {
        let keys = vec![generate_public_key(&[1; 32]), generate_public_key(&[2; 32])];
        let err = build_multisig_script(&keys, 3, false).unwrap_err();
        assert_eq!(err, Error::QuorumExceedsKeyCount {});
    }
}
