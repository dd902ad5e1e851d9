use crate::adaptor_sig::AdaptorSignature;
use crate::error::Error;
use crate::Result;
use bitcoin::hashes::Hash;
use bitcoin::sighash::{Prevouts, SighashCache};
use bitcoin::{Script, Transaction, TxOut, XOnlyPublicKey};
use k256::schnorr::signature::Verifier;
use k256::schnorr::Signature as SchnorrSignature;
use k256::schnorr::VerifyingKey;

/// Computes the taproot script-spend sighash of a one-input transaction
/// spending `funding_output` via `path_script`.
fn calc_sighash(
    transaction: &Transaction,
    funding_output: &TxOut,
    path_script: &Script,
) -> Result<[u8; 32]> {
    if transaction.input.len() != 1 {
        return Err(Error::TxInputCountMismatch(1, transaction.input.len()));
    }

    let tap_leaf_hash = path_script.tapscript_leaf_hash();

    let mut sighash_cache = SighashCache::new(transaction);
    let sighash = sighash_cache
        .taproot_script_spend_signature_hash(
            0,
            &Prevouts::All(&[funding_output]),
            tap_leaf_hash,
            bitcoin::TapSighashType::Default,
        )
        .map_err(|e| Error::InvalidSchnorrSignature(e.to_string()))?;

    Ok(sighash.to_raw_hash().to_byte_array())
}

/// Verifies a Schnorr signature over the given spending path of a
/// transaction.
pub fn verify_transaction_sig_with_output(
    transaction: &Transaction,
    funding_output: &TxOut,
    path_script: &Script,
    pub_key: &XOnlyPublicKey,
    signature: &SchnorrSignature,
) -> Result<()> {
    let sighash = calc_sighash(transaction, funding_output, path_script)?;
    let verifying_key = VerifyingKey::from_bytes(&pub_key.serialize())
        .map_err(|e| Error::FailedToParsePublicKey(e.to_string()))?;
    verifying_key
        .verify(&sighash, signature)
        .map_err(|e| Error::InvalidSchnorrSignature(e.to_string()))
}

/// Verifies a Schnorr adaptor signature over the given spending path of a
/// transaction, with `enc_key` as the encryption key.
pub fn enc_verify_transaction_sig_with_output(
    transaction: &Transaction,
    funding_output: &TxOut,
    path_script: &Script,
    pub_key: &XOnlyPublicKey,
    enc_key: &XOnlyPublicKey,
    signature: &AdaptorSignature,
) -> Result<()> {
    let sighash_msg = calc_sighash(transaction, funding_output, path_script)?;

    let pub_key = VerifyingKey::from_bytes(&pub_key.serialize())
        .map_err(|e| Error::FailedToParsePublicKey(e.to_string()))?;
    let enc_key = VerifyingKey::from_bytes(&enc_key.serialize())
        .map_err(|e| Error::FailedToParsePublicKey(e.to_string()))?;
    signature.verify(&pub_key, &enc_key, sighash_msg)
}

/// Searches the witness of a spending transaction's only input for a 64-byte
/// element that is a valid Schnorr signature of the staker over the given
/// spending path. Used to confirm that an on-chain stake spend was indeed
/// authorised by the staker.
pub fn find_staker_sig_in_witness(
    spending_tx: &Transaction,
    funding_output: &TxOut,
    path_script: &Script,
    staker_pk: &XOnlyPublicKey,
) -> Result<SchnorrSignature> {
    if spending_tx.input.len() != 1 {
        return Err(Error::TxInputCountMismatch(1, spending_tx.input.len()));
    }
    for elem in spending_tx.input[0].witness.iter() {
        // BIP-341 signatures are 64 bytes, or 65 with an explicit sighash type
        let sig_bytes = match elem.len() {
            64 => elem,
            65 => &elem[..64],
            _ => continue,
        };
        let Ok(sig) = SchnorrSignature::try_from(sig_bytes) else {
            continue;
        };
        if verify_transaction_sig_with_output(
            spending_tx,
            funding_output,
            path_script,
            staker_pk,
            &sig,
        )
        .is_ok()
        {
            return Ok(sig);
        }
    }
    Err(Error::NoStakerSigInWitness {})
}
