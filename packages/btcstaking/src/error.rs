use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Transaction must have {0} inputs, got {1}")]
    TxInputCountMismatch(usize, usize),
    #[error("Transaction must have {0} outputs, got {1}")]
    TxOutputCountMismatch(usize, usize),
    #[error("Transaction must not be replaceable")]
    TxIsReplaceable {},
    #[error("Transaction must not have a locktime")]
    TxHasLockTime {},
    #[error("Transaction contains dust outputs")]
    TxContainsDust {},
    #[error("Transaction {0} must spend the staking output")]
    TxDoesNotSpendStakingOutput(String),
    #[error("Slashing rate must be in the (0,1) range with at most 2 decimal places")]
    InvalidSlashingRate {},
    #[error("Slashing tx must slash at least {0} satoshis")]
    InsufficientSlashingAmount(u64),
    #[error("Slashing tx must pay to the provided slashing pk script")]
    WrongSlashingPkScript {},
    #[error("Invalid slashing tx change output script")]
    WrongSlashingChangeScript {},
    #[error("Slashing tx min fee must be larger than 0")]
    ZeroSlashingTxFee {},
    #[error("Transaction fee {0} is below the minimum {1}")]
    InsufficientTxFee(u64, u64),
    #[error("Transaction output value exceeds its input value")]
    TxOverspends {},
    #[error("Invalid funding output index {0}, tx has {1} outputs")]
    InvalidFundingOutputIndex(u32, usize),
    #[error("Unbonding output value must be {0} satoshis, got {1}")]
    WrongUnbondingOutputValue(u64, u64),
    #[error("Multisig script requires at least 2 keys")]
    InsufficientMultisigKeys {},
    #[error("Duplicate keys in multisig script")]
    DuplicateKeys {},
    #[error("Quorum cannot exceed the number of keys")]
    QuorumExceedsKeyCount {},
    #[error("Failed to add leaf to the taproot tree")]
    AddLeafFailed {},
    #[error("Failed to finalize the taproot tree")]
    FinalizeTaprootFailed {},
    #[error("Malformed adaptor signature: expected {0} bytes, got {1}")]
    MalformedAdaptorSignature(usize, usize),
    #[error("Invalid first byte of an adaptor signature: {0}")]
    InvalidAdaptorSignatureFirstByte(u8),
    #[error("Failed to decompress a secp256k1 point")]
    DecompressPointFailed {},
    #[error("Failed to parse a secp256k1 scalar")]
    FailedToParseScalar {},
    #[error("Point {0} is at infinity")]
    PointAtInfinity(String),
    #[error("Point {0} has an odd y coordinate")]
    PointWithOddY(String),
    #[error("Adaptor signature verification failed")]
    VerifyAdaptorSigFailed {},
    #[error("Failed to parse a public key: {0}")]
    FailedToParsePublicKey(String),
    #[error("Invalid Schnorr signature: {0}")]
    InvalidSchnorrSignature(String),
    #[error("No valid Schnorr signature of the staker in the witness")]
    NoStakerSigInWitness {},
}
