pub mod adaptor_sig;
pub mod error;
pub mod scripts;
pub mod sig_verify;
pub mod tx_verify;

pub type Result<T> = std::result::Result<T, error::Error>;
