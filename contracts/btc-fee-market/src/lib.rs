pub mod contract;
pub mod error;
pub mod feemarket;
pub mod msg;
pub mod state;
