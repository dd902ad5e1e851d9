pub mod contract;
pub mod error;
pub mod msg;
pub mod queries;
pub mod rewards;
pub mod state;
