pub mod amount;
pub mod config;
pub mod csv;
pub mod engine;
pub mod gateway;
pub mod model;
pub mod service;

pub use amount::Amount;
pub use config::EscrowConfig;
pub use engine::EscrowEngine;
pub use model::{EscrowStatus, EscrowTransaction, Operation, ProductId, TxId, UserId};
pub use service::EscrowService;
