//! Core domain logic: cache, ledger, and the engine facade

pub mod cache;
pub mod engine;
pub mod ledger;

pub use cache::RecordCache;
pub use engine::RegistrarEngine;
pub use ledger::{LedgerEngine, SettlementDecision};
