//! Audited ledger operations for the Freight Token Ledger (FTL).
//!
//! [`LedgerRecorder`] is the entry point collaborators call. Each operation
//! runs as one guarded unit:
//!
//! 1. validate the raw inputs into typed identifiers and amounts,
//! 2. mutate the [`TokenLedger`](ftl_tokens::TokenLedger),
//! 3. append a JSON [`AuditRecord`] to the [`Chain`](ftl_chain::Chain),
//! 4. publish a [`LedgerEvent`](ftl_fabric::LedgerEvent) on the bus.
//!
//! If the append fails the mutation is rolled back before the guard is
//! released, so the token state never diverges from the audit chain.

pub mod audit;
pub mod config;
pub mod error;
pub mod recorder;
pub mod validation;

pub use audit::{AuditOp, AuditRecord};
pub use config::{AuditFailurePolicy, ConfigError, LedgerConfig, RecorderConfig};
pub use error::RecorderError;
pub use recorder::{LedgerRecorder, Receipt};
