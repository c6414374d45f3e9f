//! Foundation types for the Freight Token Ledger (FTL).
//!
//! Every other FTL crate depends on `ftl-types`.
//!
//! # Key Types
//!
//! - [`ParticipantId`]: validated identifier of a marketplace participant
//! - [`TokenId`]: validated identifier of a token (ERC-1155 style id)
//! - [`BookingId`]: validated identifier of a freight booking
//! - [`Amount`]: unsigned token quantity; all arithmetic on it is checked
//! - [`OperationId`]: UUID v7 identifier stamped on each recorded operation
//! - [`Timestamp`]: wall-clock milliseconds since the UNIX epoch
//! - [`Clock`]: injectable time source ([`SystemClock`], [`ManualClock`])

pub mod error;
pub mod identity;
pub mod temporal;

pub use error::TypeError;
pub use identity::{BookingId, OperationId, ParticipantId, TokenId, MAX_IDENTIFIER_LEN};
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};

/// Token quantity. Balances, escrow, allowances and supply are all `Amount`s.
pub type Amount = u64;
