//! Token accounting for the Freight Token Ledger (FTL).
//!
//! [`TokenLedger`] tracks, per participant and token, an available balance
//! and an escrowed (locked) amount, plus spender allowances and the total
//! supply of every token. All operations are linearizable: mutations take
//! one exclusive lock, reads a shared one.
//!
//! Supply is conserved: only [`TokenLedger::mint`] creates tokens and only
//! [`TokenLedger::burn`] destroys them. Every other operation moves amounts
//! between balances, or between a participant's balance and escrow.

pub mod error;
pub mod ledger;

pub use error::TokenError;
pub use ledger::{Position, TokenLedger};
