//! Event bus for the Freight Token Ledger.
//!
//! Every audited ledger operation is announced as a [`LedgerEvent`] on an
//! [`EventBus`]. Events carry a gap-free sequence number and a BLAKE3
//! integrity id, and are fanned out to a bounded set of filtered
//! subscribers over per-subscriber broadcast channels.
//!
//! Publishing never blocks on slow subscribers: a subscriber that falls
//! more than `channel_capacity` events behind loses the oldest ones and
//! sees `Lagged` on its next receive.

pub mod bus;
pub mod error;
pub mod event;

pub use bus::{BusConfig, EventBus, EventFilter, EventStream};
pub use error::FabricError;
pub use event::{EventId, EventKind, EventPayload, LedgerEvent};
