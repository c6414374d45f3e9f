use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use ftl_types::{Amount, BookingId, OperationId, ParticipantId, Timestamp, TokenId};

/// Content-addressed identifier of a ledger event: the BLAKE3 hash of its
/// fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub hash: [u8; 32],
}

impl EventId {
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self { hash }
    }

    /// Short hex representation (first 8 hex chars).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.hash[..4])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt:{}", self.short_hex())
    }
}

/// What happened on the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Minted,
    Transferred,
    Approved,
    TransferredFrom,
    BatchTransferred,
    EscrowLocked,
    EscrowReleased,
    EscrowRefunded,
    /// A freight booking was paid in tokens.
    BookingPaid,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Minted => "Minted",
            Self::Transferred => "Transferred",
            Self::Approved => "Approved",
            Self::TransferredFrom => "TransferredFrom",
            Self::BatchTransferred => "BatchTransferred",
            Self::EscrowLocked => "EscrowLocked",
            Self::EscrowReleased => "EscrowReleased",
            Self::EscrowRefunded => "EscrowRefunded",
            Self::BookingPaid => "BookingPaid",
        };
        write!(f, "{s}")
    }
}

/// Arguments of the operation an event announces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    /// Supply change or escrow movement on one account.
    Account {
        participant: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
    Transfer {
        from: ParticipantId,
        to: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
    Allowance {
        owner: ParticipantId,
        spender: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
    Delegated {
        owner: ParticipantId,
        spender: ParticipantId,
        to: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
    Batch {
        from: ParticipantId,
        to: ParticipantId,
        amounts: BTreeMap<TokenId, Amount>,
    },
    Booking {
        booking_id: BookingId,
        payer: ParticipantId,
        payee: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
}

impl EventPayload {
    /// Every participant the operation touched.
    pub fn participants(&self) -> Vec<&ParticipantId> {
        match self {
            Self::Account { participant, .. } => vec![participant],
            Self::Transfer { from, to, .. } | Self::Batch { from, to, .. } => vec![from, to],
            Self::Allowance { owner, spender, .. } => vec![owner, spender],
            Self::Delegated {
                owner, spender, to, ..
            } => vec![owner, spender, to],
            Self::Booking { payer, payee, .. } => vec![payer, payee],
        }
    }

    /// Every token the operation touched.
    pub fn tokens(&self) -> Vec<&TokenId> {
        match self {
            Self::Account { token, .. }
            | Self::Transfer { token, .. }
            | Self::Allowance { token, .. }
            | Self::Delegated { token, .. }
            | Self::Booking { token, .. } => vec![token],
            Self::Batch { amounts, .. } => amounts.keys().collect(),
        }
    }
}

/// A single event flowing through the bus.
///
/// `sequence` starts at 1 and increases by one per published event. The id
/// is a BLAKE3 hash over the operation id, sequence, timestamp, kind and
/// payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub id: EventId,
    pub sequence: u64,
    pub timestamp: Timestamp,
    /// The recorded operation this event announces.
    pub operation_id: OperationId,
    pub kind: EventKind,
    pub payload: EventPayload,
}

impl LedgerEvent {
    /// Build an event, computing its integrity id.
    pub fn new(
        sequence: u64,
        timestamp: Timestamp,
        operation_id: OperationId,
        kind: EventKind,
        payload: EventPayload,
    ) -> Self {
        let id = EventId::from_hash(Self::compute_integrity(
            sequence,
            &timestamp,
            &operation_id,
            &kind,
            &payload,
        ));
        Self {
            id,
            sequence,
            timestamp,
            operation_id,
            kind,
            payload,
        }
    }

    /// Returns `true` if the id still matches the event's fields.
    pub fn verify_integrity(&self) -> bool {
        let expected = Self::compute_integrity(
            self.sequence,
            &self.timestamp,
            &self.operation_id,
            &self.kind,
            &self.payload,
        );
        self.id.hash == expected
    }

    fn compute_integrity(
        sequence: u64,
        timestamp: &Timestamp,
        operation_id: &OperationId,
        kind: &EventKind,
        payload: &EventPayload,
    ) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"ftl-ledger-event-v1:");
        hasher.update(&sequence.to_be_bytes());
        hasher.update(&timestamp.to_be_bytes());
        hasher.update(operation_id.as_uuid().as_bytes());

        if let Ok(kind_bytes) = bincode::serialize(kind) {
            hasher.update(&kind_bytes);
        }
        if let Ok(payload_bytes) = bincode::serialize(payload) {
            hasher.update(&payload_bytes);
        }

        *hasher.finalize().as_bytes()
    }
}
