use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ftl_fabric::{EventKind, EventPayload};
use ftl_types::{Amount, BookingId, OperationId, ParticipantId, Timestamp, TokenId};

/// A recorded ledger operation with its arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditOp {
    Mint {
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
    Approve {
        owner: ParticipantId,
        spender: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
    TransferFrom {
        owner: ParticipantId,
        spender: ParticipantId,
        to: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
    BatchTransfer {
        from: ParticipantId,
        to: ParticipantId,
        amounts: BTreeMap<TokenId, Amount>,
    },
    LockEscrow {
        participant: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
    ReleaseEscrow {
        participant: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
    RefundEscrow {
        participant: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
    /// Token payment for a confirmed freight booking.
    PayBooking {
        booking_id: BookingId,
        payer: ParticipantId,
        payee: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
}

impl AuditOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mint { .. } => "mint",
            Self::Transfer { .. } => "transfer",
            Self::Approve { .. } => "approve",
            Self::TransferFrom { .. } => "transfer_from",
            Self::BatchTransfer { .. } => "batch_transfer",
            Self::LockEscrow { .. } => "lock_escrow",
            Self::ReleaseEscrow { .. } => "release_escrow",
            Self::RefundEscrow { .. } => "refund_escrow",
            Self::PayBooking { .. } => "pay_booking",
        }
    }

    /// The bus event announcing this operation.
    pub fn event(&self) -> (EventKind, EventPayload) {
        match self.clone() {
            Self::Mint {
                participant,
                token,
                amount,
            } => (
                EventKind::Minted,
                EventPayload::Account {
                    participant,
                    token,
                    amount,
                },
            ),
            Self::Transfer {
                from,
                to,
                token,
                amount,
            } => (
                EventKind::Transferred,
                EventPayload::Transfer {
                    from,
                    to,
                    token,
                    amount,
                },
            ),
            Self::Approve {
                owner,
                spender,
                token,
                amount,
            } => (
                EventKind::Approved,
                EventPayload::Allowance {
                    owner,
                    spender,
                    token,
                    amount,
                },
            ),
            Self::TransferFrom {
                owner,
                spender,
                to,
                token,
                amount,
            } => (
                EventKind::TransferredFrom,
                EventPayload::Delegated {
                    owner,
                    spender,
                    to,
                    token,
                    amount,
                },
            ),
            Self::BatchTransfer { from, to, amounts } => (
                EventKind::BatchTransferred,
                EventPayload::Batch { from, to, amounts },
            ),
            Self::LockEscrow {
                participant,
                token,
                amount,
            } => (
                EventKind::EscrowLocked,
                EventPayload::Account {
                    participant,
                    token,
                    amount,
                },
            ),
            Self::ReleaseEscrow {
                participant,
                token,
                amount,
            } => (
                EventKind::EscrowReleased,
                EventPayload::Account {
                    participant,
                    token,
                    amount,
                },
            ),
            Self::RefundEscrow {
                participant,
                token,
                amount,
            } => (
                EventKind::EscrowRefunded,
                EventPayload::Account {
                    participant,
                    token,
                    amount,
                },
            ),
            Self::PayBooking {
                booking_id,
                payer,
                payee,
                token,
                amount,
            } => (
                EventKind::BookingPaid,
                EventPayload::Booking {
                    booking_id,
                    payer,
                    payee,
                    token,
                    amount,
                },
            ),
        }
    }
}

/// The payload of one audit block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub operation_id: OperationId,
    pub recorded_at: Timestamp,
    pub op: AuditOp,
}

impl AuditRecord {
    pub fn new(operation_id: OperationId, recorded_at: Timestamp, op: AuditOp) -> Self {
        Self {
            operation_id,
            recorded_at,
            op,
        }
    }

    /// Encode as the JSON block payload.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
