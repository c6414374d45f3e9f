use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn, Span};

use ftl_chain::{BlockRef, Chain, ChainError, ChainReader, ChainValidator, ChainWriter, ValidationReport};
use ftl_fabric::EventBus;
use ftl_tokens::{TokenError, TokenLedger};
use ftl_types::{Amount, Clock, OperationId, ParticipantId, SystemClock, TokenId};

use crate::audit::{AuditOp, AuditRecord};
use crate::config::{AuditFailurePolicy, LedgerConfig, RecorderConfig};
use crate::error::{RecorderError, RecorderResult};
use crate::validation;

/// Proof that an operation was applied and audited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub operation_id: OperationId,
    /// The audit block holding the operation's record.
    pub block: BlockRef,
}

/// Validated, audited front door to a token ledger and its audit chain.
///
/// Every operation holds one exclusive guard from validation through event
/// publication, so two operations never interleave their mutation and
/// audit steps, and events go out in block order.
pub struct LedgerRecorder {
    chain: Arc<Chain>,
    tokens: Arc<TokenLedger>,
    bus: EventBus,
    config: RecorderConfig,
    clock: Arc<dyn Clock>,
    span: Span,
    guard: Mutex<()>,
}

/// Inverse of one applied token mutation.
enum Undo {
    Burn {
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
    Batch {
        from: ParticipantId,
        to: ParticipantId,
        amounts: BTreeMap<TokenId, Amount>,
    },
    Lock {
        participant: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
    Release {
        participant: ParticipantId,
        token: TokenId,
        amount: Amount,
    },
}

impl Undo {
    fn apply(&self, tokens: &TokenLedger) -> Result<(), TokenError> {
        match self {
            Self::Burn {
                participant,
                token,
                amount,
            } => tokens.burn(participant, token, *amount),
            Self::Transfer {
                from,
                to,
                token,
                amount,
            } => tokens.transfer(from, to, token, *amount),
            Self::Approve {
                owner,
                spender,
                token,
                amount,
            } => tokens.approve(owner, spender, token, *amount).map(drop),
            Self::Batch { from, to, amounts } => tokens.batch_transfer(from, to, amounts),
            Self::Lock {
                participant,
                token,
                amount,
            } => tokens.lock_escrow(participant, token, *amount),
            Self::Release {
                participant,
                token,
                amount,
            } => tokens.release_escrow(participant, token, *amount),
        }
    }
}

/// Apply `op` to the token ledger and return the steps that revert it.
fn execute(tokens: &TokenLedger, op: &AuditOp) -> Result<Vec<Undo>, TokenError> {
    let undo = match op.clone() {
        AuditOp::Mint {
            participant,
            token,
            amount,
        } => {
            tokens.mint(&participant, &token, amount)?;
            vec![Undo::Burn {
                participant,
                token,
                amount,
            }]
        }
        AuditOp::Transfer {
            from,
            to,
            token,
            amount,
        }
        | AuditOp::PayBooking {
            payer: from,
            payee: to,
            token,
            amount,
            ..
        } => {
            tokens.transfer(&from, &to, &token, amount)?;
            vec![Undo::Transfer {
                from: to,
                to: from,
                token,
                amount,
            }]
        }
        AuditOp::Approve {
            owner,
            spender,
            token,
            amount,
        } => {
            let previous = tokens.approve(&owner, &spender, &token, amount)?;
            vec![Undo::Approve {
                owner,
                spender,
                token,
                amount: previous,
            }]
        }
        AuditOp::TransferFrom {
            owner,
            spender,
            to,
            token,
            amount,
        } => {
            let allowance = tokens.allowance(&owner, &spender, &token)?;
            tokens.transfer_from(&owner, &spender, &to, &token, amount)?;
            vec![
                Undo::Transfer {
                    from: to,
                    to: owner.clone(),
                    token: token.clone(),
                    amount,
                },
                Undo::Approve {
                    owner,
                    spender,
                    token,
                    amount: allowance,
                },
            ]
        }
        AuditOp::BatchTransfer { from, to, amounts } => {
            tokens.batch_transfer(&from, &to, &amounts)?;
            vec![Undo::Batch {
                from: to,
                to: from,
                amounts,
            }]
        }
        AuditOp::LockEscrow {
            participant,
            token,
            amount,
        } => {
            tokens.lock_escrow(&participant, &token, amount)?;
            vec![Undo::Release {
                participant,
                token,
                amount,
            }]
        }
        AuditOp::ReleaseEscrow {
            participant,
            token,
            amount,
        } => {
            tokens.release_escrow(&participant, &token, amount)?;
            vec![Undo::Lock {
                participant,
                token,
                amount,
            }]
        }
        AuditOp::RefundEscrow {
            participant,
            token,
            amount,
        } => {
            tokens.refund_escrow(&participant, &token, amount)?;
            vec![Undo::Lock {
                participant,
                token,
                amount,
            }]
        }
    };
    Ok(undo)
}

impl LedgerRecorder {
    /// Build a chain, token ledger and bus from `config`, using the system
    /// clock.
    pub fn new(config: LedgerConfig) -> RecorderResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`LedgerRecorder::new`], with every component reading `clock`.
    pub fn with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> RecorderResult<Self> {
        config.validate()?;
        let chain = Chain::with_config(config.chain, Arc::clone(&clock))?;
        let bus = EventBus::new(config.bus)?.with_clock(Arc::clone(&clock));
        Ok(Self::from_parts(
            Arc::new(chain),
            Arc::new(TokenLedger::new()),
            bus,
            config.recorder,
        ))
    }

    /// Assemble a recorder over existing components. Audit records are
    /// stamped with the chain's clock.
    pub fn from_parts(
        chain: Arc<Chain>,
        tokens: Arc<TokenLedger>,
        bus: EventBus,
        config: RecorderConfig,
    ) -> Self {
        Self {
            clock: chain.clock(),
            chain,
            tokens,
            bus,
            config,
            span: info_span!("recorder"),
            guard: Mutex::new(()),
        }
    }

    /// Log recorder activity under `span` instead of the default
    /// `recorder` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn chain(&self) -> &Arc<Chain> {
        &self.chain
    }

    pub fn tokens(&self) -> &Arc<TokenLedger> {
        &self.tokens
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Validate the whole audit chain at its configured difficulty.
    pub fn verify_chain(&self) -> RecorderResult<ValidationReport> {
        Ok(ChainValidator::validate(
            self.chain.as_ref(),
            self.chain.difficulty(),
        )?)
    }

    /// Decode every audit record on the chain, paired with the block
    /// holding it. Genesis and blocks whose payload is not an audit record
    /// are skipped.
    pub fn audit_log(&self) -> RecorderResult<Vec<(BlockRef, AuditRecord)>> {
        let blocks = self.chain.snapshot()?;
        let mut log = Vec::with_capacity(blocks.len().saturating_sub(1));
        for block in blocks.iter().filter(|block| !block.is_genesis()) {
            match AuditRecord::from_payload(&block.payload) {
                Ok(record) => log.push((BlockRef::from(block), record)),
                Err(error) => debug!(
                    parent: &self.span,
                    index = block.index,
                    %error,
                    "skipping non-audit block"
                ),
            }
        }
        Ok(log)
    }

    // ---- audited operations ----

    pub fn mint(&self, participant: &str, token: &str, amount: Amount) -> RecorderResult<Receipt> {
        self.record(|| {
            Ok(AuditOp::Mint {
                participant: validation::participant("participant", participant)?,
                token: validation::token("token", token)?,
                amount: validation::positive_amount("amount", amount)?,
            })
        })
    }

    pub fn transfer(
        &self,
        from: &str,
        to: &str,
        token: &str,
        amount: Amount,
    ) -> RecorderResult<Receipt> {
        self.record(|| {
            Ok(AuditOp::Transfer {
                from: validation::participant("from", from)?,
                to: validation::participant("to", to)?,
                token: validation::token("token", token)?,
                amount: validation::positive_amount("amount", amount)?,
            })
        })
    }

    /// Set an allowance. Zero is accepted and revokes.
    pub fn approve(
        &self,
        owner: &str,
        spender: &str,
        token: &str,
        amount: Amount,
    ) -> RecorderResult<Receipt> {
        self.record(|| {
            Ok(AuditOp::Approve {
                owner: validation::participant("owner", owner)?,
                spender: validation::participant("spender", spender)?,
                token: validation::token("token", token)?,
                amount,
            })
        })
    }

    pub fn transfer_from(
        &self,
        owner: &str,
        spender: &str,
        to: &str,
        token: &str,
        amount: Amount,
    ) -> RecorderResult<Receipt> {
        self.record(|| {
            Ok(AuditOp::TransferFrom {
                owner: validation::participant("owner", owner)?,
                spender: validation::participant("spender", spender)?,
                to: validation::participant("to", to)?,
                token: validation::token("token", token)?,
                amount: validation::positive_amount("amount", amount)?,
            })
        })
    }

    /// Transfer several tokens at once; all legs apply or none do.
    pub fn batch_transfer<'a>(
        &self,
        from: &str,
        to: &str,
        amounts: impl IntoIterator<Item = (&'a str, Amount)>,
    ) -> RecorderResult<Receipt> {
        self.record(|| {
            let mut legs = BTreeMap::new();
            for (token, amount) in amounts {
                let token = validation::token("token", token)?;
                let amount = validation::positive_amount("amount", amount)?;
                if legs.insert(token.clone(), amount).is_some() {
                    return Err(RecorderError::Validation(format!(
                        "token {token} appears twice in batch"
                    )));
                }
            }
            if legs.is_empty() {
                return Err(RecorderError::Validation("batch transfer is empty".into()));
            }
            Ok(AuditOp::BatchTransfer {
                from: validation::participant("from", from)?,
                to: validation::participant("to", to)?,
                amounts: legs,
            })
        })
    }

    pub fn lock_escrow(
        &self,
        participant: &str,
        token: &str,
        amount: Amount,
    ) -> RecorderResult<Receipt> {
        self.record(|| {
            Ok(AuditOp::LockEscrow {
                participant: validation::participant("participant", participant)?,
                token: validation::token("token", token)?,
                amount: validation::positive_amount("amount", amount)?,
            })
        })
    }

    pub fn release_escrow(
        &self,
        participant: &str,
        token: &str,
        amount: Amount,
    ) -> RecorderResult<Receipt> {
        self.record(|| {
            Ok(AuditOp::ReleaseEscrow {
                participant: validation::participant("participant", participant)?,
                token: validation::token("token", token)?,
                amount: validation::positive_amount("amount", amount)?,
            })
        })
    }

    pub fn refund_escrow(
        &self,
        participant: &str,
        token: &str,
        amount: Amount,
    ) -> RecorderResult<Receipt> {
        self.record(|| {
            Ok(AuditOp::RefundEscrow {
                participant: validation::participant("participant", participant)?,
                token: validation::token("token", token)?,
                amount: validation::positive_amount("amount", amount)?,
            })
        })
    }

    /// Pay for a freight booking: a transfer from `payer` to `payee` whose
    /// audit record names the booking.
    pub fn pay_booking(
        &self,
        booking_id: &str,
        payer: &str,
        payee: &str,
        token: &str,
        amount: Amount,
    ) -> RecorderResult<Receipt> {
        self.record(|| {
            Ok(AuditOp::PayBooking {
                booking_id: validation::booking_id(booking_id)?,
                payer: validation::participant("payer", payer)?,
                payee: validation::participant("payee", payee)?,
                token: validation::token("token", token)?,
                amount: validation::positive_amount("amount", amount)?,
            })
        })
    }

    // ---- the guarded unit ----

    fn record(&self, build: impl FnOnce() -> RecorderResult<AuditOp>) -> RecorderResult<Receipt> {
        let _enter = self.span.enter();
        let _guard = self.guard.lock().map_err(|_| RecorderError::GuardPoisoned)?;

        let op = build()?;
        let record = AuditRecord::new(OperationId::new(), self.clock.now(), op);
        let payload = record.to_payload()?;

        let undo = execute(&self.tokens, &record.op)?;

        let block = match self.chain.append(&payload) {
            Ok(block) => block,
            Err(audit) => return Err(self.audit_failed(&record, audit, undo)),
        };

        let (kind, event) = record.op.event();
        if let Err(error) = self.bus.publish(record.operation_id, kind, event) {
            // The audit block is authoritative; a bus failure does not undo it.
            warn!(%error, operation = %record.operation_id, "event not published");
        }

        info!(
            operation = %record.operation_id,
            op = record.op.name(),
            index = block.index,
            "operation recorded"
        );
        Ok(Receipt {
            operation_id: record.operation_id,
            block,
        })
    }

    fn audit_failed(&self, record: &AuditRecord, audit: ChainError, undo: Vec<Undo>) -> RecorderError {
        match self.config.audit_failure_policy {
            AuditFailurePolicy::RollBack => {
                for step in undo.iter().rev() {
                    if let Err(rollback) = step.apply(&self.tokens) {
                        error!(
                            operation = %record.operation_id,
                            op = record.op.name(),
                            %audit,
                            %rollback,
                            "rollback failed; token ledger holds an unaudited change"
                        );
                        return RecorderError::RollbackFailed { audit, rollback };
                    }
                }
                warn!(
                    operation = %record.operation_id,
                    op = record.op.name(),
                    %audit,
                    "audit append failed; operation rolled back"
                );
                RecorderError::AuditFailed { source: audit }
            }
        }
    }
}
