use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use ftl_recorder::{LedgerRecorder, Receipt, RecorderError};
use ftl_types::Amount;

/// A list of ledger operations to run in order.
///
/// ```toml
/// [[op]]
/// kind = "mint"
/// participant = "shipper"
/// token = "FRT"
/// amount = 1000
///
/// [[op]]
/// kind = "batch_transfer"
/// from = "shipper"
/// to = "carrier"
/// amounts = { FRT = 10, FUEL = 5 }
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Scenario {
    #[serde(default, rename = "op")]
    pub ops: Vec<Step>,
}

impl Scenario {
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml_str(&source).with_context(|| format!("parsing scenario {}", path.display()))
    }
}

/// One scenario step: raw, unvalidated operation arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Mint {
        participant: String,
        token: String,
        amount: Amount,
    },
    Transfer {
        from: String,
        to: String,
        token: String,
        amount: Amount,
    },
    Approve {
        owner: String,
        spender: String,
        token: String,
        amount: Amount,
    },
    TransferFrom {
        owner: String,
        spender: String,
        to: String,
        token: String,
        amount: Amount,
    },
    BatchTransfer {
        from: String,
        to: String,
        amounts: BTreeMap<String, Amount>,
    },
    LockEscrow {
        participant: String,
        token: String,
        amount: Amount,
    },
    ReleaseEscrow {
        participant: String,
        token: String,
        amount: Amount,
    },
    RefundEscrow {
        participant: String,
        token: String,
        amount: Amount,
    },
    PayBooking {
        booking_id: String,
        payer: String,
        payee: String,
        token: String,
        amount: Amount,
    },
}

impl Step {
    pub fn apply(&self, recorder: &LedgerRecorder) -> Result<Receipt, RecorderError> {
        match self {
            Self::Mint {
                participant,
                token,
                amount,
            } => recorder.mint(participant, token, *amount),
            Self::Transfer {
                from,
                to,
                token,
                amount,
            } => recorder.transfer(from, to, token, *amount),
            Self::Approve {
                owner,
                spender,
                token,
                amount,
            } => recorder.approve(owner, spender, token, *amount),
            Self::TransferFrom {
                owner,
                spender,
                to,
                token,
                amount,
            } => recorder.transfer_from(owner, spender, to, token, *amount),
            Self::BatchTransfer { from, to, amounts } => recorder.batch_transfer(
                from,
                to,
                amounts.iter().map(|(token, amount)| (token.as_str(), *amount)),
            ),
            Self::LockEscrow {
                participant,
                token,
                amount,
            } => recorder.lock_escrow(participant, token, *amount),
            Self::ReleaseEscrow {
                participant,
                token,
                amount,
            } => recorder.release_escrow(participant, token, *amount),
            Self::RefundEscrow {
                participant,
                token,
                amount,
            } => recorder.refund_escrow(participant, token, *amount),
            Self::PayBooking {
                booking_id,
                payer,
                payee,
                token,
                amount,
            } => recorder.pay_booking(booking_id, payer, payee, token, *amount),
        }
    }

    /// One-line human description.
    pub fn describe(&self) -> String {
        match self {
            Self::Mint {
                participant,
                token,
                amount,
            } => format!("mint {amount} {token} to {participant}"),
            Self::Transfer {
                from,
                to,
                token,
                amount,
            } => format!("transfer {amount} {token} {from} -> {to}"),
            Self::Approve {
                owner,
                spender,
                token,
                amount,
            } => format!("approve {spender} for {amount} {token} of {owner}"),
            Self::TransferFrom {
                owner,
                spender,
                to,
                token,
                amount,
            } => format!("{spender} moves {amount} {token} {owner} -> {to}"),
            Self::BatchTransfer { from, to, amounts } => {
                let legs: Vec<_> = amounts
                    .iter()
                    .map(|(token, amount)| format!("{amount} {token}"))
                    .collect();
                format!("batch {} {from} -> {to}", legs.join(", "))
            }
            Self::LockEscrow {
                participant,
                token,
                amount,
            } => format!("lock {amount} {token} of {participant}"),
            Self::ReleaseEscrow {
                participant,
                token,
                amount,
            } => format!("release {amount} {token} to {participant}"),
            Self::RefundEscrow {
                participant,
                token,
                amount,
            } => format!("refund {amount} {token} to {participant}"),
            Self::PayBooking {
                booking_id,
                payer,
                payee,
                token,
                amount,
            } => format!("booking {booking_id}: {payer} pays {payee} {amount} {token}"),
        }
    }
}

/// Result of one step; failures do not stop the run.
#[derive(Debug)]
pub struct StepOutcome {
    pub position: usize,
    pub step: Step,
    pub result: Result<Receipt, RecorderError>,
}

pub fn execute(recorder: &LedgerRecorder, scenario: &Scenario) -> Vec<StepOutcome> {
    scenario
        .ops
        .iter()
        .enumerate()
        .map(|(i, step)| StepOutcome {
            position: i + 1,
            step: step.clone(),
            result: step.apply(recorder),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ftl_chain::{ChainConfig, ChainReader, Difficulty};
    use ftl_recorder::LedgerConfig;
    use ftl_types::{ParticipantId, TokenId};

    use super::*;

    const SCENARIO: &str = r#"
        [[op]]
        kind = "mint"
        participant = "shipper"
        token = "FRT"
        amount = 1000

        [[op]]
        kind = "mint"
        participant = "shipper"
        token = "FUEL"
        amount = 20

        [[op]]
        kind = "transfer"
        from = "shipper"
        to = "carrier"
        token = "FRT"
        amount = 5000

        [[op]]
        kind = "batch_transfer"
        from = "shipper"
        to = "carrier"
        amounts = { FRT = 100, FUEL = 5 }

        [[op]]
        kind = "pay_booking"
        booking_id = "BK-1042"
        payer = "shipper"
        payee = "carrier"
        token = "FRT"
        amount = 250
    "#;

    fn recorder() -> LedgerRecorder {
        LedgerRecorder::new(LedgerConfig {
            chain: ChainConfig::with_difficulty(Difficulty::new(1).unwrap()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn parses_op_tables() {
        let scenario = Scenario::from_toml_str(SCENARIO).unwrap();
        assert_eq!(scenario.ops.len(), 5);
        assert_eq!(
            scenario.ops[3],
            Step::BatchTransfer {
                from: "shipper".into(),
                to: "carrier".into(),
                amounts: BTreeMap::from([("FRT".into(), 100), ("FUEL".into(), 5)]),
            }
        );
    }

    #[test]
    fn empty_scenario_is_allowed() {
        assert!(Scenario::from_toml_str("").unwrap().ops.is_empty());
    }

    #[test]
    fn unknown_kind_rejected() {
        let err = Scenario::from_toml_str("[[op]]\nkind = \"teleport\"").unwrap_err();
        assert!(err.to_string().contains("teleport"), "{err}");
    }

    #[test]
    fn failing_step_does_not_stop_the_run() {
        let recorder = recorder();
        let scenario = Scenario::from_toml_str(SCENARIO).unwrap();
        let outcomes = execute(&recorder, &scenario);

        let ok: Vec<bool> = outcomes.iter().map(|o| o.result.is_ok()).collect();
        assert_eq!(ok, vec![true, true, false, true, true]);
        assert!(outcomes[2]
            .result
            .as_ref()
            .unwrap_err()
            .is_insufficient_funds());
        assert_eq!(outcomes[4].position, 5);

        // Genesis plus four recorded operations.
        assert_eq!(recorder.chain().len().unwrap(), 5);
        let carrier = ParticipantId::parse("carrier").unwrap();
        let frt = TokenId::parse("FRT").unwrap();
        assert_eq!(recorder.tokens().get_balance(&carrier, &frt).unwrap(), 350);
    }

    #[test]
    fn describe_is_readable() {
        let step = Step::PayBooking {
            booking_id: "BK-1".into(),
            payer: "shipper".into(),
            payee: "carrier".into(),
            token: "FRT".into(),
            amount: 9,
        };
        assert_eq!(step.describe(), "booking BK-1: shipper pays carrier 9 FRT");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.toml");
        std::fs::write(&path, SCENARIO).unwrap();
        assert_eq!(Scenario::load(&path).unwrap().ops.len(), 5);
        assert!(Scenario::load(&dir.path().join("missing.toml")).is_err());
    }
}
