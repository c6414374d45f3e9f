use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use colored::Colorize;
use serde_json::{json, Value};

use ftl_chain::{ChainReader, ValidationReport};
use ftl_recorder::{LedgerConfig, LedgerRecorder};

use crate::cli::*;
use crate::scenario::{self, Scenario, StepOutcome};

pub fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Run(args) => cmd_run(args, cli.format),
        Command::Verify(args) => cmd_verify(args, cli.format),
    }
}

/// A finished scenario run.
struct Session {
    recorder: LedgerRecorder,
    outcomes: Vec<StepOutcome>,
    report: ValidationReport,
}

impl Session {
    fn exit_code(&self) -> ExitCode {
        if self.report.is_valid() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LedgerConfig> {
    match path {
        Some(path) => LedgerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(LedgerConfig::default()),
    }
}

fn run_session(config: LedgerConfig, scenario: &Scenario) -> anyhow::Result<Session> {
    let recorder = LedgerRecorder::new(config).context("building ledger")?;
    let outcomes = scenario::execute(&recorder, scenario);
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    tracing::debug!(steps = outcomes.len(), failed, "scenario finished");
    let report = recorder.verify_chain().context("validating chain")?;
    Ok(Session {
        recorder,
        outcomes,
        report,
    })
}

fn prepare(args: &RunArgs) -> anyhow::Result<Session> {
    let config = load_config(args.config.as_deref())?;
    let scenario = Scenario::load(&args.scenario)?;
    run_session(config, &scenario)
}

fn cmd_run(args: RunArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let session = prepare(&args)?;
    match format {
        OutputFormat::Text => print_session(&session)?,
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&session_json(&session)?)?)
        }
    }
    Ok(session.exit_code())
}

fn cmd_verify(args: RunArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let session = prepare(&args)?;
    match format {
        OutputFormat::Text => print_report(&session.report),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report_json(&session.report))?)
        }
    }
    Ok(session.exit_code())
}

// ---- text output ----

fn print_session(session: &Session) -> anyhow::Result<()> {
    println!("{}", "Steps".bold());
    for outcome in &session.outcomes {
        let label = format!("#{}", outcome.position);
        match &outcome.result {
            Ok(receipt) => println!(
                "  {} {} {}  block {} {}",
                "✓".green(),
                label.dimmed(),
                outcome.step.describe(),
                receipt.block.index.to_string().yellow(),
                short(&receipt.block.hash).dimmed()
            ),
            Err(e) => println!(
                "  {} {} {}  {}",
                "✗".red(),
                label.dimmed(),
                outcome.step.describe(),
                e.to_string().red()
            ),
        }
    }

    println!("\n{}", "Chain".bold());
    for block in session.recorder.chain().snapshot()? {
        let summary = if block.is_genesis() {
            "genesis".to_string()
        } else {
            block.payload.clone()
        };
        println!(
            "  {} {} nonce {}  {}",
            block.index.to_string().yellow(),
            short(&block.hash).cyan(),
            block.nonce,
            summary.dimmed()
        );
    }

    println!("\n{}", "Balances".bold());
    let positions = session.recorder.tokens().positions()?;
    if positions.is_empty() {
        println!("  (none)");
    }
    for ((participant, token), position) in &positions {
        println!(
            "  {:<16} {:<8} available {:>10}  escrow {:>10}",
            participant.to_string(),
            token.to_string(),
            position.available,
            position.locked
        );
    }
    for (token, supply) in session.recorder.tokens().supplies()? {
        println!("  {} {} {}", "supply".dimmed(), token, supply);
    }

    println!();
    print_report(&session.report);
    Ok(())
}

fn print_report(report: &ValidationReport) {
    if report.is_valid() {
        println!(
            "{} Chain valid: {} blocks at difficulty {}",
            "✓".green().bold(),
            report.block_count,
            report.difficulty.zeros()
        );
        return;
    }
    println!(
        "{} Chain invalid: {} violation(s) in {} blocks",
        "✗".red().bold(),
        report.violations.len(),
        report.block_count
    );
    for v in &report.violations {
        println!("  block {}: {:?} {}", v.position, v.kind, v.description);
    }
}

fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

// ---- json output ----

fn report_json(report: &ValidationReport) -> Value {
    json!({
        "valid": report.is_valid(),
        "block_count": report.block_count,
        "difficulty": report.difficulty.zeros(),
        "violations": report.violations.iter().map(|v| json!({
            "position": v.position,
            "kind": format!("{:?}", v.kind),
            "description": v.description,
        })).collect::<Vec<_>>(),
    })
}

fn session_json(session: &Session) -> anyhow::Result<Value> {
    let steps: Vec<Value> = session
        .outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(receipt) => json!({
                "position": o.position,
                "step": o.step,
                "ok": true,
                "receipt": receipt,
            }),
            Err(e) => json!({
                "position": o.position,
                "step": o.step,
                "ok": false,
                "error": e.to_string(),
            }),
        })
        .collect();

    let tokens = session.recorder.tokens();
    let balances: Vec<Value> = tokens
        .positions()?
        .into_iter()
        .map(|((participant, token), position)| {
            json!({
                "participant": participant,
                "token": token,
                "available": position.available,
                "locked": position.locked,
            })
        })
        .collect();

    let chain = session.recorder.chain().snapshot()?;
    let supplies = tokens.supplies()?;

    Ok(json!({
        "steps": steps,
        "chain": chain,
        "balances": balances,
        "supplies": supplies,
        "report": report_json(&session.report),
    }))
}
