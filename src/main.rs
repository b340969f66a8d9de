// ABOUTME: Entry point for the `guardian` CLI — checks tool calls and manages escalations from a shell.
// ABOUTME: Parses CLI args, loads config, opens the shared escalation store, and dispatches a subcommand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use guardian_angel::config::Config;
use guardian_angel::gate::{
    ApproveParams, EscalationStore, GateController, GateDecision, ToolCallRequest, approve,
};

/// Authorization gate for agent tool calls.
#[derive(Parser, Debug)]
#[command(name = "guardian")]
#[command(author, version, about = "Allow, block, or escalate agent tool calls")]
struct Args {
    /// Path to config file (defaults to ~/.guardian-angel/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a tool call and print the denial payload, or `allow`
    Check {
        /// Tool name as the host reports it
        tool: String,
        /// Tool parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
    },
    /// Approve a pending escalation by nonce
    Approve {
        nonce: String,
        /// Justification recorded with the approval
        #[arg(long)]
        reason: Option<String>,
    },
    /// List live pending escalations
    Pending,
    /// Remove expired escalations and approvals
    Cleanup,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays machine-readable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(args.config.as_deref()).context("failed to load config")?;
    let store = Arc::new(EscalationStore::from_config(&config).with_context(|| {
        format!(
            "failed to open escalation store at {}",
            config.resolved_store_path().display()
        )
    })?);

    match args.command {
        Command::Check { tool, params } => {
            let params: Value =
                serde_json::from_str(&params).context("--params must be valid JSON")?;
            let gate = GateController::new(&config, store)?;
            let decision = gate.check(&ToolCallRequest::new(tool, params));
            print_decision(&decision)?;
        }
        Command::Approve { nonce, reason } => {
            let response = approve(&store, &ApproveParams { nonce, reason })?;
            println!("{}", response.message);
            if !response.success {
                std::process::exit(1);
            }
        }
        Command::Pending => {
            let pending = store.pending()?;
            if pending.is_empty() {
                println!("No pending escalations.");
            }
            for p in pending {
                println!(
                    "{}  {}  expires {}  {}",
                    p.nonce,
                    p.tool_name,
                    p.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    p.params
                );
            }
        }
        Command::Cleanup => {
            let removed = store.cleanup()?;
            println!("Removed {} expired record(s).", removed);
        }
    }

    Ok(())
}

fn print_decision(decision: &GateDecision) -> Result<()> {
    match decision.hook_response() {
        Some(response) => println!("{}", serde_json::to_string(&response)?),
        None => println!("allow"),
    }
    Ok(())
}
