// ABOUTME: Core types for the authorization gate.
// ABOUTME: ToolCallRequest, Evaluation, GateDecision, and the host-facing denial payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of the block reason for an unconditional block.
pub const BLOCK_PREFIX: &str = "GUARDIAN_ANGEL_BLOCK";
/// Prefix of the block reason for an escalation awaiting approval.
pub const ESCALATE_PREFIX: &str = "GUARDIAN_ANGEL_ESCALATE";

/// A tool call the host is about to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    pub params: Value,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, params: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            params,
        }
    }
}

/// The verdict of a classifier on a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Low enough risk to run without asking.
    Allow,
    /// Impermissible regardless of context; never escalates.
    Block { reason: String },
    /// Needs explicit human approval before it may run.
    Escalate { reason: String, score: u32 },
}

/// Why the gate let a call through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowReason {
    Disabled,
    Exempt,
    /// A matching approval was consumed; carries its nonce.
    Approved { nonce: String },
    Evaluated,
}

/// The gate's final answer for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow(AllowReason),
    Block { reason: String },
    Escalate { nonce: String, reason: String },
}

impl GateDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, GateDecision::Allow(_))
    }

    /// The payload returned to the host, or `None` when the call may proceed.
    pub fn hook_response(&self) -> Option<HookResponse> {
        let block_reason = match self {
            GateDecision::Allow(_) => return None,
            GateDecision::Block { reason } => {
                format!("{}|{}", BLOCK_PREFIX, sanitize_reason(reason))
            }
            GateDecision::Escalate { nonce, reason } => {
                format!("{}|{}|{}", ESCALATE_PREFIX, nonce, sanitize_reason(reason))
            }
        };
        Some(HookResponse {
            block: true,
            block_reason,
        })
    }
}

/// Denial payload in the shape the host hook expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    pub block: bool,
    pub block_reason: String,
}

/// A block reason parsed back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    Block { reason: String },
    Escalate { nonce: String, reason: String },
}

impl DenialReason {
    /// Parse a `blockReason` string produced by [`GateDecision::hook_response`].
    pub fn parse(block_reason: &str) -> Option<Self> {
        let mut parts = block_reason.splitn(3, '|');
        match parts.next()? {
            BLOCK_PREFIX => {
                let rest = block_reason.get(BLOCK_PREFIX.len() + 1..)?;
                Some(DenialReason::Block {
                    reason: rest.to_string(),
                })
            }
            ESCALATE_PREFIX => {
                let nonce = parts.next()?.to_string();
                let reason = parts.next().unwrap_or_default().to_string();
                Some(DenialReason::Escalate { nonce, reason })
            }
            _ => None,
        }
    }
}

/// Keep the `|` separator unambiguous in block reasons.
fn sanitize_reason(reason: &str) -> String {
    reason.replace('|', "/").replace(['\n', '\r'], " ")
}
