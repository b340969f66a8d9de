// ABOUTME: Approval operation — the host-facing entry point that turns a pending escalation into an approval.
// ABOUTME: Delegates to the escalation store; never re-runs the original tool call.

use serde::{Deserialize, Serialize};

use super::store::EscalationStore;
use crate::error::{GateError, GateResult};

/// Arguments accepted by the approval operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveParams {
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Why an approval was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalFailure {
    NotFound,
    Expired,
}

/// Result returned to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApprovalFailure>,
}

/// Approve the escalation named by `params.nonce`.
///
/// NotFound and Expired become a failed response; store I/O errors are returned as errors
/// so a failed write is never reported as an approval.
pub fn approve(store: &EscalationStore, params: &ApproveParams) -> GateResult<ApproveResponse> {
    let nonce = params.nonce.trim().to_ascii_lowercase();
    let justification = params
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    if !is_valid_nonce(&nonce) {
        return Ok(failure(ApprovalFailure::NotFound, &nonce));
    }

    match store.approve(&nonce, justification) {
        Ok(approval) => {
            let window_seconds = approval.window_seconds();
            tracing::info!(
                nonce = %nonce,
                tool = %approval.tool_name,
                window_seconds,
                justification = justification.unwrap_or("-"),
                "escalation approved"
            );
            Ok(ApproveResponse {
                success: true,
                message: format!(
                    "Approved {} for '{}'. Resubmit the identical tool call within {} seconds; the approval works once.",
                    nonce, approval.tool_name, window_seconds
                ),
                window_seconds: Some(window_seconds),
                error: None,
            })
        }
        Err(GateError::NotFound { .. }) => Ok(failure(ApprovalFailure::NotFound, &nonce)),
        Err(GateError::Expired { .. }) => Ok(failure(ApprovalFailure::Expired, &nonce)),
        Err(e) => Err(e),
    }
}

fn failure(kind: ApprovalFailure, nonce: &str) -> ApproveResponse {
    let message = match kind {
        ApprovalFailure::NotFound => format!(
            "Approval failed: NotFound. No pending escalation {:?}; it may already have been used.",
            nonce
        ),
        ApprovalFailure::Expired => format!(
            "Approval failed: Expired. Escalation {} timed out; retry the tool call to get a new nonce.",
            nonce
        ),
    };
    tracing::warn!(nonce, error = ?kind, "approval refused");
    ApproveResponse {
        success: false,
        message,
        window_seconds: None,
        error: Some(kind),
    }
}

/// Nonces are exactly eight lowercase hex characters.
fn is_valid_nonce(nonce: &str) -> bool {
    nonce.len() == 8
        && nonce
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}
