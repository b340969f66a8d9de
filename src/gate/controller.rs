// ABOUTME: Gate controller — orchestrates exemptions, approval consumption, forced escalation, and the evaluator.
// ABOUTME: First match wins; every block and escalation is logged, and escalations are recorded in the store.

use std::sync::Arc;

use glob::Pattern;

use super::evaluator::{Classifier, HeuristicClassifier};
use super::fingerprint::Fingerprint;
use super::store::{Escalation, EscalationStore};
use super::types::{AllowReason, Evaluation, GateDecision, ToolCallRequest};
use crate::config::Config;
use crate::error::{GateError, GateResult};

/// A set of tool names, each entry a glob pattern.
#[derive(Debug, Clone, Default)]
pub struct ToolMatcher {
    patterns: Vec<Pattern>,
}

impl ToolMatcher {
    /// Compile the entries; an entry that is not a valid glob matches literally.
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        let patterns = entries
            .iter()
            .filter_map(|entry| {
                let entry = entry.as_ref().trim();
                match Pattern::new(entry) {
                    Ok(pattern) => Some(pattern),
                    Err(e) => {
                        tracing::warn!(pattern = entry, error = %e, "invalid tool pattern, matching literally");
                        Pattern::new(&Pattern::escape(entry)).ok()
                    }
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn matches(&self, tool_name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(tool_name))
    }
}

/// Reason attached to calls of tools configured to always need approval.
fn forced_reason(tool_name: &str) -> String {
    format!("Tool '{}' is configured to always require approval", tool_name)
}

/// Runs the authorization pipeline for each tool call.
///
/// Must be the last interceptor the host runs: any hook after it can still
/// alter the parameters this gate fingerprinted.
pub struct GateController {
    enabled: bool,
    exempt: ToolMatcher,
    forced: ToolMatcher,
    classifier: Box<dyn Classifier>,
    store: Arc<EscalationStore>,
}

impl GateController {
    /// Build a controller using the heuristic classifier at the configured threshold.
    pub fn new(config: &Config, store: Arc<EscalationStore>) -> GateResult<Self> {
        let threshold = u32::try_from(config.escalation_threshold)
            .ok()
            .filter(|t| *t > 0)
            .ok_or_else(|| {
                GateError::Config(format!(
                    "escalation_threshold must be positive, got {}",
                    config.escalation_threshold
                ))
            })?;
        let classifier = HeuristicClassifier::new(threshold)?;
        Ok(Self::with_classifier(config, store, Box::new(classifier)))
    }

    /// Build a controller around any classifier.
    pub fn with_classifier(
        config: &Config,
        store: Arc<EscalationStore>,
        classifier: Box<dyn Classifier>,
    ) -> Self {
        Self {
            enabled: config.enabled,
            exempt: ToolMatcher::new(&config.never_block),
            forced: ToolMatcher::new(&config.always_block),
            classifier,
            store,
        }
    }

    pub fn store(&self) -> &Arc<EscalationStore> {
        &self.store
    }

    /// Decide whether the call may run.
    ///
    /// Order: disabled, `never_block`, a live approval, `always_block`, then the
    /// classifier. A tool listed in `always_block` escalates without reaching the
    /// classifier, so its intrinsic-evil checks do not run and the call can be approved.
    pub fn check(&self, request: &ToolCallRequest) -> GateDecision {
        let tool = request.tool_name.as_str();

        if !self.enabled {
            return GateDecision::Allow(AllowReason::Disabled);
        }
        if self.exempt.matches(tool) {
            return GateDecision::Allow(AllowReason::Exempt);
        }

        let fingerprint = Fingerprint::compute(tool, &request.params);
        match self.store.consume_approval(&fingerprint) {
            Ok(Some(nonce)) => {
                tracing::info!(tool, nonce = %nonce, "approved tool call allowed");
                return GateDecision::Allow(AllowReason::Approved { nonce });
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(tool, error = %e, "approval lookup failed, evaluating without it");
            }
        }

        let evaluation = if self.forced.matches(tool) {
            Evaluation::Escalate {
                reason: forced_reason(tool),
                score: 0,
            }
        } else {
            self.classifier.evaluate(request)
        };

        match evaluation {
            Evaluation::Allow => GateDecision::Allow(AllowReason::Evaluated),
            Evaluation::Block { reason } => {
                tracing::warn!(tool, reason = %reason, "tool call blocked");
                GateDecision::Block { reason }
            }
            Evaluation::Escalate { reason, .. } => self.escalate(request, &fingerprint, reason),
        }
    }

    fn escalate(
        &self,
        request: &ToolCallRequest,
        fingerprint: &Fingerprint,
        reason: String,
    ) -> GateDecision {
        let tool = request.tool_name.as_str();
        match self
            .store
            .escalate_unless_approved(fingerprint, tool, &request.params)
        {
            Ok(Escalation::Pending(pending)) => {
                tracing::info!(tool, nonce = %pending.nonce, reason = %reason, "tool call escalated");
                GateDecision::Escalate {
                    nonce: pending.nonce,
                    reason,
                }
            }
            Ok(Escalation::Approved { nonce }) => {
                tracing::info!(tool, nonce = %nonce, "approved tool call allowed");
                GateDecision::Allow(AllowReason::Approved { nonce })
            }
            Err(e) => {
                let reason = format!("{} (escalation could not be recorded: {})", reason, e);
                tracing::warn!(tool, reason = %reason, "tool call blocked");
                GateDecision::Block { reason }
            }
        }
    }
}
