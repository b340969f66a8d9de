// ABOUTME: Evaluator — combines the intrinsic-evil detector and risk scorer into a verdict.
// ABOUTME: The Classifier trait lets a stronger detector replace the heuristic one.

use super::patterns::IntrinsicEvilDetector;
use super::scoring::RiskScorer;
use super::types::{Evaluation, ToolCallRequest};
use crate::error::GateResult;

/// Anything that can classify a tool call as allow, block, or escalate.
pub trait Classifier: Send + Sync {
    fn evaluate(&self, request: &ToolCallRequest) -> Evaluation;
}

/// Keyword and regex heuristics: detector first, then clarity × stakes against a threshold.
#[derive(Debug)]
pub struct HeuristicClassifier {
    detector: IntrinsicEvilDetector,
    scorer: RiskScorer,
    threshold: u32,
}

impl HeuristicClassifier {
    pub fn new(threshold: u32) -> GateResult<Self> {
        Ok(Self {
            detector: IntrinsicEvilDetector::new()?,
            scorer: RiskScorer::new()?,
            threshold,
        })
    }
}

impl Classifier for HeuristicClassifier {
    fn evaluate(&self, request: &ToolCallRequest) -> Evaluation {
        let tool = request.tool_name.as_str();
        if let Some(reason) = self.detector.check(tool, &request.params) {
            return Evaluation::Block { reason };
        }

        let assessment = self.scorer.assess(tool, &request.params);
        let score = assessment.score();
        if score < self.threshold {
            return Evaluation::Allow;
        }

        let mut reason = format!(
            "Tool '{}' scored {} (clarity {} x stakes {}), threshold {}",
            tool, score, assessment.clarity, assessment.stakes, self.threshold
        );
        let concerns = assessment.specific_concerns();
        if !concerns.is_empty() {
            reason.push_str(": ");
            reason.push_str(&concerns.join("; "));
        }
        Evaluation::Escalate { reason, score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classifier(threshold: u32) -> HeuristicClassifier {
        HeuristicClassifier::new(threshold).unwrap()
    }

    #[test]
    fn root_delete_blocks_without_scoring() {
        let request = ToolCallRequest::new("exec", json!({"command": "rm -rf /"}));
        match classifier(100).evaluate(&request) {
            Evaluation::Block { reason } => assert!(reason.contains("root filesystem")),
            other => panic!("expected Block, got {:?}", other),
        }
    }

    #[test]
    fn block_wins_even_with_lowest_threshold() {
        let request = ToolCallRequest::new("image_generate", json!({"prompt": "a deepfake of a senator"}));
        assert!(matches!(
            classifier(1).evaluate(&request),
            Evaluation::Block { .. }
        ));
    }

    #[test]
    fn gateway_model_change_escalates() {
        let request = ToolCallRequest::new(
            "gateway",
            json!({"action": "config.apply", "raw": "{\"defaultModel\": \"other\"}"}),
        );
        match classifier(36).evaluate(&request) {
            Evaluation::Escalate { reason, score } => {
                assert_eq!(score, 42);
                assert!(reason.contains("'gateway'"));
                assert!(reason.contains("42"));
                assert!(reason.contains("model change"));
            }
            other => panic!("expected Escalate, got {:?}", other),
        }
    }

    #[test]
    fn score_equal_to_threshold_escalates() {
        let request = ToolCallRequest::new("exec", json!({"command": "ls"}));
        assert!(matches!(
            classifier(12).evaluate(&request),
            Evaluation::Escalate { score: 12, .. }
        ));
        assert_eq!(classifier(13).evaluate(&request), Evaluation::Allow);
    }

    #[test]
    fn low_risk_tools_are_allowed() {
        let request = ToolCallRequest::new("read", json!({"path": "notes.md"}));
        assert_eq!(classifier(36).evaluate(&request), Evaluation::Allow);
    }

    #[test]
    fn concerning_content_steers_toward_escalation() {
        let calm = ToolCallRequest::new("image_generate", json!({"prompt": "a meadow"}));
        let tense = ToolCallRequest::new(
            "image_generate",
            json!({"prompt": "a meadow, a rifle, and a pile of cocaine"}),
        );
        let c = classifier(20);
        assert_eq!(c.evaluate(&calm), Evaluation::Allow);
        match c.evaluate(&tense) {
            Evaluation::Escalate { reason, .. } => {
                assert!(reason.contains("weapons"));
                assert!(reason.contains("drug references"));
            }
            other => panic!("expected Escalate, got {:?}", other),
        }
    }
}
