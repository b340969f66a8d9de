// ABOUTME: Risk scorer — additive clarity and stakes penalties from tool category and parameters.
// ABOUTME: Each axis starts at 1 and clamps at 10; the score is their product.

use serde_json::Value;

use super::analysis::{command_text, destructive_executables, destructive_idioms};
use super::patterns::ConcerningContent;
use crate::error::GateResult;

const AXIS_MIN: u8 = 1;
const AXIS_MAX: u8 = 10;

/// Tools that change the host, the gateway, or scheduled work.
pub const INFRASTRUCTURE_TOOLS: &[&str] = &["exec", "process", "gateway", "cron", "nodes"];

/// Tools whose effects are visible outside the agent.
pub const EXTERNAL_TOOLS: &[&str] = &[
    "message",
    "sessions_send",
    "tts",
    "browser",
    "web_fetch",
    "image_generate",
];

const GATEWAY_CONFIG_ACTIONS: &[&str] = &["config.apply", "config.patch"];
const GATEWAY_LIFECYCLE_ACTIONS: &[&str] = &["restart", "update.run"];

/// Recipient count at which a message counts as a broadcast.
const BROADCAST_RECIPIENTS: usize = 5;

/// One risk indicator and what it adds to each axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Penalty {
    pub clarity: u8,
    pub stakes: u8,
    pub concern: String,
}

impl Penalty {
    fn new(clarity: u8, stakes: u8, concern: impl Into<String>) -> Self {
        Self {
            clarity,
            stakes,
            concern: concern.into(),
        }
    }
}

/// Scored view of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    pub clarity: u8,
    pub stakes: u8,
    pub penalties: Vec<Penalty>,
}

impl RiskAssessment {
    pub fn score(&self) -> u32 {
        u32::from(self.clarity) * u32::from(self.stakes)
    }

    /// Concerns raised by parameter inspection, excluding plain category membership.
    pub fn specific_concerns(&self) -> Vec<&str> {
        self.penalties
            .iter()
            .map(|p| p.concern.as_str())
            .filter(|c| !c.ends_with(" tool"))
            .collect()
    }
}

/// Heuristic clarity/stakes scorer.
#[derive(Debug)]
pub struct RiskScorer {
    concerning: ConcerningContent,
}

impl RiskScorer {
    pub fn new() -> GateResult<Self> {
        Ok(Self {
            concerning: ConcerningContent::new()?,
        })
    }

    pub fn assess_clarity(&self, tool_name: &str, params: &Value) -> u8 {
        accumulate(self.penalties(tool_name, params).iter().map(|p| p.clarity))
    }

    pub fn assess_stakes(&self, tool_name: &str, params: &Value) -> u8 {
        accumulate(self.penalties(tool_name, params).iter().map(|p| p.stakes))
    }

    pub fn assess(&self, tool_name: &str, params: &Value) -> RiskAssessment {
        let penalties = self.penalties(tool_name, params);
        RiskAssessment {
            clarity: accumulate(penalties.iter().map(|p| p.clarity)),
            stakes: accumulate(penalties.iter().map(|p| p.stakes)),
            penalties,
        }
    }

    /// Every risk indicator present in the request.
    pub fn penalties(&self, tool_name: &str, params: &Value) -> Vec<Penalty> {
        let mut penalties = Vec::new();

        if INFRASTRUCTURE_TOOLS.contains(&tool_name) {
            penalties.push(Penalty::new(2, 3, "infrastructure-affecting tool"));
        }
        if EXTERNAL_TOOLS.contains(&tool_name) {
            penalties.push(Penalty::new(1, 2, "externally-effecting tool"));
        }

        if let Some(command) = command_text(tool_name, params) {
            for exe in destructive_executables(command) {
                penalties.push(Penalty::new(3, 4, format!("destructive command `{}`", exe)));
            }
            for idiom in destructive_idioms(command) {
                penalties.push(Penalty::new(2, 3, format!("destructive pattern `{}`", idiom)));
            }
        }

        match tool_name {
            "gateway" => gateway_penalties(params, &mut penalties),
            "message" => message_penalties(params, &mut penalties),
            "cron" => cron_penalties(params, &mut penalties),
            _ => {}
        }

        for category in self.concerning.categories(params) {
            penalties.push(Penalty::new(2, 2, format!("concerning content: {}", category)));
        }

        penalties
    }
}

fn accumulate(increments: impl Iterator<Item = u8>) -> u8 {
    increments
        .fold(AXIS_MIN, |total, inc| total.saturating_add(inc))
        .min(AXIS_MAX)
}

fn action(params: &Value) -> Option<&str> {
    params.get("action").and_then(Value::as_str)
}

fn gateway_penalties(params: &Value, penalties: &mut Vec<Penalty>) {
    let action = action(params).unwrap_or_default();
    if GATEWAY_LIFECYCLE_ACTIONS.contains(&action) {
        penalties.push(Penalty::new(1, 2, format!("gateway {}", action)));
    }
    if !GATEWAY_CONFIG_ACTIONS.contains(&action) {
        return;
    }
    penalties.push(Penalty::new(1, 1, "gateway configuration change"));

    let payload = config_payload(params).to_lowercase();
    if payload.contains("model") {
        penalties.push(Penalty::new(2, 2, "model change in configuration"));
    }
    if payload.contains("plugin") {
        penalties.push(Penalty::new(2, 2, "plugin change in configuration"));
    }
}

/// The configuration text a gateway call would apply.
fn config_payload(params: &Value) -> String {
    ["raw", "patch", "config"]
        .iter()
        .filter_map(|key| params.get(*key))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn message_penalties(params: &Value, penalties: &mut Vec<Penalty>) {
    let count = recipient_count(params);
    if count >= BROADCAST_RECIPIENTS || action(params) == Some("broadcast") {
        penalties.push(Penalty::new(
            4,
            4,
            format!("broadcast to {} recipients", count),
        ));
    }
}

fn recipient_count(params: &Value) -> usize {
    ["targets", "recipients", "to"]
        .iter()
        .filter_map(|key| params.get(*key))
        .map(|value| match value {
            Value::Array(items) => items.len(),
            Value::String(s) => s.split(',').filter(|t| !t.trim().is_empty()).count(),
            _ => 0,
        })
        .sum()
}

fn cron_penalties(params: &Value, penalties: &mut Vec<Penalty>) {
    let (clarity, stakes) = match action(params).unwrap_or_default() {
        "remove" => (3, 3),
        "add" | "update" => (2, 2),
        "run" => (1, 2),
        _ => return,
    };
    penalties.push(Penalty::new(
        clarity,
        stakes,
        format!("scheduling change: {}", action(params).unwrap_or_default()),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scorer() -> RiskScorer {
        RiskScorer::new().unwrap()
    }

    #[test]
    fn unknown_read_tool_scores_minimum() {
        let assessment = scorer().assess("read", &json!({"path": "README.md"}));
        assert_eq!(assessment.clarity, 1);
        assert_eq!(assessment.stakes, 1);
        assert_eq!(assessment.score(), 1);
        assert!(assessment.penalties.is_empty());
    }

    #[test]
    fn plain_exec_is_infrastructure_only() {
        let s = scorer();
        let params = json!({"command": "ls -la"});
        assert_eq!(s.assess_clarity("exec", &params), 3);
        assert_eq!(s.assess_stakes("exec", &params), 4);
        assert!(s.assess("exec", &params).specific_concerns().is_empty());
    }

    #[test]
    fn destructive_exec_raises_both_axes() {
        let assessment = scorer().assess("exec", &json!({"command": "rm -rf ./build"}));
        assert_eq!(assessment.clarity, 6);
        assert_eq!(assessment.stakes, 8);
        assert_eq!(assessment.score(), 48);
        assert_eq!(
            assessment.specific_concerns(),
            vec!["destructive command `rm`"]
        );
    }

    #[test]
    fn gateway_model_change_scores_above_default_threshold() {
        let params = json!({
            "action": "config.apply",
            "raw": "{\"agents\":{\"defaults\":{\"defaultModel\":\"gpt-x\"}}}"
        });
        let assessment = scorer().assess("gateway", &params);
        assert_eq!(assessment.clarity, 6);
        assert_eq!(assessment.stakes, 7);
        assert!(assessment.score() >= 36);
        assert!(
            assessment
                .specific_concerns()
                .contains(&"model change in configuration")
        );
    }

    #[test]
    fn gateway_plugin_patch_object_is_inspected() {
        let params = json!({"action": "config.patch", "patch": {"plugins": {"evil": true}}});
        let assessment = scorer().assess("gateway", &params);
        assert!(
            assessment
                .specific_concerns()
                .contains(&"plugin change in configuration")
        );
    }

    #[test]
    fn message_broadcast_counts_recipients() {
        let s = scorer();
        let few = json!({"to": ["a", "b"], "text": "hi"});
        let many = json!({"targets": ["a", "b", "c", "d", "e"], "text": "hi"});
        let csv = json!({"to": "a,b,c,d,e,f", "text": "hi"});
        assert_eq!(s.assess("message", &few).score(), 2 * 3);
        assert_eq!(s.assess("message", &many).score(), 6 * 7);
        assert_eq!(s.assess("message", &csv).score(), 6 * 7);
    }

    #[test]
    fn cron_mutations_are_penalized_by_action() {
        let s = scorer();
        assert_eq!(s.assess("cron", &json!({"action": "list"})).score(), 3 * 4);
        assert_eq!(s.assess("cron", &json!({"action": "add"})).score(), 5 * 6);
        assert_eq!(s.assess("cron", &json!({"action": "remove"})).score(), 6 * 7);
    }

    #[test]
    fn concerning_content_raises_scores() {
        let s = scorer();
        let calm = s.assess("image_generate", &json!({"prompt": "a lighthouse"}));
        let tense = s.assess("image_generate", &json!({"prompt": "a lighthouse and a rifle"}));
        assert!(tense.clarity > calm.clarity);
        assert!(tense.stakes > calm.stakes);
        assert!(
            tense
                .specific_concerns()
                .contains(&"concerning content: weapons")
        );
    }

    #[test]
    fn axes_clamp_at_ten() {
        let params = json!({
            "command": "sudo rm -rf /srv && shred x && dd if=a of=b && kill 1 && chmod 000 y && git push --force"
        });
        let assessment = scorer().assess("exec", &params);
        assert_eq!(assessment.clarity, 10);
        assert_eq!(assessment.stakes, 10);
        assert_eq!(assessment.score(), 100);
    }

    #[test]
    fn extra_indicators_never_lower_the_score() {
        let s = scorer();
        let base = json!({"command": "rm -r old"});
        let more = json!({"command": "rm -r old && git reset --hard"});
        assert!(s.assess("exec", &more).score() >= s.assess("exec", &base).score());
        assert!(s.assess_clarity("exec", &more) >= s.assess_clarity("exec", &base));
        assert!(s.assess_stakes("exec", &more) >= s.assess_stakes("exec", &base));
    }
}
