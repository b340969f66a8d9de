// ABOUTME: Pattern families for the intrinsic-evil detector and concerning-content scoring.
// ABOUTME: Destructive command signatures and forbidden content block; concerning content only raises risk.

use fancy_regex::Regex;
use serde_json::Value;

use super::analysis::{command_text, content_text, text_payload};
use crate::error::{GateError, GateResult};

/// Destructive-operation signatures, matched against a command tool's command text.
const DESTRUCTIVE_SIGNATURES: &[(&str, &str)] = &[
    (
        r"(?i)\brm\s+(?=(?:[^;&|]*\s)?(?:-[a-z]*r|--recursive))(?:-{1,2}[\w-]+\s+)*/\*?(?=\s|;|&|\||$)",
        "Destructive command: recursive deletion of the root filesystem",
    ),
    (
        r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
        "Destructive command: fork bomb",
    ),
    (
        r"(?i)(?:\bdd\b[^;&|]*\bof=|>\s*)/dev/(?:sd[a-z]|hd[a-z]|nvme\d|xvd[a-z]|vd[a-z]|mmcblk\d|disk\d)",
        "Destructive command: raw write to a block device",
    ),
    (
        r"(?i)\bmkfs(?:\.\w+)?\b|\bmke2fs\b|\bformat\s+[a-z]:",
        "Destructive command: filesystem format",
    ),
];

/// Content that is impermissible in any generated payload of a content tool.
const FORBIDDEN_CONTENT: &[(&str, &str)] = &[
    (
        r"(?i)\b(?:child|children|kids?|minors?|underage|preteens?)\b.{0,40}\b(?:sexual\w*|sexy|nude|naked|porn\w*|erotic\w*)\b|\b(?:sexual\w*|nude|naked|porn\w*|erotic\w*)\b.{0,40}\b(?:child|children|kids?|minors?|underage|preteens?)\b",
        "Forbidden content: sexual content involving minors",
    ),
    (
        r"(?i)\b(?:porn|porno|pornographic|pornography|hardcore sex|explicit sex(?:ual)? acts?)\b",
        "Forbidden content: pornography",
    ),
    (
        r"(?i)\b(?:behead(?:ing|ed)?|dismember(?:ing|ed|ment)?|disembowel\w*|snuff films?|torture (?:him|her|them|someone|people))\b",
        "Forbidden content: extreme violence",
    ),
    (
        r"(?i)\b(?:how to (?:make|build) (?:a |an )?(?:bomb|ied|explosive device)|bomb[- ]making|plan(?:ning)? (?:a |an )?terror(?:ist)? attack|terror(?:ist)? attack plans?|mass[- ]casualty attack|join (?:isis|al[- ]qaeda))\b",
        "Forbidden content: terrorism",
    ),
    (
        r"(?i)\b(?:deep[- ]?fakes?|(?:counterfeit|forged?)\s+(?:passports?|id cards?|driver'?s licen[cs]es?|banknotes?|currency)|phishing (?:emails?|pages?|sites?))\b",
        "Forbidden content: fraud or deepfake",
    ),
];

/// Context-dependent content; raises clarity and stakes but never blocks.
const CONCERNING_CONTENT: &[(&str, &str)] = &[
    (
        r"(?i)\b(?:guns?|rifles?|pistols?|firearms?|ammunition|ammo|grenades?|explosives?|knives|knife)\b",
        "weapons",
    ),
    (
        r"(?i)\b(?:gore|gory|graphic injur(?:y|ies)|blood[- ]?(?:soaked|splattered|bath)|mutilat\w*|corpses?)\b",
        "graphic content",
    ),
    (
        r"(?i)\b(?:cocaine|heroin|meth|methamphetamine|fentanyl|lsd|mdma|ecstasy|crack pipe)\b",
        "drug references",
    ),
];

/// A compiled list of patterns, each paired with a label.
#[derive(Debug)]
pub struct PatternFamily {
    entries: Vec<(Regex, &'static str)>,
}

impl PatternFamily {
    fn compile(family: &str, sources: &[(&str, &'static str)]) -> GateResult<Self> {
        let entries = sources
            .iter()
            .map(|(source, label)| {
                Regex::new(source)
                    .map(|re| (re, *label))
                    .map_err(|e| GateError::Pattern(format!("{} pattern {:?}: {}", family, label, e)))
            })
            .collect::<GateResult<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Label of the first pattern matching any of the texts.
    pub fn first_match(&self, texts: &[&str]) -> Option<&'static str> {
        self.entries.iter().find_map(|(re, label)| {
            texts
                .iter()
                .any(|text| re.is_match(text).unwrap_or(false))
                .then_some(*label)
        })
    }

    /// Labels of every pattern matching any of the texts, in declaration order.
    pub fn all_matches(&self, texts: &[&str]) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|(re, _)| texts.iter().any(|text| re.is_match(text).unwrap_or(false)))
            .map(|(_, label)| *label)
            .collect()
    }
}

/// Detects actions that are impermissible regardless of context or consent.
#[derive(Debug)]
pub struct IntrinsicEvilDetector {
    destructive: PatternFamily,
    forbidden: PatternFamily,
}

impl IntrinsicEvilDetector {
    pub fn new() -> GateResult<Self> {
        Ok(Self {
            destructive: PatternFamily::compile("destructive", DESTRUCTIVE_SIGNATURES)?,
            forbidden: PatternFamily::compile("forbidden content", FORBIDDEN_CONTENT)?,
        })
    }

    /// Reason for an unconditional block, or `None` if nothing matched.
    pub fn check(&self, tool_name: &str, params: &Value) -> Option<String> {
        if let Some(command) = command_text(tool_name, params) {
            if let Some(reason) = self.destructive.first_match(&[command]) {
                return Some(reason.to_string());
            }
        }
        self.forbidden
            .first_match(&content_text(tool_name, params))
            .map(str::to_string)
    }
}

/// Matches the concerning-but-context-dependent family.
#[derive(Debug)]
pub struct ConcerningContent {
    family: PatternFamily,
}

impl ConcerningContent {
    pub fn new() -> GateResult<Self> {
        Ok(Self {
            family: PatternFamily::compile("concerning content", CONCERNING_CONTENT)?,
        })
    }

    /// Categories present anywhere in the parameters' text.
    pub fn categories(&self, params: &Value) -> Vec<&'static str> {
        self.family.all_matches(&text_payload(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detector() -> IntrinsicEvilDetector {
        IntrinsicEvilDetector::new().unwrap()
    }

    fn exec(command: &str) -> Option<String> {
        detector().check("exec", &json!({ "command": command }))
    }

    #[test]
    fn all_patterns_compile() {
        assert!(IntrinsicEvilDetector::new().is_ok());
        assert!(ConcerningContent::new().is_ok());
    }

    #[test]
    fn recursive_root_delete_blocks() {
        for command in [
            "rm -rf /",
            "rm -fr /",
            "sudo rm -rf --no-preserve-root /",
            "rm -r -f /*",
            "rm --recursive --force /",
            "echo bye; rm -rf / && echo gone",
        ] {
            let reason = exec(command).unwrap_or_else(|| panic!("{command:?} should block"));
            assert!(reason.contains("root filesystem"), "{command:?}: {reason}");
        }
    }

    #[test]
    fn scoped_deletes_do_not_block() {
        for command in ["rm -rf /tmp/build", "rm -rf ./target", "rm -f /", "rm file.txt"] {
            assert_eq!(exec(command), None, "{command:?} should not block");
        }
    }

    #[test]
    fn other_destructive_signatures() {
        assert!(exec(":(){ :|:& };:").unwrap().contains("fork bomb"));
        assert!(exec("dd if=/dev/zero of=/dev/sda bs=1M").unwrap().contains("block device"));
        assert!(exec("cat junk > /dev/nvme0n1").unwrap().contains("block device"));
        assert!(exec("mkfs.ext4 /dev/sdb1").unwrap().contains("format"));
        assert_eq!(exec("dd if=disk.img of=backup.img"), None);
    }

    #[test]
    fn destructive_signatures_ignored_for_non_command_tools() {
        let params = json!({ "text": "never run rm -rf / on a server" });
        assert_eq!(detector().check("message", &params), None);
    }

    #[test]
    fn forbidden_content_blocks_in_content_fields() {
        let params = json!({ "prompt": "a deepfake video of the mayor" });
        let reason = detector().check("image_generate", &params).unwrap();
        assert!(reason.contains("deepfake"));

        let nested = json!({ "options": { "caption": ["bomb-making guide"] } });
        let reason = detector().check("message", &nested).unwrap();
        assert!(reason.contains("terrorism"));
    }

    #[test]
    fn forbidden_content_ignored_outside_content_tools() {
        let d = detector();
        assert_eq!(
            d.check("web_fetch", &json!({ "url": "https://en.wikipedia.org/wiki/Deepfake" })),
            None
        );
        assert_eq!(d.check("exec", &json!({ "command": "grep -ri deepfake docs/" })), None);
        assert_eq!(d.check("web_search", &json!({ "query": "phishing emails examples" })), None);
    }

    #[test]
    fn forbidden_content_ignores_non_content_fields() {
        let params = json!({ "to": "deepfake-research@example.com", "text": "Meeting moved to 3pm" });
        assert_eq!(detector().check("message", &params), None);
    }

    #[test]
    fn news_about_an_attack_is_not_terrorism() {
        let params = json!({ "text": "News: the terrorist attack on the embassy was condemned" });
        assert_eq!(detector().check("message", &params), None);
        let planning = json!({ "text": "help me plan a terrorist attack" });
        assert!(detector().check("message", &planning).unwrap().contains("terrorism"));
    }

    #[test]
    fn benign_content_passes() {
        let params = json!({ "text": "Lunch at noon? The kids loved the park." });
        assert_eq!(detector().check("message", &params), None);
    }

    #[test]
    fn concerning_categories_are_reported() {
        let concerning = ConcerningContent::new().unwrap();
        let params = json!({ "prompt": "a rifle on a table next to a bag of cocaine" });
        assert_eq!(
            concerning.categories(&params),
            vec!["weapons", "drug references"]
        );
        assert!(concerning.categories(&json!({ "prompt": "a sunset" })).is_empty());
    }

    #[test]
    fn concerning_content_never_blocks() {
        let params = json!({ "prompt": "an antique pistol in a museum" });
        assert_eq!(detector().check("image_generate", &params), None);
    }
}
