// ABOUTME: Configuration loading for guardian-angel.
// ABOUTME: Reads ~/.guardian-angel/config.toml and clamps out-of-range values back to defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default score at or above which a tool call escalates.
pub const DEFAULT_ESCALATION_THRESHOLD: i64 = 36;
/// Default lifetime of a pending escalation.
pub const DEFAULT_PENDING_TIMEOUT_MS: i64 = 300_000;
/// Default lifetime of an approval once granted.
pub const DEFAULT_APPROVAL_WINDOW_MS: i64 = 30_000;

const THRESHOLD_RANGE: (i64, i64) = (1, 100);
const PENDING_TIMEOUT_RANGE: (i64, i64) = (60_000, 600_000);
const APPROVAL_WINDOW_RANGE: (i64, i64) = (10_000, 120_000);

/// Read-only tools that are never gated unless the user overrides the list.
const DEFAULT_NEVER_BLOCK: &[&str] = &[
    "memory_search",
    "memory_get",
    "session_status",
    "web_search",
    "read",
];

/// Top-level configuration.
///
/// Numeric fields are signed so that a negative value in the file is caught by
/// validation and replaced by the default instead of failing the whole load.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub escalation_threshold: i64,
    pub pending_timeout_ms: i64,
    pub approval_window_ms: i64,
    pub store_path: Option<PathBuf>,
    /// Tools (glob patterns) that always require approval.
    pub always_block: Vec<String>,
    /// Tools (glob patterns) that are never gated.
    pub never_block: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            pending_timeout_ms: DEFAULT_PENDING_TIMEOUT_MS,
            approval_window_ms: DEFAULT_APPROVAL_WINDOW_MS,
            store_path: None,
            always_block: Vec::new(),
            never_block: DEFAULT_NEVER_BLOCK.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load config from the given path (or ~/.guardian-angel/config.toml), falling back to defaults.
    ///
    /// The result is always validated; malformed TOML is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config.validated())
    }

    /// Path to the config file.
    pub fn config_path() -> PathBuf {
        Self::base_dir().join("config.toml")
    }

    /// Store path to use, honouring an explicit `store_path` setting.
    pub fn resolved_store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| Self::base_dir().join("escalations.json"))
    }

    fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".guardian-angel")
    }

    /// Replace every out-of-range value with its default.
    ///
    /// An invalid setting never disables a check; it reverts to the stock behaviour.
    pub fn validated(mut self) -> Self {
        self.escalation_threshold = clamp_field(
            "escalation_threshold",
            self.escalation_threshold,
            THRESHOLD_RANGE,
            DEFAULT_ESCALATION_THRESHOLD,
        );
        self.pending_timeout_ms = clamp_field(
            "pending_timeout_ms",
            self.pending_timeout_ms,
            PENDING_TIMEOUT_RANGE,
            DEFAULT_PENDING_TIMEOUT_MS,
        );
        self.approval_window_ms = clamp_field(
            "approval_window_ms",
            self.approval_window_ms,
            APPROVAL_WINDOW_RANGE,
            DEFAULT_APPROVAL_WINDOW_MS,
        );
        self.always_block.retain(|name| !name.trim().is_empty());
        self.never_block.retain(|name| !name.trim().is_empty());
        self
    }
}

fn clamp_field(name: &str, value: i64, (min, max): (i64, i64), default: i64) -> i64 {
    if (min..=max).contains(&value) {
        return value;
    }
    tracing::warn!(
        field = name,
        value,
        min,
        max,
        default,
        "configuration value out of range, using default"
    );
    default
}
