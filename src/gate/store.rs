// ABOUTME: Escalation store — persisted state machine for pending escalations and approved actions.
// ABOUTME: Every operation is one locked load/modify/save cycle over a pluggable state backend.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::clock::{Clock, SystemClock};
use super::fingerprint::Fingerprint;
use crate::config::Config;
use crate::error::{GateError, GateResult};

/// An escalation waiting for a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEscalation {
    pub nonce: String,
    pub fingerprint: Fingerprint,
    pub tool_name: String,
    pub params: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A one-time approval bound to an exact fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedAction {
    pub fingerprint: Fingerprint,
    pub nonce: String,
    pub tool_name: String,
    pub approved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

/// The persisted document: pending escalations by nonce, approvals by fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EscalationState {
    #[serde(default)]
    pub pending: HashMap<String, PendingEscalation>,
    #[serde(default)]
    pub approved: HashMap<Fingerprint, ApprovedAction>,
}

impl EscalationState {
    /// Drop every record whose deadline has passed. Returns how many were removed.
    pub fn remove_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.pending.len() + self.approved.len();
        self.pending.retain(|_, p| p.expires_at >= now);
        self.approved.retain(|_, a| a.expires_at >= now);
        before - (self.pending.len() + self.approved.len())
    }
}

/// Outcome of [`EscalationStore::escalate_unless_approved`].
#[derive(Debug, Clone, PartialEq)]
pub enum Escalation {
    Pending(PendingEscalation),
    Approved { nonce: String },
}

/// Result of a successful approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub nonce: String,
    pub fingerprint: Fingerprint,
    pub tool_name: String,
    pub expires_at: DateTime<Utc>,
    pub window: Duration,
}

impl Approval {
    /// Window length in whole seconds, rounded up.
    pub fn window_seconds(&self) -> u64 {
        let ms = self.window.num_milliseconds().max(0) as u64;
        ms.div_ceil(1000)
    }
}

/// Holds cross-process exclusion for one load/modify/save cycle.
#[derive(Debug)]
pub struct BackendLock {
    file: Option<File>,
}

impl BackendLock {
    /// A lock that guards nothing beyond the store's own mutex.
    pub fn in_process() -> Self {
        Self { file: None }
    }
}

impl Drop for BackendLock {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = FileExt::unlock(file);
        }
    }
}

/// Where the escalation state lives.
///
/// Implementations never fabricate state: an unreadable source loads as empty.
pub trait StateBackend: Send {
    fn acquire(&mut self) -> GateResult<BackendLock>;
    fn load(&mut self) -> EscalationState;
    fn save(&mut self, state: &EscalationState) -> GateResult<()>;
}

/// In-memory backend for tests and single-process embedding.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: EscalationState,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: EscalationState) -> Self {
        Self { state }
    }
}

impl StateBackend for MemoryBackend {
    fn acquire(&mut self) -> GateResult<BackendLock> {
        Ok(BackendLock::in_process())
    }

    fn load(&mut self) -> EscalationState {
        self.state.clone()
    }

    fn save(&mut self, state: &EscalationState) -> GateResult<()> {
        self.state = state.clone();
        Ok(())
    }
}

/// JSON document on disk, rewritten atomically (tmp + rename) on every mutation.
///
/// An exclusive advisory lock on a sidecar `.lock` file serializes processes
/// that share the same path.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("json.lock");
        Self { path, lock_path }
    }

    fn ensure_parent(&self) -> GateResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| GateError::store_io(parent, e))?;
            }
        }
        Ok(())
    }
}

impl StateBackend for JsonFileBackend {
    fn acquire(&mut self) -> GateResult<BackendLock> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| GateError::store_io(&self.lock_path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| GateError::store_io(&self.lock_path, e))?;
        Ok(BackendLock { file: Some(file) })
    }

    fn load(&mut self) -> EscalationState {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return EscalationState::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "escalation store unreadable, treating as empty");
                return EscalationState::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "escalation store corrupt, treating as empty");
                EscalationState::default()
            }
        }
    }

    fn save(&mut self, state: &EscalationState) -> GateResult<()> {
        self.ensure_parent()?;
        let tmp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&tmp_path, content).map_err(|e| GateError::store_io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| GateError::store_io(&self.path, e))?;
        Ok(())
    }
}

/// Record lifetimes applied by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTimeouts {
    pub pending_timeout: Duration,
    pub approval_window: Duration,
}

impl StoreTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pending_timeout: Duration::milliseconds(config.pending_timeout_ms),
            approval_window: Duration::milliseconds(config.approval_window_ms),
        }
    }
}

impl Default for StoreTimeouts {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Owner of the escalation state machine.
///
/// All operations serialize on one mutex and run as a single
/// lock → load → mutate → save unit, so no record can be read and deleted
/// by two callers.
pub struct EscalationStore {
    backend: Mutex<Box<dyn StateBackend>>,
    clock: Arc<dyn Clock>,
    timeouts: StoreTimeouts,
}

impl EscalationStore {
    /// Open a store over `backend`, sweeping expired records first.
    pub fn open(
        backend: impl StateBackend + 'static,
        clock: Arc<dyn Clock>,
        timeouts: StoreTimeouts,
    ) -> GateResult<Self> {
        let store = Self {
            backend: Mutex::new(Box::new(backend)),
            clock,
            timeouts,
        };
        store.cleanup()?;
        Ok(store)
    }

    /// Open the JSON file store named by the configuration, on the system clock.
    pub fn from_config(config: &Config) -> GateResult<Self> {
        Self::open(
            JsonFileBackend::new(config.resolved_store_path()),
            Arc::new(SystemClock),
            StoreTimeouts::from_config(config),
        )
    }

    fn transact<R>(
        &self,
        op: impl FnOnce(&mut EscalationState, DateTime<Utc>) -> GateResult<R>,
    ) -> GateResult<R> {
        let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = backend.acquire()?;
        let mut state = backend.load();
        let before = state.clone();
        let now = self.clock.now();
        let result = op(&mut state, now);
        if state != before {
            backend.save(&state)?;
        }
        result
    }

    /// Record a new pending escalation for `fingerprint` and return it.
    ///
    /// A live pending escalation for the same fingerprint is returned as is,
    /// and any approval for the fingerprint is superseded.
    pub fn escalate(
        &self,
        fingerprint: &Fingerprint,
        tool_name: &str,
        params: &Value,
    ) -> GateResult<PendingEscalation> {
        let pending_timeout = self.timeouts.pending_timeout;
        self.transact(|state, now| {
            state.approved.remove(fingerprint);
            Ok(record_pending(state, now, pending_timeout, fingerprint, tool_name, params))
        })
    }

    /// Escalate `fingerprint`, unless a live approval for it exists.
    ///
    /// An approval granted after the caller's last `consume_approval` is consumed
    /// here instead of being superseded, in the same locked cycle.
    pub fn escalate_unless_approved(
        &self,
        fingerprint: &Fingerprint,
        tool_name: &str,
        params: &Value,
    ) -> GateResult<Escalation> {
        let pending_timeout = self.timeouts.pending_timeout;
        self.transact(|state, now| {
            if let Some(approved) = state.approved.remove(fingerprint) {
                if now <= approved.expires_at {
                    return Ok(Escalation::Approved {
                        nonce: approved.nonce,
                    });
                }
            }
            Ok(Escalation::Pending(record_pending(
                state,
                now,
                pending_timeout,
                fingerprint,
                tool_name,
                params,
            )))
        })
    }

    /// Convert the pending escalation `nonce` into a time-boxed approval.
    pub fn approve(&self, nonce: &str, justification: Option<&str>) -> GateResult<Approval> {
        let window = self.timeouts.approval_window;
        self.transact(|state, now| {
            let Some(pending) = state.pending.remove(nonce) else {
                return Err(GateError::NotFound {
                    nonce: nonce.to_string(),
                });
            };
            if now > pending.expires_at {
                return Err(GateError::Expired {
                    nonce: nonce.to_string(),
                });
            }

            let expires_at = now + window;
            state.approved.insert(
                pending.fingerprint.clone(),
                ApprovedAction {
                    fingerprint: pending.fingerprint.clone(),
                    nonce: pending.nonce.clone(),
                    tool_name: pending.tool_name.clone(),
                    approved_at: now,
                    expires_at,
                    justification: justification.map(str::to_string),
                },
            );
            Ok(Approval {
                nonce: pending.nonce,
                fingerprint: pending.fingerprint,
                tool_name: pending.tool_name,
                expires_at,
                window,
            })
        })
    }

    /// Consume the approval for `fingerprint`, returning its nonce.
    ///
    /// An expired approval is deleted and reported as absent.
    pub fn consume_approval(&self, fingerprint: &Fingerprint) -> GateResult<Option<String>> {
        self.transact(|state, now| {
            let Some(approved) = state.approved.remove(fingerprint) else {
                return Ok(None);
            };
            if now > approved.expires_at {
                tracing::debug!(nonce = %approved.nonce, "approval expired before use");
                return Ok(None);
            }
            Ok(Some(approved.nonce))
        })
    }

    /// Remove every expired record. Returns how many were removed.
    pub fn cleanup(&self) -> GateResult<usize> {
        let removed = self.transact(|state, now| Ok(state.remove_expired(now)))?;
        if removed > 0 {
            tracing::info!(removed, "expired escalation records removed");
        }
        Ok(removed)
    }

    /// Live pending escalations, oldest first.
    pub fn pending(&self) -> GateResult<Vec<PendingEscalation>> {
        self.transact(|state, now| {
            let mut live: Vec<PendingEscalation> = state
                .pending
                .values()
                .filter(|p| p.expires_at >= now)
                .cloned()
                .collect();
            live.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.nonce.cmp(&b.nonce)));
            Ok(live)
        })
    }

    /// The raw persisted state, expired records included.
    pub fn snapshot(&self) -> GateResult<EscalationState> {
        self.transact(|state, _| Ok(state.clone()))
    }
}

/// Reuse the live pending escalation for `fingerprint`, or insert a fresh one.
fn record_pending(
    state: &mut EscalationState,
    now: DateTime<Utc>,
    pending_timeout: Duration,
    fingerprint: &Fingerprint,
    tool_name: &str,
    params: &Value,
) -> PendingEscalation {
    if let Some(existing) = state
        .pending
        .values()
        .find(|p| &p.fingerprint == fingerprint && p.expires_at >= now)
    {
        return existing.clone();
    }
    state.pending.retain(|_, p| &p.fingerprint != fingerprint);

    let nonce = loop {
        let candidate = generate_nonce();
        if !state.pending.contains_key(&candidate) {
            break candidate;
        }
    };
    let record = PendingEscalation {
        nonce: nonce.clone(),
        fingerprint: fingerprint.clone(),
        tool_name: tool_name.to_string(),
        params: params.clone(),
        created_at: now,
        expires_at: now + pending_timeout,
    };
    state.pending.insert(nonce, record.clone());
    tracing::debug!(nonce = %record.nonce, tool = tool_name, "escalation recorded");
    record
}

/// Eight lowercase hex characters from 32 random bits.
fn generate_nonce() -> String {
    format!("{:08x}", rand::random::<u32>())
}
