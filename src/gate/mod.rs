// ABOUTME: Tool-call authorization gate — allow, block, or escalate every call before it runs.
// ABOUTME: Risk heuristics, fingerprinted one-time approvals, and a persisted escalation store.

pub mod analysis;
pub mod approve;
pub mod clock;
pub mod controller;
pub mod evaluator;
pub mod fingerprint;
pub mod patterns;
pub mod scoring;
pub mod store;
pub mod types;

pub use approve::*;
pub use clock::*;
pub use controller::*;
pub use evaluator::*;
pub use fingerprint::*;
pub use store::*;
pub use types::*;
