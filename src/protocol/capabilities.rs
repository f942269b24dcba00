//! Capabilities the embedder hands to the runner: the app logic that knows
//! what a state means, and a validator that may veto any transition.

use core::fmt::Debug;

use async_trait::async_trait;

use super::opcode::ValidationContext;
use crate::{
    abiencode::Token,
    channel::{AppInstance, AppOutcome},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("app logic failed: {0}")]
pub struct AppLogicError(pub String);

/// Evaluates app definitions off-chain, mirroring what the app contract
/// would compute on-chain.
#[async_trait]
pub trait AppLogic: Send + Sync + Debug {
    /// The state `app` moves to when `action` is applied to its latest state.
    async fn apply_action(&self, app: &AppInstance, action: &Token) -> Result<Token, AppLogicError>;

    /// Outcome of `app` in its latest state.
    async fn compute_outcome(&self, app: &AppInstance) -> Result<AppOutcome, AppLogicError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

/// Application level veto, consulted by both roles before anything is
/// signed.
#[async_trait]
pub trait Validator: Send + Sync + Debug {
    async fn validate(&self, ctx: &ValidationContext) -> Verdict;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl Validator for AcceptAll {
    async fn validate(&self, _ctx: &ValidationContext) -> Verdict {
        Verdict::Accept
    }
}
