//! Strategy-level failures.
//!
//! A `StrategyFailed` never reaches the client directly: the file path turns
//! it into "no media attached", the link chain moves on to the next strategy.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{strategy} strategy failed: {reason}")]
pub struct StrategyFailed {
    pub strategy: &'static str,
    pub reason: String,
}

impl StrategyFailed {
    pub fn new(strategy: &'static str, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            reason: reason.into(),
        }
    }

    /// Adapter for `map_err` over crate errors.
    pub fn from_error(strategy: &'static str) -> impl Fn(acervo_core::Error) -> Self {
        move |e| Self::new(strategy, e.to_string())
    }
}

impl From<StrategyFailed> for acervo_core::Error {
    fn from(e: StrategyFailed) -> Self {
        acervo_core::Error::Inference(e.to_string())
    }
}
