//! Decision backends: map the turn history to the next assistant turn.

mod openai;
mod replay;

pub use openai::OpenAiBackend;
pub use replay::ReplayBackend;

use std::path::Path;

use async_trait::async_trait;

use crate::config::ModelConfig;
use crate::session::Turn;
use crate::Result;

#[async_trait]
pub trait DecisionBackend: Send {
    /// Compute the next assistant turn. The last entry of `history` is the
    /// newest user turn. Callers own the history; backends never store it.
    async fn process_turn(&mut self, history: &[Turn]) -> Result<Turn>;

    /// Upper bound on the number of decisions this backend can produce.
    fn step_limit(&self) -> Option<usize> {
        None
    }

    /// File the decisions are read from, if any. Nothing may write to it while
    /// the run is in progress.
    fn recording(&self) -> Option<&Path> {
        None
    }

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Pick the backend: replay when a recording is given, the live model otherwise.
pub fn from_config(model: &ModelConfig, playback: Option<&Path>) -> Result<Box<dyn DecisionBackend>> {
    match playback {
        Some(path) => Ok(Box::new(ReplayBackend::load(path)?)),
        None => Ok(Box::new(OpenAiBackend::from_config(model)?)),
    }
}
