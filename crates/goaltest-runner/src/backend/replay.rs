use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::DecisionBackend;
use crate::session::{Role, Session, Turn};
use crate::{Error, Result};

/// Replays the assistant turns of a recorded session, in order.
#[derive(Debug, Clone)]
pub struct ReplayBackend {
    queue: VecDeque<Turn>,
    recorded: usize,
    source: Option<PathBuf>,
}

impl ReplayBackend {
    pub fn from_turns(turns: impl IntoIterator<Item = Turn>) -> Self {
        let queue: VecDeque<Turn> = turns
            .into_iter()
            .filter(|t| t.role == Role::Assistant)
            .collect();
        let recorded = queue.len();
        Self {
            queue,
            recorded,
            source: None,
        }
    }

    pub fn from_session(session: &Session) -> Self {
        Self::from_turns(session.assistant_turns().cloned())
    }

    /// Parse a recording. Only assistant entries are decoded, so user turns in
    /// formats this crate never wrote do not break replay.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<Value> = serde_json::from_str(json)?;
        let mut turns = Vec::new();
        for entry in entries {
            if entry.get("role").and_then(Value::as_str) == Some("assistant") {
                turns.push(serde_json::from_value::<Turn>(entry)?);
            }
        }
        Ok(Self::from_turns(turns))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut backend = Self::from_json(&content)?;
        backend.source = Some(path.as_ref().to_path_buf());
        info!(
            "replaying {} recorded decisions from {}",
            backend.recorded,
            path.as_ref().display()
        );
        Ok(backend)
    }

    /// Number of decisions in the recording.
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

#[async_trait]
impl DecisionBackend for ReplayBackend {
    async fn process_turn(&mut self, _history: &[Turn]) -> Result<Turn> {
        let turn = self.queue.pop_front().ok_or(Error::ReplayExhausted)?;
        debug!("replay: {} decisions left", self.queue.len());
        Ok(turn)
    }

    fn step_limit(&self) -> Option<usize> {
        Some(self.recorded)
    }

    fn recording(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}
