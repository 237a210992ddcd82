//! # goaltest-runner
//!
//! Goal-driven website testing. A vision model looks at an annotated screenshot,
//! picks one action per step, and the loop carries it out until the goal is
//! reached or the step budget runs out. Runs can be recorded and replayed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use goaltest_runner::{Agent, AgentOptions, HtmlReport, ReplayBackend};
//!
//! # #[tokio::main]
//! # async fn main() -> goaltest_runner::Result<()> {
//! let browser = goaltest_agent::Browser::launch().await?;
//! let page = browser.new_page("https://example.com/login").await?;
//!
//! let mut backend = ReplayBackend::load("recorded.json")?;
//! let agent = Agent::new(AgentOptions::new("log in", "https://example.com/login"))
//!     .with_report(HtmlReport::new("report.html"));
//! let outcome = agent.run(&page, &mut backend).await?;
//! println!("achieved: {}", outcome.achieved());
//!
//! browser.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod backend;
pub mod config;
pub mod decision;
pub mod launch;
pub mod report;
pub mod session;

pub use agent::{Agent, AgentOptions, Phase, RunOutcome};
pub use backend::{DecisionBackend, OpenAiBackend, ReplayBackend};
pub use config::{AgentConfig, BrowserConfig, Config, Device, ModelConfig, DEFAULT_DEVICE, DEVICES};
pub use decision::Decision;
pub use report::{HtmlReport, ReportSink, RunTrace, StepRecord};
pub use session::{ContentPart, Role, Session, Turn};

/// Result type for goaltest-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running a test.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Agent(#[from] goaltest_agent::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The decision backend answered with something unusable.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("replay queue exhausted: no more recorded decisions")]
    ReplayExhausted,

    #[error("environment error: {0}")]
    Environment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_errors_pass_through() {
        let err: Error = goaltest_agent::Error::UnknownAction("drag".into()).into();
        assert_eq!(err.to_string(), "unknown action type: drag");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::ReplayExhausted.to_string(),
            "replay queue exhausted: no more recorded decisions"
        );
        assert_eq!(
            Error::Protocol("empty reply".into()).to_string(),
            "protocol error: empty reply"
        );
    }
}
