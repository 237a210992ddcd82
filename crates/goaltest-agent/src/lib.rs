//! # goaltest-agent
//!
//! Page-side half of a goal-driven browser agent: find the interactive elements
//! a user could actually hit, number them on screen, and act on them by number.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use goaltest_agent::{observe, ActionPayload, ActionRegistry, Browser, ProbeOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> goaltest_agent::Result<()> {
//! let browser = Browser::launch().await?;
//! let page = browser.new_page("https://example.com").await?;
//!
//! // Probe → index visible elements → draw numbered markers
//! let index = observe(&page, &ProbeOptions::default()).await?;
//! for el in index.iter() {
//!     println!("{}", el);
//! }
//!
//! let actions = ActionRegistry::default();
//! actions
//!     .dispatch(&page, &index, &ActionPayload::new("click").element(0))
//!     .await?;
//!
//! browser.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod annotate;
pub mod geometry;
pub mod probe;
pub mod surface;
pub mod visibility;

pub use actions::{
    resolve_target, Action, ActionPayload, ActionRegistry, ClickAction, Direction, Distance, Miss,
    ScrollAction, Target, TypeAction,
};
pub use geometry::{Point, Rect, Viewport};
pub use probe::{ProbeCandidate, ProbeOptions, ProbeReport};
pub use surface::Surface;
pub use visibility::{build_index, observe, ElementIndex, VisibleElement};

// Re-export eoka types that users need
pub use eoka::{Browser, Page, StealthConfig};

/// Result type for goaltest-agent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while probing a page or performing an action.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("probe error: {0}")]
    Probe(String),

    #[error("invalid action: {0}")]
    Validation(String),

    #[error("unknown action type: {0}")]
    UnknownAction(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
