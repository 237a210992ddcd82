//! Human-facing run report.
//!
//! [`RunTrace`] is everything the report needs; [`HtmlReport`] renders it as one
//! self-contained HTML file with screenshots inlined.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use tracing::debug;

use crate::decision::Decision;
use crate::Result;

/// One decided step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub decision: Decision,
    /// Registry description of the requested action, if any.
    pub action_description: Option<String>,
    /// What the action actually did.
    pub action_result: Option<String>,
}

/// Accumulated record of a run.
#[derive(Debug, Clone)]
pub struct RunTrace {
    pub goal: String,
    pub url: String,
    pub browser: String,
    pub device: String,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    /// Base64 JPEGs: the initial snapshot, then one per completed step.
    pub screenshots: Vec<String>,
    pub steps: Vec<StepRecord>,
}

impl RunTrace {
    pub fn new(goal: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            url: url.into(),
            browser: "chrome".into(),
            device: String::new(),
            started_at: Local::now(),
            finished_at: None,
            screenshots: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn achieved(&self) -> bool {
        self.steps.last().map(|s| s.decision.achieved).unwrap_or(false)
    }
}

/// Destination for the report, rewritten after every step.
pub trait ReportSink: Send + Sync {
    fn write(&self, trace: &RunTrace) -> Result<()>;
}

pub struct HtmlReport {
    path: PathBuf,
}

impl HtmlReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for HtmlReport {
    fn write(&self, trace: &RunTrace) -> Result<()> {
        fs::write(&self.path, render(trace))?;
        debug!("report written to {}", self.path.display());
        Ok(())
    }
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Escape text for HTML element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn image(data: Option<&String>, alt: &str) -> String {
    match data {
        Some(data) => format!(
            r#"<div class="image" onclick="this.classList.toggle('fullscreen')"><img src="data:image/jpeg;base64,{}" alt="{}" /></div>"#,
            escape(data),
            escape(alt)
        ),
        None => String::new(),
    }
}

/// Render the full report.
pub fn render(trace: &RunTrace) -> String {
    let mut html = String::new();
    let finished = trace
        .finished_at
        .map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "running".into());

    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>goaltest report</title>
<style>{style}</style>
</head>
<body>
<div class="container">
<div class="step">
  <div class="intro">
    <h1>Goal:</h1>
    <p><strong>{goal}</strong></p>
    <p>URL: <a href="{url}">{url}</a></p>
    <p>Start time: {start}</p>
    <p>End time: {end}</p>
    <p>Number of steps: {count}</p>
    <p>Goal achieved: {achieved}</p>
    <p>Browser: {browser}</p>
    <p>Device: {device}</p>
  </div>
  {initial}
</div>
"#,
        style = STYLE,
        goal = escape(&trace.goal),
        url = escape(&trace.url),
        start = trace.started_at.format(TIME_FORMAT),
        end = escape(&finished),
        count = trace.steps.len(),
        achieved = if trace.achieved() { "Yes" } else { "No" },
        browser = escape(&trace.browser),
        device = escape(&trace.device),
        initial = image(trace.screenshots.first(), "Starting screenshot"),
    );

    for (i, step) in trace.steps.iter().enumerate() {
        render_step(
            &mut html,
            i,
            step,
            trace.steps.get(i + 1).map(|s| &s.decision),
            trace.screenshots.get(i + 1),
        );
    }

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn render_step(
    html: &mut String,
    i: usize,
    step: &StepRecord,
    next: Option<&Decision>,
    screenshot: Option<&String>,
) {
    let d = &step.decision;
    let _ = write!(
        html,
        "<div class=\"step-count\"><h2>Step {}</h2></div>\n<div class=\"step\">\n<div class=\"action-card\">\n",
        i + 1
    );

    if let Some(description) = &step.action_description {
        let _ = write!(
            html,
            "<div class=\"action\"><p><b>Action:</b> {}</p><p><b>Action result:</b> {}</p></div>\n",
            escape(description),
            escape(step.action_result.as_deref().unwrap_or("")),
        );
    }
    let _ = write!(
        html,
        "<p><b>Description:</b> {}</p>\n",
        escape(&d.description)
    );

    match next {
        // the next decision judges whether this step's expectation held
        Some(next) => {
            let class = if next.expectation_satisfied.unwrap_or(false) {
                "expectation-success"
            } else {
                "expectation-failed"
            };
            let checked = next
                .previous_expectation
                .as_deref()
                .unwrap_or(&d.expectation);
            let level = next.frustration_level.unwrap_or(1).clamp(1, 10);
            let _ = write!(
                html,
                r#"<p><b>Url:</b> <a href="{url}">{url}</a></p>
<p><b>Expectation:</b> <span class="{class}">{expectation}</span></p>
<div class="frustration-level"><b>Frustration Level:</b> <meter min="1" max="10" low="4" high="7" optimum="1" value="{level}"></meter> <span>{level}</span></div>
<p><b>Frustration Level Reason:</b> {reason}</p>
"#,
                url = escape(&next.url),
                class = class,
                expectation = escape(checked),
                level = level,
                reason = escape(&next.frustration_level_reason),
            );
        }
        None => {
            let class = if d.achieved {
                "expectation-success"
            } else {
                "expectation"
            };
            let _ = write!(
                html,
                "<p><b>Expectation:</b> <span class=\"{}\">{}</span></p>\n",
                class,
                escape(&d.expectation)
            );
            if d.achieved {
                html.push_str("<p><b>Goal achieved!</b></p>\n");
            }
        }
    }

    html.push_str("</div>\n");
    html.push_str(&image(screenshot, &format!("Screenshot {}", i + 1)));
    html.push_str("\n</div>\n");
}

const STYLE: &str = r#"
.container { display: flex; flex-wrap: wrap; align-items: center; justify-content: center; }
.step { border: 1px solid #ddd; padding: 15px; margin: 10px; border-radius: 5px; box-shadow: 0 0 10px rgba(0,0,0,0.1); display: flex; }
.step-count { width: 100%; }
.intro, .action-card { border: 1px solid #ddd; padding: 15px; margin: 10px; border-radius: 5px; box-shadow: 0 0 10px rgba(0,0,0,0.1); width: 100%; }
.intro h1 { color: #333; }
.image { margin: 10px; cursor: pointer; }
img { max-width: 100%; }
.fullscreen { position: fixed; top: 0; left: 0; width: 100%; height: 100%; background-color: rgba(0,0,0,0.9); display: flex; align-items: center; justify-content: center; z-index: 9999; }
.fullscreen img { width: 100%; height: 100%; object-fit: contain; }
.expectation-success { color: green; }
.expectation-failed { color: red; }
"#;
