//! The agent loop.
//!
//! ```text
//! Init → Perceiving → Deciding → Acting → Settling → Perceiving …
//!             │                     │
//!             └→ StepBudgetExhausted └→ Achieved
//! ```
//!
//! An iteration starts in Deciding and completes in the next Perceiving phase,
//! or in Acting when the goal is achieved. Completing an iteration persists the
//! session, regenerates the report and advances the step counter.

mod prompt;

pub use prompt::{system_prompt, user_cue};

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Local;
use goaltest_agent::{observe, ActionRegistry, ElementIndex, ProbeOptions, Surface};
use tracing::{debug, info, warn};

use crate::backend::DecisionBackend;
use crate::config::DEFAULT_DEVICE;
use crate::decision::Decision;
use crate::report::{ReportSink, RunTrace, StepRecord};
use crate::session::{Role, Session, Turn};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Perceiving,
    Deciding,
    Acting,
    Settling,
    Achieved,
    StepBudgetExhausted,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Achieved | Phase::StepBudgetExhausted)
    }
}

/// Everything a run needs besides the page and the backend.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub goal: String,
    /// Start URL, for the report.
    pub url: String,
    pub max_steps: usize,
    pub settle_ms: u64,
    pub jpeg_quality: u8,
    pub probe: ProbeOptions,
    /// Session file rewritten after every iteration.
    pub store: Option<PathBuf>,
    pub browser: String,
    pub device: String,
    /// Draw the pointer position into screenshots.
    pub show_pointer: bool,
}

impl AgentOptions {
    pub fn new(goal: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            url: url.into(),
            max_steps: 5,
            settle_ms: 4000,
            jpeg_quality: 80,
            probe: ProbeOptions::default(),
            store: None,
            browser: "chrome".into(),
            device: DEFAULT_DEVICE.into(),
            show_pointer: false,
        }
    }
}

/// How a run ended.
#[derive(Debug)]
pub struct RunOutcome {
    pub phase: Phase,
    /// Completed iterations.
    pub steps: usize,
    pub session: Session,
    pub trace: RunTrace,
}

impl RunOutcome {
    pub fn achieved(&self) -> bool {
        self.phase == Phase::Achieved
    }
}

struct RunState {
    session: Session,
    store: Option<PathBuf>,
    trace: RunTrace,
    index: ElementIndex,
    step: usize,
    max_steps: usize,
    in_flight: bool,
    pending: Option<Decision>,
    last_expectation: Option<String>,
}

pub struct Agent {
    options: AgentOptions,
    registry: ActionRegistry,
    reports: Vec<Box<dyn ReportSink>>,
}

impl Agent {
    pub fn new(options: AgentOptions) -> Self {
        Self {
            options,
            registry: ActionRegistry::default(),
            reports: Vec::new(),
        }
    }

    pub fn with_registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Add a report regenerated after every iteration.
    pub fn with_report(mut self, sink: impl ReportSink + 'static) -> Self {
        self.reports.push(Box::new(sink));
        self
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Run until the goal is achieved or the step budget is spent.
    ///
    /// On error the session and report are still written, best effort, before
    /// the error is returned.
    pub async fn run(
        &self,
        surface: &dyn Surface,
        backend: &mut dyn DecisionBackend,
    ) -> Result<RunOutcome> {
        let mut trace = RunTrace::new(&self.options.goal, &self.options.url);
        trace.browser = self.options.browser.clone();
        trace.device = self.options.device.clone();
        let mut state = RunState {
            session: Session::new(),
            store: self.store_target(&*backend),
            trace,
            index: ElementIndex::empty(),
            step: 0,
            max_steps: self.options.max_steps,
            in_flight: false,
            pending: None,
            last_expectation: None,
        };

        let result = self.drive(surface, backend, &mut state).await;
        state.trace.finished_at = Some(Local::now());

        match result {
            Ok(phase) => {
                self.publish(&state)?;
                Ok(RunOutcome {
                    phase,
                    steps: state.step,
                    session: state.session,
                    trace: state.trace,
                })
            }
            Err(e) => {
                if let Err(save_err) = self.publish(&state) {
                    warn!("could not save partial trace: {}", save_err);
                }
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        surface: &dyn Surface,
        backend: &mut dyn DecisionBackend,
        state: &mut RunState,
    ) -> Result<Phase> {
        let mut phase = Phase::Init;
        while !phase.is_terminal() {
            debug!("phase {:?} (step {})", phase, state.step);
            phase = match phase {
                Phase::Init => self.init(surface, &*backend, state).await,
                Phase::Perceiving => self.perceive(surface, state).await?,
                Phase::Deciding => self.decide(surface, backend, state).await?,
                Phase::Acting => self.act(surface, state).await?,
                Phase::Settling => {
                    surface.settle(self.options.settle_ms).await;
                    Phase::Perceiving
                }
                Phase::Achieved | Phase::StepBudgetExhausted => phase,
            };
        }
        Ok(phase)
    }

    /// The session file, unless it is the recording being replayed.
    fn store_target(&self, backend: &dyn DecisionBackend) -> Option<PathBuf> {
        let store = self.options.store.as_deref()?;
        if let Some(recording) = backend.recording() {
            if same_file(store, recording) {
                info!(
                    "not storing the session: {} is the recording being replayed",
                    store.display()
                );
                return None;
            }
        }
        Some(store.to_path_buf())
    }

    async fn init(
        &self,
        surface: &dyn Surface,
        backend: &dyn DecisionBackend,
        state: &mut RunState,
    ) -> Phase {
        if let Some(limit) = backend.step_limit() {
            if state.max_steps > limit {
                info!(
                    "max steps {} is larger than the {} recorded decisions, capping to {}",
                    state.max_steps, limit, limit
                );
                state.max_steps = limit;
            }
        }
        info!(
            "goal: \"{}\" (max {} steps, {} backend)",
            self.options.goal,
            state.max_steps,
            backend.name()
        );

        state.session = Session::with_system(system_prompt(&self.options.goal, &self.registry));
        surface.settle(self.options.settle_ms).await;
        Phase::Perceiving
    }

    async fn perceive(&self, surface: &dyn Surface, state: &mut RunState) -> Result<Phase> {
        self.snapshot(surface, state).await?;
        if state.in_flight {
            self.complete_iteration(state)?;
        }
        if state.step >= state.max_steps {
            info!("maximum number of steps ({}) reached", state.max_steps);
            return Ok(Phase::StepBudgetExhausted);
        }
        Ok(Phase::Deciding)
    }

    async fn decide(
        &self,
        surface: &dyn Surface,
        backend: &mut dyn DecisionBackend,
        state: &mut RunState,
    ) -> Result<Phase> {
        info!("step {}", state.step + 1);
        let url = surface.url().await?;
        let image = state.trace.screenshots.last().cloned().unwrap_or_default();
        state
            .session
            .push(Turn::user_with_image(user_cue(state.step, &url), image));

        let reply = backend.process_turn(&state.session.history()).await?;
        if reply.role != Role::Assistant {
            return Err(Error::Protocol(format!(
                "backend replied with a {:?} turn",
                reply.role
            )));
        }
        let text = reply.joined_text();
        state.session.push(reply);

        let decision = Decision::parse(&text, &self.registry)?;
        self.check_consistency(state, &decision);
        state.last_expectation = Some(decision.expectation.clone());

        state.in_flight = true;
        state.trace.steps.push(StepRecord {
            decision: decision.clone(),
            action_description: None,
            action_result: None,
        });
        state.pending = Some(decision);
        Ok(Phase::Acting)
    }

    async fn act(&self, surface: &dyn Surface, state: &mut RunState) -> Result<Phase> {
        let Some(decision) = state.pending.take() else {
            return Err(Error::Protocol("no decision to act on".into()));
        };

        if decision.achieved {
            info!("goal achieved in step {}", state.step + 1);
            self.snapshot(surface, state).await?;
            self.complete_iteration(state)?;
            return Ok(Phase::Achieved);
        }

        let Some(action) = decision.action.as_ref() else {
            return Err(Error::Protocol("no action given and goal not achieved".into()));
        };
        let description = self.registry.describe(action)?;
        let result = self.registry.dispatch(surface, &state.index, action).await?;
        info!("{}: {}", description, result);
        debug!("expectation: {}", decision.expectation);

        if let Some(record) = state.trace.steps.last_mut() {
            record.action_description = Some(description);
            record.action_result = Some(result);
        }
        Ok(Phase::Settling)
    }

    /// Probe, index, overlay and screenshot the current page.
    async fn snapshot(&self, surface: &dyn Surface, state: &mut RunState) -> Result<()> {
        state.index = observe(surface, &self.options.probe).await?;
        if self.options.show_pointer {
            surface.show_pointer().await?;
        }
        let jpeg = surface.screenshot(self.options.jpeg_quality).await?;
        state.trace.screenshots.push(BASE64.encode(jpeg));
        debug!("snapshot: {} visible elements", state.index.len());
        Ok(())
    }

    fn complete_iteration(&self, state: &mut RunState) -> Result<()> {
        state.in_flight = false;
        state.step += 1;
        self.publish(state)
    }

    /// Persist the session and regenerate every report.
    fn publish(&self, state: &RunState) -> Result<()> {
        if let Some(path) = &state.store {
            state.session.save(path)?;
        }
        for sink in &self.reports {
            sink.write(&state.trace)?;
        }
        Ok(())
    }

    fn check_consistency(&self, state: &RunState, decision: &Decision) {
        if expectation_mismatch(
            state.last_expectation.as_deref(),
            decision.previous_expectation.as_deref(),
        ) {
            warn!(
                "previous expectation mismatch: expected {:?}, model recalled {:?}",
                state.last_expectation.as_deref().unwrap_or_default(),
                decision.previous_expectation.as_deref().unwrap_or_default()
            );
        }
        if let Some(level) = decision.frustration_level {
            if !(1..=10).contains(&level) {
                warn!("frustration level {} outside 1..=10", level);
            }
        }
        if let Some(satisfied) = decision.expectation_satisfied {
            info!(
                "expectation satisfied: {}, frustration level: {}",
                satisfied,
                decision
                    .frustration_level
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "?".into())
            );
        }
    }
}

/// Whether the model recalled a different expectation than it stated last turn.
/// Nothing to compare on the first turn or when the model leaves it out.
fn expectation_mismatch(stated: Option<&str>, recalled: Option<&str>) -> bool {
    match (stated, recalled) {
        (Some(stated), Some(recalled)) => stated.trim() != recalled.trim(),
        _ => false,
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
