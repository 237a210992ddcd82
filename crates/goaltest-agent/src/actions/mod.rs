//! Action registry and dispatch.
//!
//! Each action kind is a type implementing [`Action`], registered by its
//! `actionType` in an [`ActionRegistry`]. The agent loop only ever talks to the
//! registry, so adding a kind means adding a type and a `register` call.

mod click;
mod scroll;
mod type_text;

pub use click::ClickAction;
pub use scroll::{Direction, Distance, ScrollAction};
pub use type_text::TypeAction;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::geometry::Point;
use crate::surface::Surface;
use crate::visibility::ElementIndex;
use crate::{Error, Result};

/// Structured intent as emitted by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    pub action_type: String,
    #[serde(
        default,
        deserialize_with = "whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub element_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<Distance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ActionPayload {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            ..Default::default()
        }
    }

    pub fn element(mut self, n: i64) -> Self {
        self.element_number = Some(n);
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }
}

/// Accept `2` as well as `2.0`; models emit both.
fn whole_number<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(n) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(i) = n.as_i64() {
        return Ok(Some(i));
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() <= i64::MAX as f64 / 2.0 => Ok(Some(f as i64)),
        _ => Err(D::Error::custom(format!(
            "elementNumber must be a whole number, got {}",
            n
        ))),
    }
}

/// Why a target could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Miss {
    /// `elementNumber` does not exist in this turn's index.
    OutOfRange { number: i64, len: usize },
    /// Neither `elementNumber` nor both `x` and `y` were given.
    NoTarget,
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Miss::OutOfRange { number, len: 0 } => {
                write!(f, "element {} does not exist (no elements this turn)", number)
            }
            Miss::OutOfRange { number, len } => write!(
                f,
                "element {} does not exist (valid: 0..={})",
                number,
                len - 1
            ),
            Miss::NoTarget => f.write_str("no element number or coordinates given"),
        }
    }
}

/// Outcome of target resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    Element { index: usize, point: Point },
    Coordinates(Point),
    Unresolved(Miss),
}

impl Target {
    pub fn point(&self) -> Option<Point> {
        match self {
            Target::Element { point, .. } | Target::Coordinates(point) => Some(*point),
            Target::Unresolved(_) => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Element { index, point } => {
                write!(f, "element {} at ({}, {})", index, point.x, point.y)
            }
            Target::Coordinates(p) => write!(f, "({}, {})", p.x, p.y),
            Target::Unresolved(miss) => write!(f, "unresolved target: {}", miss),
        }
    }
}

/// Resolve the payload's target against this turn's index.
///
/// An `elementNumber` takes precedence; a missing or stale one never falls back
/// to coordinates.
pub fn resolve_target(index: &ElementIndex, payload: &ActionPayload) -> Target {
    if let Some(number) = payload.element_number {
        let found = usize::try_from(number).ok().and_then(|i| index.get(i));
        return match found {
            Some(el) => Target::Element {
                index: el.index,
                point: el.target(),
            },
            None => Target::Unresolved(Miss::OutOfRange {
                number,
                len: index.len(),
            }),
        };
    }
    match (payload.x, payload.y) {
        (Some(x), Some(y)) => Target::Coordinates(Point::new(x, y)),
        _ => Target::Unresolved(Miss::NoTarget),
    }
}

/// One kind of action the model may request.
#[async_trait]
pub trait Action: Send + Sync {
    /// Value of `actionType` this action answers to.
    fn action_type(&self) -> &'static str;

    /// Text block advertising the payload schema to the model.
    fn prompt_spec(&self) -> String;

    /// Human-readable description of a payload, for logs and reports.
    fn describe(&self, payload: &ActionPayload) -> String;

    /// Reject payloads missing required fields.
    fn validate(&self, _payload: &ActionPayload) -> Result<()> {
        Ok(())
    }

    /// Perform the action and describe what was actually done.
    async fn perform(
        &self,
        surface: &dyn Surface,
        index: &ElementIndex,
        payload: &ActionPayload,
    ) -> Result<String>;
}

/// Lookup table of action kinds keyed by `actionType`.
pub struct ActionRegistry {
    actions: BTreeMap<&'static str, Box<dyn Action>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ClickAction);
        registry.register(ScrollAction);
        registry.register(TypeAction);
        registry
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}

impl ActionRegistry {
    pub fn empty() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }

    /// Register an action, replacing any with the same type.
    pub fn register<A: Action + 'static>(&mut self, action: A) {
        self.actions.insert(action.action_type(), Box::new(action));
    }

    pub fn get(&self, action_type: &str) -> Option<&dyn Action> {
        self.actions.get(action_type).map(|a| a.as_ref())
    }

    pub fn contains(&self, action_type: &str) -> bool {
        self.actions.contains_key(action_type)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.actions.keys().copied().collect()
    }

    fn lookup(&self, action_type: &str) -> Result<&dyn Action> {
        self.get(action_type)
            .ok_or_else(|| Error::UnknownAction(action_type.to_string()))
    }

    /// Every registered action's prompt block, separated by blank lines.
    pub fn prompt_specs(&self) -> String {
        self.actions
            .values()
            .map(|a| a.prompt_spec())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn describe(&self, payload: &ActionPayload) -> Result<String> {
        Ok(self.lookup(&payload.action_type)?.describe(payload))
    }

    /// Validate and perform `payload`.
    pub async fn dispatch(
        &self,
        surface: &dyn Surface,
        index: &ElementIndex,
        payload: &ActionPayload,
    ) -> Result<String> {
        let action = self.lookup(&payload.action_type)?;
        action.validate(payload)?;
        action.perform(surface, index, payload).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::index_with;
    use super::*;

    #[test]
    fn test_resolve_element_center() {
        // grid 1 with one exposed sample collapses to a 1x1 rect at the origin
        let index = index_with(&[(0.0, 0.0, 10.0, 10.0), (119.5, 339.5, 10.0, 10.0)]);
        let target = resolve_target(&index, &ActionPayload::new("click").element(1));
        assert_eq!(
            target,
            Target::Element {
                index: 1,
                point: Point::new(120.0, 340.0)
            }
        );
    }

    #[test]
    fn test_resolve_empty_index_is_unresolvable() {
        let target = resolve_target(&ElementIndex::empty(), &ActionPayload::new("click").element(0));
        assert_eq!(
            target,
            Target::Unresolved(Miss::OutOfRange { number: 0, len: 0 })
        );
    }

    #[test]
    fn test_resolve_out_of_range_ignores_coordinates() {
        let index = index_with(&[(0.0, 0.0, 10.0, 10.0)]);
        let payload = ActionPayload::new("click").element(3).at(5.0, 5.0);
        assert!(matches!(
            resolve_target(&index, &payload),
            Target::Unresolved(Miss::OutOfRange { number: 3, len: 1 })
        ));
        let negative = ActionPayload::new("click").element(-1);
        assert!(resolve_target(&index, &negative).point().is_none());
    }

    #[test]
    fn test_resolve_coordinates_fallback() {
        let payload = ActionPayload::new("click").at(12.0, 34.0);
        assert_eq!(
            resolve_target(&ElementIndex::empty(), &payload),
            Target::Coordinates(Point::new(12.0, 34.0))
        );
        let mut only_x = ActionPayload::new("click");
        only_x.x = Some(1.0);
        assert_eq!(
            resolve_target(&ElementIndex::empty(), &only_x),
            Target::Unresolved(Miss::NoTarget)
        );
    }

    #[test]
    fn test_registry_defaults() {
        let registry = ActionRegistry::default();
        assert_eq!(registry.names(), vec!["click", "scroll", "type"]);
        let specs = registry.prompt_specs();
        assert!(specs.contains(r#""actionType": "click""#));
        assert!(specs.contains(r#""actionType": "scroll""#));
        assert!(specs.contains(r#""actionType": "type""#));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_action() {
        let registry = ActionRegistry::default();
        let surface = testing::Recorder::new(800.0, 600.0);
        let err = registry
            .dispatch(&surface, &ElementIndex::empty(), &ActionPayload::new("drag"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAction(ref t) if t == "drag"));
        assert!(surface.events().is_empty());
    }

    #[test]
    fn test_element_number_accepts_whole_floats() {
        let p: ActionPayload =
            serde_json::from_str(r#"{"actionType":"click","elementNumber":2.0}"#).unwrap();
        assert_eq!(p.element_number, Some(2));

        let p: ActionPayload =
            serde_json::from_str(r#"{"actionType":"click","elementNumber":null}"#).unwrap();
        assert_eq!(p.element_number, None);

        for bad in [
            r#"{"actionType":"click","elementNumber":2.5}"#,
            r#"{"actionType":"click","elementNumber":"2"}"#,
        ] {
            assert!(serde_json::from_str::<ActionPayload>(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_payload_wire_format() {
        let payload: ActionPayload = serde_json::from_str(
            r#"{"actionType":"scroll","elementNumber":0,"direction":"down","distance":"far"}"#,
        )
        .unwrap();
        assert_eq!(payload.action_type, "scroll");
        assert_eq!(payload.element_number, Some(0));
        assert_eq!(payload.direction, Some(Direction::Down));
        assert_eq!(payload.distance, Some(Distance::Far));

        let json = serde_json::to_string(&ActionPayload::new("click").element(2)).unwrap();
        assert_eq!(json, r#"{"actionType":"click","elementNumber":2}"#);
    }
}
