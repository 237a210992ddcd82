use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{resolve_target, Action, ActionPayload};
use crate::geometry::{Point, Viewport};
use crate::surface::Surface;
use crate::visibility::ElementIndex;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Scroll distance as a fraction of the viewport: a quarter, a half, or all of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    Little,
    Medium,
    Far,
}

impl Distance {
    fn divisor(self) -> f64 {
        match self {
            Distance::Little => 4.0,
            Distance::Medium => 2.0,
            Distance::Far => 1.0,
        }
    }
}

/// Wheel delta for a scroll. Truncated toward zero; up and left are negative.
pub fn scroll_delta(viewport: Viewport, direction: Direction, distance: Distance) -> (f64, f64) {
    let span = |extent: f64| (extent / distance.divisor()).trunc();
    match direction {
        Direction::Down => (0.0, span(viewport.height)),
        Direction::Up => (0.0, -span(viewport.height)),
        Direction::Right => (span(viewport.width), 0.0),
        Direction::Left => (-span(viewport.width), 0.0),
    }
}

/// Wheel scroll over an element, or over the top-left corner when none is given.
pub struct ScrollAction;

#[async_trait]
impl Action for ScrollAction {
    fn action_type(&self) -> &'static str {
        "scroll"
    }

    fn prompt_spec(&self) -> String {
        r#"To scroll the page or a scrollable element use the following action structure:
    1. "actionType": "scroll" (required)
    2. "elementNumber": The number of the element to scroll inside of. The number is shown in the yellow circle on the element in the screenshot. Omit it to scroll the whole page.
    3. "direction": One of "up", "down", "left" or "right". (required)
    4. "distance": One of "little", "medium" or "far". (required)"#
            .to_string()
    }

    fn describe(&self, payload: &ActionPayload) -> String {
        let direction = payload
            .direction
            .map(|d| format!("{:?}", d).to_lowercase())
            .unwrap_or_else(|| "?".into());
        let distance = payload
            .distance
            .map(|d| format!("{:?}", d).to_lowercase())
            .unwrap_or_else(|| "?".into());
        match payload.element_number {
            Some(n) => format!("Scroll {} {} in element {}", direction, distance, n),
            None => format!("Scroll {} {}", direction, distance),
        }
    }

    fn validate(&self, payload: &ActionPayload) -> Result<()> {
        if payload.direction.is_none() {
            return Err(Error::Validation("scroll requires a direction".into()));
        }
        if payload.distance.is_none() {
            return Err(Error::Validation("scroll requires a distance".into()));
        }
        Ok(())
    }

    async fn perform(
        &self,
        surface: &dyn Surface,
        index: &ElementIndex,
        payload: &ActionPayload,
    ) -> Result<String> {
        let (Some(direction), Some(distance)) = (payload.direction, payload.distance) else {
            return Err(Error::Validation("scroll requires a direction and a distance".into()));
        };

        let viewport = match index.viewport() {
            Some(v) => v,
            None => surface.viewport().await?,
        };
        let point = resolve_target(index, payload).point().unwrap_or(Point::ORIGIN);
        let (dx, dy) = scroll_delta(viewport, direction, distance);

        debug!("scroll at ({}, {}) by ({}, {})", point.x, point.y, dx, dy);
        surface.move_pointer(point).await?;
        surface.wheel(point, dx, dy).await?;
        Ok(format!("Scrolled by ({}, {}) at ({}, {})", dx, dy, point.x, point.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::{index_with, Event, Recorder};

    fn scroll(direction: Direction, distance: Distance) -> ActionPayload {
        let mut p = ActionPayload::new("scroll");
        p.direction = Some(direction);
        p.distance = Some(distance);
        p
    }

    #[test]
    fn test_scroll_delta_fractions() {
        let vp = Viewport::new(1024.0, 768.0);
        assert_eq!(scroll_delta(vp, Direction::Down, Distance::Medium), (0.0, 384.0));
        assert_eq!(scroll_delta(vp, Direction::Down, Distance::Little), (0.0, 192.0));
        assert_eq!(scroll_delta(vp, Direction::Up, Distance::Far), (0.0, -768.0));
        assert_eq!(scroll_delta(vp, Direction::Left, Distance::Far), (-1024.0, 0.0));
        assert_eq!(scroll_delta(vp, Direction::Right, Distance::Little), (256.0, 0.0));
    }

    #[test]
    fn test_scroll_delta_truncates() {
        let vp = Viewport::new(390.0, 845.0);
        assert_eq!(scroll_delta(vp, Direction::Down, Distance::Medium), (0.0, 422.0));
        assert_eq!(scroll_delta(vp, Direction::Up, Distance::Little), (0.0, -211.0));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut p = ActionPayload::new("scroll");
        p.direction = Some(Direction::Down);
        assert!(matches!(ScrollAction.validate(&p), Err(Error::Validation(_))));

        let mut p = ActionPayload::new("scroll");
        p.distance = Some(Distance::Far);
        assert!(matches!(ScrollAction.validate(&p), Err(Error::Validation(_))));

        assert!(ScrollAction.validate(&scroll(Direction::Up, Distance::Far)).is_ok());
    }

    #[tokio::test]
    async fn test_scroll_page_from_origin() {
        let surface = Recorder::new(1024.0, 768.0);
        ScrollAction
            .perform(&surface, &ElementIndex::empty(), &scroll(Direction::Down, Distance::Medium))
            .await
            .unwrap();
        assert_eq!(
            surface.events(),
            vec![
                Event::Move(Point::ORIGIN),
                Event::Wheel(Point::ORIGIN, 0.0, 384.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_scroll_inside_element() {
        let surface = Recorder::new(1024.0, 768.0);
        let index = index_with(&[(299.5, 199.5, 10.0, 10.0)]);
        ScrollAction
            .perform(&surface, &index, &scroll(Direction::Left, Distance::Far).element(0))
            .await
            .unwrap();
        let at = Point::new(300.0, 200.0);
        assert_eq!(
            surface.events(),
            vec![Event::Move(at), Event::Wheel(at, -1024.0, 0.0)]
        );
    }

    #[tokio::test]
    async fn test_dispatch_rejects_before_acting() {
        let registry = crate::actions::ActionRegistry::default();
        let surface = Recorder::new(1024.0, 768.0);
        let err = registry
            .dispatch(&surface, &ElementIndex::empty(), &ActionPayload::new("scroll"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(surface.events().is_empty());
    }
}
