use async_trait::async_trait;
use tracing::info;

use super::{resolve_target, Action, ActionPayload, Target};
use crate::surface::Surface;
use crate::visibility::ElementIndex;
use crate::Result;

/// Pointer click at an element's center or at raw coordinates.
pub struct ClickAction;

#[async_trait]
impl Action for ClickAction {
    fn action_type(&self) -> &'static str {
        "click"
    }

    fn prompt_spec(&self) -> String {
        r#"To click on an element use the following action structure:
    1. "actionType": "click" (required)
    2. "elementNumber": The number of the element that is to be acted upon. The number is shown in the yellow circle on the element in the screenshot. (required)"#
            .to_string()
    }

    fn describe(&self, payload: &ActionPayload) -> String {
        match (payload.element_number, payload.x, payload.y) {
            (Some(n), _, _) => format!("Click on element {}", n),
            (None, Some(x), Some(y)) => format!("Click at ({}, {})", x, y),
            _ => "Click without a target".to_string(),
        }
    }

    async fn perform(
        &self,
        surface: &dyn Surface,
        index: &ElementIndex,
        payload: &ActionPayload,
    ) -> Result<String> {
        let target = resolve_target(index, payload);
        match target {
            Target::Unresolved(miss) => {
                info!("click skipped: {}", miss);
                Ok(format!("Nothing clicked: {}", miss))
            }
            Target::Element { point, .. } | Target::Coordinates(point) => {
                surface.click_at(point).await?;
                Ok(format!("Clicked {}", target))
            }
        }
    }
}
