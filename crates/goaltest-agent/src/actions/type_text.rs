use async_trait::async_trait;
use tracing::info;

use super::{resolve_target, Action, ActionPayload, Miss, Target};
use crate::surface::Surface;
use crate::visibility::ElementIndex;
use crate::{Error, Result};

/// Focus an element by clicking it, then type into it. A trailing newline is
/// sent as an Enter key press.
pub struct TypeAction;

fn split_enter(text: &str) -> (&str, bool) {
    match text.strip_suffix('\n') {
        Some(rest) => (rest, true),
        None => (text, false),
    }
}

#[async_trait]
impl Action for TypeAction {
    fn action_type(&self) -> &'static str {
        "type"
    }

    fn prompt_spec(&self) -> String {
        r#"To type text into an input field use the following action structure:
    1. "actionType": "type" (required)
    2. "elementNumber": The number of the input element to type into. The number is shown in the yellow circle on the element in the screenshot. (required)
    3. "text": The text to type. End it with "\n" to press Enter afterwards. (required)"#
            .to_string()
    }

    fn describe(&self, payload: &ActionPayload) -> String {
        let text = payload.text.as_deref().unwrap_or_default();
        match payload.element_number {
            Some(n) => format!("Type {:?} into element {}", text, n),
            None => format!("Type {:?}", text),
        }
    }

    fn validate(&self, payload: &ActionPayload) -> Result<()> {
        match payload.text {
            Some(_) => Ok(()),
            None => Err(Error::Validation("type requires text".into())),
        }
    }

    async fn perform(
        &self,
        surface: &dyn Surface,
        index: &ElementIndex,
        payload: &ActionPayload,
    ) -> Result<String> {
        let Some(text) = payload.text.as_deref() else {
            return Err(Error::Validation("type requires text".into()));
        };

        let target = resolve_target(index, payload);
        match target {
            Target::Element { point, .. } | Target::Coordinates(point) => {
                surface.click_at(point).await?;
            }
            // never type into whatever happens to have focus instead
            Target::Unresolved(miss @ Miss::OutOfRange { .. }) => {
                info!("type skipped: {}", miss);
                return Ok(format!("Nothing typed: {}", miss));
            }
            Target::Unresolved(Miss::NoTarget) => {}
        }

        let (body, enter) = split_enter(text);
        if !body.is_empty() {
            surface.insert_text(body).await?;
        }
        if enter {
            surface.press_key("Enter").await?;
        }

        Ok(match target.point() {
            Some(_) => format!("Typed {:?} into {}", text, target),
            None => format!("Typed {:?} into the focused element", text),
        })
    }
}
