//! The assistant's per-step decision, parsed from a fenced JSON block.

use goaltest_agent::{ActionPayload, ActionRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionPayload>,
    #[serde(default)]
    pub expectation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub goal: String,
    pub achieved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_expectation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectation_satisfied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frustration_level: Option<i64>,
    #[serde(default)]
    pub frustration_level_reason: String,
}

/// Extract the JSON body from a reply. Takes the first ```` ```json ```` or bare
/// ```` ``` ```` fence; a reply without a fence is used as is.
pub fn extract_json(reply: &str) -> &str {
    let Some(open) = reply.find("```") else {
        return reply.trim();
    };
    let after = &reply[open + 3..];
    // skip the info string ("json") up to the end of the fence line
    let body = match after.find('\n') {
        Some(nl) => &after[nl + 1..],
        None => after,
    };
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

impl Decision {
    /// Parse and check a reply against the registered actions.
    pub fn parse(reply: &str, registry: &ActionRegistry) -> Result<Self> {
        let body = extract_json(reply);
        if body.is_empty() {
            return Err(Error::Protocol("empty decision".into()));
        }

        let mut value: Value = serde_json::from_str(body)
            .map_err(|e| Error::Protocol(format!("decision is not valid JSON: {}", e)))?;
        let Some(object) = value.as_object_mut() else {
            return Err(Error::Protocol("decision is not a JSON object".into()));
        };

        // models send null for fields they consider not applicable
        object.retain(|_, v| !v.is_null());
        // once achieved the action is never performed, so a malformed one is dropped
        if object.get("achieved") == Some(&Value::Bool(true)) {
            let unusable = object
                .get("action")
                .map(|a| ActionPayload::deserialize(a).is_err())
                .unwrap_or(false);
            if unusable {
                object.remove("action");
            }
        }

        let decision: Decision = serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("malformed decision: {}", e)))?;

        if !decision.achieved {
            let Some(action) = &decision.action else {
                return Err(Error::Protocol("no action given and goal not achieved".into()));
            };
            if !registry.contains(&action.action_type) {
                return Err(Error::Protocol(format!(
                    "unknown action type '{}'",
                    action.action_type
                )));
            }
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goaltest_agent::{Direction, Distance};

    fn parse(reply: &str) -> Result<Decision> {
        Decision::parse(reply, &ActionRegistry::default())
    }

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), r#"{"a":1}"#);
        assert_eq!(extract_json("Sure!\n```\n{\"a\":1}\n```\nDone."), r#"{"a":1}"#);
        assert_eq!(extract_json("  {\"a\":1} "), r#"{"a":1}"#);
        assert_eq!(extract_json("```json\n{\"a\":1}"), r#"{"a":1}"#);
    }

    #[test]
    fn test_parse_full_decision() {
        let reply = r#"```json
{
    "description": "Click the login button",
    "action": {"actionType": "click", "elementNumber": 2},
    "expectation": "A login form appears",
    "step": 1,
    "url": "https://example.com",
    "goal": "log in",
    "achieved": false,
    "previousExpectation": "",
    "expectationSatisfied": true,
    "frustrationLevel": 1,
    "frustrationLevelReason": "none"
}
```"#;
        let d = parse(reply).unwrap();
        assert!(!d.achieved);
        let action = d.action.unwrap();
        assert_eq!(action.action_type, "click");
        assert_eq!(action.element_number, Some(2));
        assert_eq!(d.expectation, "A login form appears");
        assert_eq!(d.frustration_level, Some(1));
    }

    #[test]
    fn test_achieved_needs_no_action() {
        let d = parse("```json\n{\"achieved\": true, \"action\": {}}\n```").unwrap();
        assert!(d.achieved);
        assert!(d.action.is_none());

        let d = parse("{\"achieved\": true, \"action\": null, \"description\": null}").unwrap();
        assert!(d.action.is_none());
        assert_eq!(d.description, "");
    }

    #[test]
    fn test_achieved_drops_malformed_action() {
        for reply in [
            r#"{"achieved": true, "action": {"actionType": "scroll", "direction": "sideways"}}"#,
            r#"{"achieved": true, "action": {"actionType": "click", "elementNumber": "two"}}"#,
            r#"{"achieved": true, "action": "none"}"#,
        ] {
            let d = parse(reply).unwrap();
            assert!(d.achieved);
            assert!(d.action.is_none(), "{}", reply);
        }

        // a well-formed action is kept for the report
        let d = parse(r#"{"achieved": true, "action": {"actionType": "click", "elementNumber": 1}}"#)
            .unwrap();
        assert_eq!(d.action.unwrap().element_number, Some(1));
    }

    #[test]
    fn test_scroll_payload() {
        let d = parse(
            r#"{"achieved": false, "action": {"actionType": "scroll", "direction": "down", "distance": "little"}}"#,
        )
        .unwrap();
        let action = d.action.unwrap();
        assert_eq!(action.direction, Some(Direction::Down));
        assert_eq!(action.distance, Some(Distance::Little));
    }

    #[test]
    fn test_protocol_errors() {
        for reply in [
            "",
            "```json\n```",
            "I think I should click the button.",
            "[1, 2]",
            r#"{"description": "no achieved field"}"#,
            r#"{"achieved": false}"#,
            r#"{"achieved": false, "action": {"actionType": "drag"}}"#,
            r#"{"achieved": false, "action": {"elementNumber": 1}}"#,
            r#"{"achieved": false, "action": {"actionType": "scroll", "direction": "sideways"}}"#,
        ] {
            assert!(
                matches!(parse(reply), Err(Error::Protocol(_))),
                "expected protocol error for {:?}",
                reply
            );
        }
    }
}
