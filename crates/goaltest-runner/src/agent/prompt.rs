use goaltest_agent::ActionRegistry;

const PREAMBLE: &str = r#"You are going to test a website. You will be given a URL and a screenshot of the website.
You try to understand the screenshot's content and layout. From that you determine what the next logical
action will be to reach the given goal below.
Look back through all previous actions (if any) to see what your intention was and what you expected to happen and follow up on your intentions.
Change tactics to reach your goal if necessary. But do not repeat yourself!

Every time you receive a screenshot of the website you determine your next action.
You return a JSON structure that contains that action in the following form, all other fields are required:
- "description": A brief description of the action you are going to perform. Use enough detail to use it as a history of what you did in next steps.
- "action": The action you are going to take, see below for the structure.
- "expectation": Your prediction of what will happen when the action is taken. You are going to check this in the next step!
- "step": A number representing the order or sequence of the action in achieving the goal.
- "url": The url of the screenshot you are looking at.
- "goal": Restate the overarching goal you are trying to reach.
- "achieved": A boolean (true or false) indicating if the goal has been achieved or not. If so, action can be empty as this run is finished.
- "previousExpectation": The expectation of the previous step.
- "expectationSatisfied": A boolean (true or false) indicating if the previous expectation was met. Remember to evaluate the expectation of the previous step to carefully determine if it was met or not.
- "frustrationLevel": A number between 1 and 10 indicating how frustrated you are with the website. 1 is not frustrated at all, 10 is very frustrated.
- "frustrationLevelReason": A brief description of where your frustrationLevel is coming from.

The following actions are available:

"#;

const GUIDANCE: &str = r#"Some things to take into consideration:
- If there is any cookiebar present, click it away first.
- If you need to search and both a text input field and a search icon or search button are next to each other, start with the text input field.
- If only a search icon or search button is present, click it first.
- You can end a single line input text with \n to press the enter key.
- Only use elementNumbers from the current screenshot, never from a previous one, as numbers change between screenshots!

Please only output the JSON structure, nothing else."#;

/// The system turn: decision schema, every registered action, guidance, goal.
pub fn system_prompt(goal: &str, registry: &ActionRegistry) -> String {
    format!(
        "{}{}\n\n{}\n\nGoal: {}",
        PREAMBLE,
        registry.prompt_specs(),
        GUIDANCE,
        goal
    )
}

/// Text part of the user turn for `step`.
pub fn user_cue(step: usize, url: &str) -> String {
    format!(
        "This is step {}. Continue with this image, what's your next action? The url is {}",
        step, url
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_lists_actions_and_goal() {
        let prompt = system_prompt("log in", &ActionRegistry::default());
        assert!(prompt.contains(r#""actionType": "click""#));
        assert!(prompt.contains(r#""actionType": "scroll""#));
        assert!(prompt.contains(r#""actionType": "type""#));
        assert!(prompt.ends_with("Goal: log in"));
    }

    #[test]
    fn test_user_cue() {
        assert_eq!(
            user_cue(1, "https://example.com/"),
            "This is step 1. Continue with this image, what's your next action? The url is https://example.com/"
        );
    }
}
