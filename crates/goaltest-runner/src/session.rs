//! The conversation with the decision backend.
//!
//! A [`Session`] is the ordered, append-only list of [`Turn`]s. It is persisted
//! as a JSON array by full overwrite. Older recordings stored `content` as a
//! single string; those are upgraded to one text part when read.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One piece of turn content. Image data is base64 JPEG without a data-URL prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String },
    Image { data: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTurn")]
pub struct Turn {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct RawTurn {
    role: Role,
    content: RawContent,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawContent {
    Parts(Vec<ContentPart>),
    Legacy(String),
}

impl From<RawTurn> for Turn {
    fn from(raw: RawTurn) -> Self {
        let content = match raw.content {
            RawContent::Parts(parts) => parts,
            RawContent::Legacy(text) => vec![ContentPart::Text { text }],
        };
        Turn {
            role: raw.role,
            content,
        }
    }
}

impl Turn {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// A user turn carrying a cue and a screenshot.
    pub fn user_with_image(text: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![
                ContentPart::Text { text: text.into() },
                ContentPart::Image { data: image.into() },
            ],
        }
    }

    /// All text parts joined by newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn image(&self) -> Option<&str> {
        self.content.iter().find_map(|p| match p {
            ContentPart::Image { data } => Some(data.as_str()),
            ContentPart::Text { .. } => None,
        })
    }

    /// Copy of this turn with image parts removed.
    pub fn without_images(&self) -> Turn {
        Turn {
            role: self.role,
            content: self
                .content
                .iter()
                .filter(|p| matches!(p, ContentPart::Text { .. }))
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    turns: Vec<Turn>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh session holding only the system turn.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(prompt)],
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn assistant_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| t.role == Role::Assistant)
    }

    /// History as sent to the backend: images kept only on the newest user turn.
    pub fn history(&self) -> Vec<Turn> {
        let newest_user = self.turns.iter().rposition(|t| t.role == Role::User);
        self.turns
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if Some(i) == newest_user {
                    t.clone()
                } else {
                    t.without_images()
                }
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.turns)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let turns: Vec<Turn> = serde_json::from_str(json)?;
        Ok(Self { turns })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Overwrite `path` with the whole session, via a sibling temp file and a
    /// rename so readers never see a half-written file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = temp_path(path);
        fs::write(&tmp, self.to_json()?)?;
        fs::rename(&tmp, path)?;
        debug!("session saved: {} turns to {}", self.turns.len(), path.display());
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Session {
        let mut s = Session::with_system("goal: log in");
        s.push(Turn::user_with_image("This is step 0.", "AAAA"));
        s.push(Turn::assistant("```json\n{\"achieved\": false}\n```"));
        s.push(Turn::user_with_image("This is step 1.", "BBBB"));
        s
    }

    #[test]
    fn test_wire_format() {
        let turn = Turn::user_with_image("hi", "AAAA");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(
            json,
            r#"{"role":"user","content":[{"type":"text","text":"hi"},{"type":"image","data":"AAAA"}]}"#
        );
    }

    #[test]
    fn test_round_trip() {
        let session = sample();
        let back = Session::from_json(&session.to_json().unwrap()).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn test_legacy_string_content_upgraded() {
        let json = r#"[
            {"role": "system", "content": "You are going to test a website."},
            {"role": "user", "content": "Continue with this image, what's your next action?"},
            {"role": "assistant", "content": "```json\n{\"achieved\": true}\n```"}
        ]"#;
        let session = Session::from_json(json).unwrap();
        let roles: Vec<Role> = session.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(
            session.turns()[2].content,
            vec![ContentPart::Text {
                text: "```json\n{\"achieved\": true}\n```".into()
            }]
        );

        // upgraded sessions persist in the structured format
        let again = Session::from_json(&session.to_json().unwrap()).unwrap();
        assert_eq!(again, session);
        assert!(session.to_json().unwrap().contains(r#""type": "text""#));
    }

    #[test]
    fn test_history_keeps_only_newest_image() {
        let history = sample().history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].image(), None);
        assert_eq!(history[1].joined_text(), "This is step 0.");
        assert_eq!(history[3].image(), Some("BBBB"));
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");

        sample().save(&path).unwrap();
        let short = Session::with_system("other");
        short.save(&path).unwrap();

        assert_eq!(Session::load(&path).unwrap(), short);
        assert!(!dir.path().join("run.json.tmp").exists());
    }

    #[test]
    fn test_assistant_turns() {
        assert_eq!(sample().assistant_turns().count(), 1);
    }
}
