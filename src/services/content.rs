//! Normalization boundary for LLM lesson output. Whatever the provider
//! returns is parsed exactly once, here, into a tagged value; everything
//! downstream (storage, responses) works with `GeneratedContent` only.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueLine {
    pub speaker: String,
    pub korean: String,
    pub english: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
    pub korean: String,
    pub romanization: String,
    pub english: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GeneratedContent {
    #[serde(rename_all = "camelCase")]
    Structured {
        title: String,
        dialogue: Vec<DialogueLine>,
        vocabulary: Vec<VocabularyEntry>,
        #[serde(default)]
        cultural_notes: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    RawText { text: String },
}

impl GeneratedContent {
    /// Parses raw provider output. Valid lesson JSON (possibly wrapped in a
    /// markdown code fence) becomes `Structured`; anything else degrades to
    /// `RawText` instead of failing the request.
    pub fn parse(raw: &str) -> Self {
        let cleaned = strip_code_fences(raw);
        let Ok(value) = serde_json::from_str::<serde_json::Value>(cleaned) else {
            return Self::raw(raw);
        };
        let Some(object) = value.as_object() else {
            return Self::raw(raw);
        };

        let title = object
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        let dialogue: Vec<DialogueLine> = object
            .get("dialogue")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(parse_dialogue_line).collect())
            .unwrap_or_default();
        let vocabulary: Vec<VocabularyEntry> = object
            .get("vocabulary")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(parse_vocabulary_entry).collect())
            .unwrap_or_default();
        let cultural_notes: Vec<String> = object
            .get("culturalNotes")
            .or_else(|| object.get("cultural_notes"))
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if dialogue.is_empty() && vocabulary.is_empty() {
            return Self::raw(raw);
        }

        Self::Structured {
            title,
            dialogue,
            vocabulary,
            cultural_notes,
        }
    }

    fn raw(text: &str) -> Self {
        Self::RawText {
            text: text.trim().to_string(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Structured { title, .. } if !title.is_empty() => Some(title),
            _ => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured { .. })
    }
}

fn parse_dialogue_line(value: &serde_json::Value) -> Option<DialogueLine> {
    let object = value.as_object()?;
    let korean = non_empty_str(object.get("korean")?)?;
    Some(DialogueLine {
        speaker: object
            .get("speaker")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string(),
        korean,
        english: object
            .get("english")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string(),
    })
}

fn parse_vocabulary_entry(value: &serde_json::Value) -> Option<VocabularyEntry> {
    let object = value.as_object()?;
    let korean = non_empty_str(object.get("korean")?)?;
    Some(VocabularyEntry {
        korean,
        romanization: object
            .get("romanization")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string(),
        english: object
            .get("english")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string(),
    })
}

fn non_empty_str(value: &serde_json::Value) -> Option<String> {
    let s = value.as_str()?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = after_open
        .split_once('\n')
        .map(|(_, rest)| rest)
        .unwrap_or(after_open);
    body.rsplit_once("```")
        .map(|(inner, _)| inner)
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_LESSON: &str = r#"{
        "title": "Ordering Coffee",
        "dialogue": [
            { "speaker": "A", "korean": "아메리카노 주세요", "english": "An americano, please" },
            { "speaker": "B", "korean": "네, 알겠습니다", "english": "Sure thing" }
        ],
        "vocabulary": [
            { "korean": "커피", "romanization": "keopi", "english": "coffee" }
        ],
        "culturalNotes": ["Cafes often stay open past midnight."]
    }"#;

    #[test]
    fn test_valid_lesson_json_parses_structured() {
        let content = GeneratedContent::parse(FULL_LESSON);
        match &content {
            GeneratedContent::Structured {
                title,
                dialogue,
                vocabulary,
                cultural_notes,
            } => {
                assert_eq!(title, "Ordering Coffee");
                assert_eq!(dialogue.len(), 2);
                assert_eq!(dialogue[0].korean, "아메리카노 주세요");
                assert_eq!(vocabulary.len(), 1);
                assert_eq!(vocabulary[0].romanization, "keopi");
                assert_eq!(cultural_notes.len(), 1);
            }
            GeneratedContent::RawText { .. } => panic!("expected structured content"),
        }
        assert_eq!(content.title(), Some("Ordering Coffee"));
    }

    #[test]
    fn test_code_fences_are_stripped() {
        let fenced = format!("```json\n{FULL_LESSON}\n```");
        assert!(GeneratedContent::parse(&fenced).is_structured());

        let bare_fence = format!("```\n{FULL_LESSON}\n```");
        assert!(GeneratedContent::parse(&bare_fence).is_structured());
    }

    #[test]
    fn test_prose_degrades_to_raw_text() {
        let content = GeneratedContent::parse("Sorry, I can't produce a lesson right now.");
        assert_eq!(
            content,
            GeneratedContent::RawText {
                text: "Sorry, I can't produce a lesson right now.".to_string()
            }
        );
        assert_eq!(content.title(), None);
    }

    #[test]
    fn test_json_without_lesson_body_degrades() {
        let content = GeneratedContent::parse(r#"{ "title": "Empty", "note": "nothing here" }"#);
        assert!(!content.is_structured());

        let array = GeneratedContent::parse(r#"[1, 2, 3]"#);
        assert!(!array.is_structured());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let content = GeneratedContent::parse(
            r#"{
                "dialogue": [
                    { "speaker": "A", "korean": "안녕", "english": "hi" },
                    { "speaker": "B", "english": "missing korean" },
                    "not even an object"
                ],
                "vocabulary": [ { "korean": "" } ]
            }"#,
        );
        match content {
            GeneratedContent::Structured {
                dialogue,
                vocabulary,
                ..
            } => {
                assert_eq!(dialogue.len(), 1);
                assert!(vocabulary.is_empty());
            }
            GeneratedContent::RawText { .. } => panic!("expected structured content"),
        }
    }

    #[test]
    fn test_storage_shape_is_tagged() {
        let stored = serde_json::to_value(GeneratedContent::parse(FULL_LESSON)).unwrap();
        assert_eq!(stored["type"], "structured");
        assert_eq!(stored["culturalNotes"][0], "Cafes often stay open past midnight.");

        let raw = serde_json::to_value(GeneratedContent::RawText {
            text: "plain".to_string(),
        })
        .unwrap();
        assert_eq!(raw["type"], "rawText");

        let back: GeneratedContent = serde_json::from_value(stored).unwrap();
        assert!(back.is_structured());
    }
}
