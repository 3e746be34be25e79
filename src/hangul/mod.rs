pub mod progression;
pub mod quiz;

use serde::{Deserialize, Serialize};

/// Tag that marks a lesson as a vowel lesson. Lessons without it are
/// classified as consonants.
pub const VOWEL_TAG: &str = "vowel";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HangulLesson {
    pub id: String,
    pub character: String,
    pub romanization: String,
    pub description: String,
    pub character_type: Vec<String>,
    pub order_index: i32,
    pub examples: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Vowels,
    Consonants,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::Vowels, Section::Consonants];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "vowels" => Some(Section::Vowels),
            "consonants" => Some(Section::Consonants),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Vowels => "vowels",
            Section::Consonants => "consonants",
        }
    }

    /// The section that must be fully completed before this one unlocks.
    /// `None` means the section is always available.
    pub fn prerequisite(&self) -> Option<Section> {
        match self {
            Section::Vowels => None,
            Section::Consonants => Some(Section::Vowels),
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
