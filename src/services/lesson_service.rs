use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::content::GeneratedContent;
use super::llm_provider::{LLMError, LLMProvider};

pub const DEFAULT_LEVEL: &str = "beginner";
pub const LEVELS: [&str; 3] = ["beginner", "intermediate", "advanced"];
pub const CONTENT_TYPES: [&str; 4] = ["dialogue", "story", "vocabulary", "grammar"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedLesson {
    pub id: String,
    pub topic: String,
    pub level: String,
    pub content_type: String,
    pub title: String,
    pub content: GeneratedContent,
    pub usage_count: i32,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub topic: String,
    pub level: Option<String>,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutcome {
    pub reused: bool,
    #[serde(flatten)]
    pub lesson: GeneratedLesson,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("content provider failed: {0}")]
    Provider(#[from] LLMError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub fn is_valid_level(level: &str) -> bool {
    LEVELS.contains(&level)
}

pub fn is_valid_content_type(content_type: &str) -> bool {
    CONTENT_TYPES.contains(&content_type)
}

/// Personalized lesson generation backed by the generated-content store.
/// Matching stored lessons are reused least-used-first; only a store miss
/// reaches the LLM.
#[derive(Clone)]
pub struct LessonService {
    llm: LLMProvider,
}

impl LessonService {
    pub fn from_env() -> Self {
        Self {
            llm: LLMProvider::from_env(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.llm.is_available()
    }

    pub async fn generate(
        &self,
        pool: &PgPool,
        request: &GenerateRequest,
        profile_level: Option<&str>,
        interests: &[String],
    ) -> Result<GenerateOutcome, GenerateError> {
        let topic = request.topic.trim();
        let level = pick_level(request.level.as_deref(), profile_level);
        let content_type = request.content_type.trim().to_lowercase();

        if let Some(mut lesson) = find_least_used(pool, topic, &level, &content_type).await? {
            lesson.usage_count = increment_usage(pool, &lesson.id).await?;
            info!(lesson_id = %lesson.id, topic, "reusing stored lesson");
            return Ok(GenerateOutcome {
                reused: true,
                lesson,
            });
        }

        let raw = self
            .llm
            .chat_json(
                &system_prompt(&content_type),
                &user_prompt(topic, &level, interests),
            )
            .await?;
        let content = GeneratedContent::parse(&raw);
        let title = content
            .title()
            .map(|t| t.to_string())
            .unwrap_or_else(|| default_title(topic));

        let lesson = insert_generated(pool, topic, &level, &content_type, &title, &content).await?;
        info!(lesson_id = %lesson.id, topic, structured = content.is_structured(), "generated new lesson");
        Ok(GenerateOutcome {
            reused: false,
            lesson,
        })
    }
}

pub async fn list_generated(pool: &PgPool, limit: i64) -> Result<Vec<GeneratedLesson>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "id", "topic", "level", "contentType", "title", "content", "usageCount", "createdAt"
        FROM "generated_lessons"
        ORDER BY "createdAt" DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(lesson_from_row).collect()
}

pub async fn get_generated(pool: &PgPool, id: &str) -> Result<Option<GeneratedLesson>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id", "topic", "level", "contentType", "title", "content", "usageCount", "createdAt"
        FROM "generated_lessons"
        WHERE "id" = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(lesson_from_row).transpose()
}

async fn find_least_used(
    pool: &PgPool,
    topic: &str,
    level: &str,
    content_type: &str,
) -> Result<Option<GeneratedLesson>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "id", "topic", "level", "contentType", "title", "content", "usageCount", "createdAt"
        FROM "generated_lessons"
        WHERE LOWER("topic") = LOWER($1) AND "level" = $2 AND "contentType" = $3
        ORDER BY "usageCount" ASC, "createdAt" ASC
        LIMIT 1
        "#,
    )
    .bind(topic)
    .bind(level)
    .bind(content_type)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(lesson_from_row).transpose()
}

async fn increment_usage(pool: &PgPool, id: &str) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        UPDATE "generated_lessons"
        SET "usageCount" = "usageCount" + 1, "updatedAt" = NOW()
        WHERE "id" = $1
        RETURNING "usageCount"
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await
}

async fn insert_generated(
    pool: &PgPool,
    topic: &str,
    level: &str,
    content_type: &str,
    title: &str,
    content: &GeneratedContent,
) -> Result<GeneratedLesson, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let content_value =
        serde_json::to_value(content).unwrap_or_else(|_| serde_json::json!({ "type": "rawText", "text": "" }));

    let row = sqlx::query(
        r#"
        INSERT INTO "generated_lessons"
            ("id", "topic", "level", "contentType", "title", "content", "usageCount")
        VALUES ($1, $2, $3, $4, $5, $6, 1)
        RETURNING "id", "topic", "level", "contentType", "title", "content", "usageCount", "createdAt"
        "#,
    )
    .bind(&id)
    .bind(topic)
    .bind(level)
    .bind(content_type)
    .bind(title)
    .bind(content_value)
    .fetch_one(pool)
    .await?;

    lesson_from_row(&row)
}

fn lesson_from_row(row: &sqlx::postgres::PgRow) -> Result<GeneratedLesson, sqlx::Error> {
    let content_value: serde_json::Value = row.try_get("content")?;
    let content = serde_json::from_value(content_value.clone()).unwrap_or(GeneratedContent::RawText {
        text: content_value.to_string(),
    });
    let created_at: NaiveDateTime = row.try_get("createdAt")?;

    Ok(GeneratedLesson {
        id: row.try_get("id")?,
        topic: row.try_get("topic")?,
        level: row.try_get("level")?,
        content_type: row.try_get("contentType")?,
        title: row.try_get("title")?,
        content,
        usage_count: row.try_get("usageCount")?,
        created_at: naive_to_ms(created_at),
    })
}

fn naive_to_ms(value: NaiveDateTime) -> i64 {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc).timestamp_millis()
}

fn pick_level(requested: Option<&str>, profile_level: Option<&str>) -> String {
    requested
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or(profile_level)
        .unwrap_or(DEFAULT_LEVEL)
        .to_lowercase()
}

fn default_title(topic: &str) -> String {
    format!("Korean lesson: {topic}")
}

fn system_prompt(content_type: &str) -> String {
    format!(
        "You are a Korean language tutor. Produce a {content_type} lesson as a single JSON object \
         with keys \"title\" (string), \"dialogue\" (array of objects with \"speaker\", \"korean\", \
         \"english\"), \"vocabulary\" (array of objects with \"korean\", \"romanization\", \
         \"english\") and \"culturalNotes\" (array of strings). Respond with JSON only."
    )
}

fn user_prompt(topic: &str, level: &str, interests: &[String]) -> String {
    let mut prompt = format!("Create a {level}-level Korean lesson about \"{topic}\".");
    if !interests.is_empty() {
        prompt.push_str(" Where it fits naturally, tie examples to the learner's interests: ");
        prompt.push_str(&interests.join(", "));
        prompt.push('.');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_level_precedence() {
        assert_eq!(pick_level(Some("Advanced"), Some("beginner")), "advanced");
        assert_eq!(pick_level(Some("  "), Some("intermediate")), "intermediate");
        assert_eq!(pick_level(None, Some("intermediate")), "intermediate");
        assert_eq!(pick_level(None, None), "beginner");
    }

    #[test]
    fn test_validation_lists() {
        assert!(is_valid_level("beginner"));
        assert!(!is_valid_level("expert"));
        assert!(is_valid_content_type("dialogue"));
        assert!(!is_valid_content_type("podcast"));
    }

    #[test]
    fn test_prompts_carry_request_and_profile() {
        let system = system_prompt("dialogue");
        assert!(system.contains("dialogue lesson"));
        assert!(system.contains("\"culturalNotes\""));

        let interests = vec!["k-pop".to_string(), "cooking".to_string()];
        let user = user_prompt("ordering food", "intermediate", &interests);
        assert!(user.contains("ordering food"));
        assert!(user.contains("intermediate-level"));
        assert!(user.contains("k-pop, cooking"));

        let plain = user_prompt("weather", "beginner", &[]);
        assert!(!plain.contains("interests"));
    }

    #[test]
    fn test_default_title_falls_back_to_topic() {
        assert_eq!(default_title("weather"), "Korean lesson: weather");
    }
}
