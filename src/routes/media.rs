use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::cache::{image_key, speech_key};
use crate::response::{json_error, AppError};
use crate::services::speech_provider::SpeechError;
use crate::state::AppState;

const MAX_SPEECH_CHARS: usize = 500;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeechRequest {
    text: String,
    voice: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechResponse {
    audio_url: Option<String>,
    voice: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    image_url: Option<String>,
    generated: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/speech", post(speech))
        .route("/image/:lesson_id", post(lesson_image))
}

async fn speech(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SpeechRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (_proxy, _user) = require_user(&state, &headers).await?;

    let text = payload.text.trim().to_string();
    if text.is_empty() {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "text is required",
        ));
    }
    if text.chars().count() > MAX_SPEECH_CHARS {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "text must be at most 500 characters",
        ));
    }

    let provider = state.speech_provider();
    let voice = match payload.voice.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => provider.default_voice().to_string(),
    };

    let key = speech_key(&text, &voice);
    let result = state
        .media_cache()
        .get_or_fetch(&key, || {
            let provider = Arc::clone(&provider);
            let text = text.clone();
            let voice = voice.clone();
            async move {
                let bytes = provider.synthesize(&text, &voice).await?;
                Ok::<_, SpeechError>(format!(
                    "data:audio/mpeg;base64,{}",
                    STANDARD.encode(&bytes)
                ))
            }
        })
        .await;

    // Audio is an enhancement. Synthesis trouble degrades to a null
    // payload so the lesson flow keeps moving.
    let audio_url = match result {
        Ok(url) => Some(url.as_ref().clone()),
        Err(err) => {
            tracing::warn!("speech synthesis failed: {}", err);
            None
        }
    };

    Ok(Json(SuccessResponse {
        success: true,
        data: SpeechResponse { audio_url, voice },
    }))
}

async fn lesson_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (proxy, _user) = require_user(&state, &headers).await?;

    let Some(lesson) = select_lesson_media(proxy.pool(), &lesson_id)
        .await
        .map_err(db_read_error)?
    else {
        return Err(json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "lesson not found",
        ));
    };

    if let Some(existing) = lesson.image_url.as_deref() {
        if !existing.trim().is_empty() {
            return Ok(Json(SuccessResponse {
                success: true,
                data: ImageResponse {
                    image_url: Some(existing.to_string()),
                    generated: false,
                },
            }));
        }
    }

    let provider = state.image_provider();
    let prompt = image_prompt(&lesson);
    let key = image_key(&lesson.character);

    let result = state
        .media_cache()
        .get_or_fetch(&key, || {
            let provider = Arc::clone(&provider);
            let prompt = prompt.clone();
            async move { provider.generate(&prompt).await }
        })
        .await;

    let data = match result {
        Ok(url) => {
            let url = url.as_ref().clone();
            if let Err(err) = set_lesson_image(proxy.pool(), &lesson.id, &url).await {
                tracing::warn!("failed to store lesson image url: {}", err);
            }
            ImageResponse {
                image_url: Some(url),
                generated: true,
            }
        }
        Err(err) => {
            tracing::warn!("image generation failed: {}", err);
            ImageResponse {
                image_url: None,
                generated: false,
            }
        }
    };

    Ok(Json(SuccessResponse {
        success: true,
        data,
    }))
}

fn image_prompt(lesson: &LessonMedia) -> String {
    let mut prompt = format!(
        "A clean flashcard illustration for the Korean letter {} (romanized {})",
        lesson.character, lesson.romanization
    );
    let description = lesson.description.trim();
    if !description.is_empty() {
        prompt.push_str(": ");
        prompt.push_str(description);
    }
    prompt.push_str(". Flat colors, bold strokes, no text besides the letter itself.");
    prompt
}

fn db_read_error(err: sqlx::Error) -> AppError {
    tracing::error!("media query failed: {}", err);
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "DB_ERROR",
        "database query failed",
    )
}

async fn require_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(std::sync::Arc<crate::db::DatabaseProxy>, crate::auth::AuthUser), AppError> {
    let token = crate::auth::extract_token(headers).ok_or_else(|| {
        json_error(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "authentication required",
        )
    })?;

    let proxy = state.db_proxy().ok_or_else(|| {
        json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "service unavailable",
        )
    })?;

    let user = crate::auth::verify_request_token(&proxy, &token)
        .await
        .map_err(|_| {
            json_error(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "authentication failed",
            )
        })?;

    Ok((proxy, user))
}

struct LessonMedia {
    id: String,
    character: String,
    romanization: String,
    description: String,
    image_url: Option<String>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for LessonMedia {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LessonMedia {
            id: row.get("id"),
            character: row.get("character"),
            romanization: row.get("romanization"),
            description: row.get("description"),
            image_url: row.get("imageUrl"),
        })
    }
}

async fn select_lesson_media(
    pool: &PgPool,
    lesson_id: &str,
) -> Result<Option<LessonMedia>, sqlx::Error> {
    sqlx::query_as::<_, LessonMedia>(
        r#"
        SELECT "id","character","romanization","description","imageUrl"
        FROM "hangul_lessons"
        WHERE "id" = $1
        LIMIT 1
        "#,
    )
    .bind(lesson_id)
    .fetch_optional(pool)
    .await
}

async fn set_lesson_image(pool: &PgPool, lesson_id: &str, url: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE "hangul_lessons" SET "imageUrl" = $1, "updatedAt" = NOW() WHERE "id" = $2"#,
    )
    .bind(url)
    .bind(lesson_id)
    .execute(pool)
    .await?;

    Ok(())
}
