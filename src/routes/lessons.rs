use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};

use crate::response::{json_error, AppError};
use crate::services::lesson_service::{self, GenerateError, GenerateRequest};
use crate::services::llm_provider::LLMError;
use crate::state::AppState;

const MAX_TOPIC_CHARS: usize = 200;
const DEFAULT_CONTENT_TYPE: &str = "dialogue";

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateLessonRequest {
    topic: String,
    level: Option<String>,
    content_type: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_lessons))
        .route("/generate", post(generate_lesson))
        .route("/:id", get(get_lesson))
}

async fn list_lessons(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (proxy, _user) = require_user(&state, &headers).await?;

    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let lessons = lesson_service::list_generated(proxy.pool(), limit)
        .await
        .map_err(db_read_error)?;

    Ok(Json(SuccessResponse {
        success: true,
        data: lessons,
    }))
}

async fn get_lesson(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (proxy, _user) = require_user(&state, &headers).await?;

    let Some(lesson) = lesson_service::get_generated(proxy.pool(), &id)
        .await
        .map_err(db_read_error)?
    else {
        return Err(json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "lesson not found",
        ));
    };

    Ok(Json(SuccessResponse {
        success: true,
        data: lesson,
    }))
}

async fn generate_lesson(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<GenerateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (proxy, user) = require_user(&state, &headers).await?;

    let topic = payload.topic.trim().to_string();
    if topic.is_empty() {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "topic is required",
        ));
    }
    if topic.chars().count() > MAX_TOPIC_CHARS {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "topic must be at most 200 characters",
        ));
    }

    let level = match payload.level.as_deref() {
        Some(raw) => {
            let level = raw.trim().to_lowercase();
            if !lesson_service::is_valid_level(&level) {
                return Err(json_error(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "level must be one of beginner, intermediate, advanced",
                ));
            }
            Some(level)
        }
        None => None,
    };

    let content_type = payload
        .content_type
        .as_deref()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .trim()
        .to_lowercase();
    if !lesson_service::is_valid_content_type(&content_type) {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "contentType must be one of dialogue, story, vocabulary, grammar",
        ));
    }

    // Profile hints only personalize the prompt; a failed lookup must not
    // block generation.
    let (profile_level, interests) = match select_profile_hints(proxy.pool(), &user.id).await {
        Ok(hints) => hints,
        Err(err) => {
            tracing::warn!("failed to load profile hints: {}", err);
            (None, Vec::new())
        }
    };

    let request = GenerateRequest {
        topic,
        level,
        content_type,
    };

    let outcome = state
        .lesson_service()
        .generate(proxy.pool(), &request, profile_level.as_deref(), &interests)
        .await
        .map_err(generate_error)?;

    Ok(Json(SuccessResponse {
        success: true,
        data: outcome,
    }))
}

fn generate_error(err: GenerateError) -> AppError {
    match err {
        GenerateError::Provider(LLMError::NotConfigured(_)) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "content generation is not configured",
        ),
        GenerateError::Provider(err) => {
            tracing::error!("lesson generation failed: {}", err);
            json_error(
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_FAILED",
                "content provider failed",
            )
        }
        GenerateError::Database(err) => {
            tracing::error!("lesson store failed: {}", err);
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DB_ERROR",
                "database write failed",
            )
        }
    }
}

fn db_read_error(err: sqlx::Error) -> AppError {
    tracing::error!("lesson query failed: {}", err);
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "DB_ERROR",
        "database query failed",
    )
}

async fn select_profile_hints(
    pool: &PgPool,
    user_id: &str,
) -> Result<(Option<String>, Vec<String>), sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT "proficiencyLevel","interests" FROM "profiles" WHERE "userId" = $1 LIMIT 1"#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok((None, Vec::new()));
    };

    Ok((
        row.try_get::<String, _>("proficiencyLevel").ok(),
        row.try_get::<Vec<String>, _>("interests").unwrap_or_default(),
    ))
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
