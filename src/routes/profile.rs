use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::response::{json_error, AppError};
use crate::services::lesson_service;
use crate::state::AppState;

const MAX_LEARNING_GOAL_CHARS: usize = 500;
const MAX_INTERESTS: usize = 20;
const MAX_INTEREST_CHARS: usize = 100;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    proficiency_level: Option<String>,
    learning_goal: Option<String>,
    interests: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    user_id: String,
    proficiency_level: String,
    learning_goal: Option<String>,
    interests: Vec<String>,
    created_at: i64,
    updated_at: i64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_profile).put(update_profile))
}

async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (proxy, user) = require_user(&state, &headers).await?;

    let Some(profile) = select_profile(proxy.pool(), &user.id).await? else {
        return Err(json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "profile not set up yet",
        ));
    };

    Ok(Json(SuccessResponse {
        success: true,
        data: profile,
    }))
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (proxy, user) = require_user(&state, &headers).await?;

    let level_update = match payload.proficiency_level.as_deref() {
        Some(raw) => {
            let level = raw.trim().to_lowercase();
            if !lesson_service::is_valid_level(&level) {
                return Err(json_error(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "proficiencyLevel must be one of beginner, intermediate, advanced",
                ));
            }
            Some(level)
        }
        None => None,
    };

    // An empty string clears the goal; an absent field leaves it untouched.
    let mut goal_update: Option<Option<String>> = None;
    if let Some(raw) = payload.learning_goal.as_deref() {
        let goal = raw.trim();
        if goal.chars().count() > MAX_LEARNING_GOAL_CHARS {
            return Err(json_error(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "learningGoal must be at most 500 characters",
            ));
        }
        goal_update = Some(if goal.is_empty() {
            None
        } else {
            Some(goal.to_string())
        });
    }

    let interests_update = match payload.interests {
        Some(raw) => {
            let interests: Vec<String> = raw
                .iter()
                .map(|entry| entry.trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect();
            if interests.len() > MAX_INTERESTS {
                return Err(json_error(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "at most 20 interests are allowed",
                ));
            }
            if interests
                .iter()
                .any(|entry| entry.chars().count() > MAX_INTEREST_CHARS)
            {
                return Err(json_error(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "each interest must be at most 100 characters",
                ));
            }
            Some(interests)
        }
        None => None,
    };

    let existing = select_profile(proxy.pool(), &user.id).await?;

    let level = level_update.unwrap_or_else(|| {
        existing
            .as_ref()
            .map(|profile| profile.proficiency_level.clone())
            .unwrap_or_else(|| lesson_service::DEFAULT_LEVEL.to_string())
    });
    let goal = match goal_update {
        Some(update) => update,
        None => existing.as_ref().and_then(|profile| profile.learning_goal.clone()),
    };
    let interests = interests_update.unwrap_or_else(|| {
        existing
            .as_ref()
            .map(|profile| profile.interests.clone())
            .unwrap_or_default()
    });

    let profile = upsert_profile(proxy.pool(), &user.id, &level, goal.as_deref(), &interests).await?;

    Ok(Json(SuccessResponse {
        success: true,
        data: profile,
    }))
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

fn naive_datetime_to_ms(value: NaiveDateTime) -> i64 {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc).timestamp_millis()
}

fn profile_from_row(row: &PgRow) -> ProfileResponse {
    let created_at: NaiveDateTime = row
        .try_get("createdAt")
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let updated_at: NaiveDateTime = row
        .try_get("updatedAt")
        .unwrap_or_else(|_| Utc::now().naive_utc());

    ProfileResponse {
        user_id: row.try_get("userId").unwrap_or_default(),
        proficiency_level: row
            .try_get("proficiencyLevel")
            .unwrap_or_else(|_| lesson_service::DEFAULT_LEVEL.to_string()),
        learning_goal: row
            .try_get::<Option<String>, _>("learningGoal")
            .ok()
            .flatten(),
        interests: row.try_get("interests").unwrap_or_default(),
        created_at: naive_datetime_to_ms(created_at),
        updated_at: naive_datetime_to_ms(updated_at),
    }
}

async fn select_profile(pool: &PgPool, user_id: &str) -> Result<Option<ProfileResponse>, AppError> {
    let row = sqlx::query(
        r#"
        SELECT "userId","proficiencyLevel","learningGoal","interests","createdAt","updatedAt"
        FROM "profiles"
        WHERE "userId" = $1
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|err| {
        tracing::error!("profile query failed: {}", err);
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DB_ERROR",
            "database query failed",
        )
    })?;

    Ok(row.as_ref().map(profile_from_row))
}

async fn upsert_profile(
    pool: &PgPool,
    user_id: &str,
    level: &str,
    goal: Option<&str>,
    interests: &[String],
) -> Result<ProfileResponse, AppError> {
    let now = Utc::now().naive_utc();
    let row = sqlx::query(
        r#"
        INSERT INTO "profiles" ("userId","proficiencyLevel","learningGoal","interests","createdAt","updatedAt")
        VALUES ($1,$2,$3,$4,$5,$5)
        ON CONFLICT ("userId") DO UPDATE SET
          "proficiencyLevel" = EXCLUDED."proficiencyLevel",
          "learningGoal" = EXCLUDED."learningGoal",
          "interests" = EXCLUDED."interests",
          "updatedAt" = EXCLUDED."updatedAt"
        RETURNING "userId","proficiencyLevel","learningGoal","interests","createdAt","updatedAt"
        "#,
    )
    .bind(user_id)
    .bind(level)
    .bind(goal)
    .bind(interests)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|err| {
        tracing::error!("profile upsert failed: {}", err);
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DB_ERROR",
            "database write failed",
        )
    })?;

    Ok(profile_from_row(&row))
}
