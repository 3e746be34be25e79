use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::hangul::progression::{self, Advance, LessonPointer};
use crate::hangul::quiz::{AnswerReply, QuestionView, QuizError, QuizResult, QuizSession};
use crate::hangul::{HangulLesson, Section};
use crate::response::{json_error, AppError};
use crate::state::AppState;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteLessonRequest {
    accuracy: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteLessonResponse {
    status: &'static str,
    section: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_lesson_id: Option<String>,
    completed: usize,
    total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SectionSummary {
    section: &'static str,
    available: bool,
    total: usize,
    completed: usize,
    progress: f64,
    resume_index: usize,
    complete: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SectionsResponse {
    sections: Vec<SectionSummary>,
    completions_unavailable: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SectionDetailResponse {
    section: &'static str,
    total: usize,
    completed: usize,
    progress: f64,
    resume_index: usize,
    complete: bool,
    completed_lesson_ids: Vec<String>,
    lessons: Vec<HangulLesson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartQuizRequest {
    section: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartQuizResponse {
    quiz_id: Uuid,
    section: &'static str,
    total: usize,
    question: QuestionView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    selected: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerNextResponse {
    status: &'static str,
    question: QuestionView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerFinishedResponse {
    status: &'static str,
    section: &'static str,
    result: QuizResult,
    lessons_completed: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetryQuizResponse {
    quiz_id: Uuid,
    question: QuestionView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DismissQuizResponse {
    dismissed: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/lessons", get(list_lessons))
        .route("/lessons/:id/complete", post(complete_lesson))
        .route("/sections", get(list_sections))
        .route("/sections/:section", get(get_section))
        .route("/quiz", post(start_quiz))
        .route("/quiz/:id/answer", post(answer_quiz))
        .route("/quiz/:id/retry", post(retry_quiz))
        .route("/quiz/:id", axum::routing::delete(dismiss_quiz))
}

async fn list_lessons(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (proxy, _user) = require_user(&state, &headers).await?;

    let lessons = select_lessons(proxy.pool()).await.map_err(db_read_error)?;

    Ok(Json(SuccessResponse {
        success: true,
        data: lessons,
    }))
}

async fn list_sections(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let (proxy, user) = require_user(&state, &headers).await?;

    let lessons = select_lessons(proxy.pool()).await.map_err(db_read_error)?;

    // Completion data only decorates the listing. When it cannot be
    // loaded the sections still render, locked down to the first one.
    let (completed, completions_unavailable) =
        match select_completed_ids(proxy.pool(), &user.id).await {
            Ok(ids) => (ids, false),
            Err(err) => {
                tracing::warn!("failed to load hangul completions: {}", err);
                (HashSet::new(), true)
            }
        };

    let sections = Section::ALL
        .iter()
        .map(|&section| section_summary(section, &lessons, &completed))
        .collect();

    Ok(Json(SuccessResponse {
        success: true,
        data: SectionsResponse {
            sections,
            completions_unavailable,
        },
    }))
}

async fn get_section(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(section): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (proxy, user) = require_user(&state, &headers).await?;

    let Some(section) = Section::parse(&section) else {
        return Err(json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "unknown section",
        ));
    };

    let lessons = select_lessons(proxy.pool()).await.map_err(db_read_error)?;
    let completed = select_completed_ids(proxy.pool(), &user.id)
        .await
        .map_err(db_read_error)?;

    if !progression::is_section_available(section, &lessons, &completed) {
        return Err(json_error(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "complete the previous section first",
        ));
    }

    let filtered = progression::filter_by_section(&lessons, section);
    let total = filtered.len();
    let done = filtered
        .iter()
        .filter(|lesson| completed.contains(&lesson.id))
        .count();

    let data = SectionDetailResponse {
        section: section.as_str(),
        total,
        completed: done,
        progress: fraction(done, total),
        resume_index: progression::first_incomplete_index(&filtered, &completed),
        complete: total > 0 && done == total,
        completed_lesson_ids: filtered
            .iter()
            .filter(|lesson| completed.contains(&lesson.id))
            .map(|lesson| lesson.id.clone())
            .collect(),
        lessons: filtered.into_iter().cloned().collect(),
    };

    Ok(Json(SuccessResponse {
        success: true,
        data,
    }))
}

async fn complete_lesson(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(lesson_id): Path<String>,
    payload: Option<Json<CompleteLessonRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let (proxy, user) = require_user(&state, &headers).await?;

    let accuracy = payload
        .and_then(|Json(body)| body.accuracy)
        .unwrap_or(1.0)
        .clamp(0.0, 1.0);

    let lessons = select_lessons(proxy.pool()).await.map_err(db_read_error)?;
    let Some(target) = lessons.iter().find(|lesson| lesson.id == lesson_id) else {
        return Err(json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "lesson not found",
        ));
    };
    let section = progression::classify(target);

    upsert_completion(proxy.pool(), &user.id, &lesson_id, accuracy)
        .await
        .map_err(db_write_error)?;

    let completed = select_completed_ids(proxy.pool(), &user.id)
        .await
        .map_err(db_read_error)?;

    let filtered = progression::filter_by_section(&lessons, section);
    let total = filtered.len();
    let done = filtered
        .iter()
        .filter(|lesson| completed.contains(&lesson.id))
        .count();
    let index = filtered
        .iter()
        .position(|lesson| lesson.id == lesson_id)
        .unwrap_or(0);

    let mut pointer = LessonPointer::at(index, total);
    let data = match pointer.next() {
        Advance::Moved(next_index) => CompleteLessonResponse {
            status: "advanced",
            section: section.as_str(),
            next_index: Some(next_index),
            next_lesson_id: filtered.get(next_index).map(|lesson| lesson.id.clone()),
            completed: done,
            total,
        },
        Advance::SectionComplete => CompleteLessonResponse {
            status: "section_complete",
            section: section.as_str(),
            next_index: None,
            next_lesson_id: None,
            completed: done,
            total,
        },
    };

    Ok(Json(SuccessResponse {
        success: true,
        data,
    }))
}

async fn start_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<StartQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (proxy, user) = require_user(&state, &headers).await?;

    let Some(section) = Section::parse(&payload.section) else {
        return Err(json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "unknown section",
        ));
    };

    let lessons = select_lessons(proxy.pool()).await.map_err(db_read_error)?;
    let completed = select_completed_ids(proxy.pool(), &user.id)
        .await
        .map_err(db_read_error)?;

    if !progression::is_section_available(section, &lessons, &completed) {
        return Err(json_error(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "complete the previous section first",
        ));
    }

    let filtered = progression::filter_by_section(&lessons, section);
    if filtered.is_empty() {
        return Err(json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "no lessons in this section",
        ));
    }

    let session = {
        let mut rng = rand::rng();
        QuizSession::new(&user.id, section, &filtered, &mut rng)
    };
    let quiz_id = session.id();
    let total = session.total();
    let question = session
        .current_view()
        .ok_or_else(|| AppError::internal("quiz session built without questions"))?;

    state.quizzes().insert(session);

    Ok(Json(SuccessResponse {
        success: true,
        data: StartQuizResponse {
            quiz_id,
            section: section.as_str(),
            total,
            question,
        },
    }))
}

async fn answer_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Response, AppError> {
    let (proxy, user) = require_user(&state, &headers).await?;

    let reply = state
        .quizzes()
        .answer(id, &user.id, &payload.selected)
        .map_err(quiz_error)?;

    match reply {
        AnswerReply::Next(question) => Ok(Json(SuccessResponse {
            success: true,
            data: AnswerNextResponse {
                status: "next",
                question,
            },
        })
        .into_response()),
        AnswerReply::Finished {
            result,
            section,
            lesson_ids,
        } => {
            let mut lessons_completed = 0;
            if result.passed {
                let accuracy = result.percentage / 100.0;
                for lesson_id in &lesson_ids {
                    upsert_completion(proxy.pool(), &user.id, lesson_id, accuracy)
                        .await
                        .map_err(db_write_error)?;
                    lessons_completed += 1;
                }
            }

            Ok(Json(SuccessResponse {
                success: true,
                data: AnswerFinishedResponse {
                    status: "finished",
                    section: section.as_str(),
                    result,
                    lessons_completed,
                },
            })
            .into_response())
        }
    }
}

async fn retry_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (_proxy, user) = require_user(&state, &headers).await?;

    let question = state.quizzes().retry(id, &user.id).map_err(quiz_error)?;

    Ok(Json(SuccessResponse {
        success: true,
        data: RetryQuizResponse {
            quiz_id: id,
            question,
        },
    }))
}

async fn dismiss_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (_proxy, user) = require_user(&state, &headers).await?;

    state.quizzes().remove(id, &user.id).map_err(quiz_error)?;

    Ok(Json(SuccessResponse {
        success: true,
        data: DismissQuizResponse { dismissed: true },
    }))
}

fn section_summary(
    section: Section,
    lessons: &[HangulLesson],
    completed: &HashSet<String>,
) -> SectionSummary {
    let filtered = progression::filter_by_section(lessons, section);
    let total = filtered.len();
    let done = filtered
        .iter()
        .filter(|lesson| completed.contains(&lesson.id))
        .count();

    SectionSummary {
        section: section.as_str(),
        available: progression::is_section_available(section, lessons, completed),
        total,
        completed: done,
        progress: fraction(done, total),
        resume_index: progression::first_incomplete_index(&filtered, completed),
        complete: total > 0 && done == total,
    }
}

fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        done as f64 / total as f64
    }
}

fn quiz_error(err: QuizError) -> AppError {
    match err {
        QuizError::NotFound => json_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "quiz session not found",
        ),
        QuizError::AlreadyFinished => json_error(
            StatusCode::CONFLICT,
            "CONFLICT",
            "quiz already finished",
        ),
    }
}

fn db_read_error(err: sqlx::Error) -> AppError {
    tracing::error!("hangul query failed: {}", err);
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "DB_ERROR",
        "database query failed",
    )
}

fn db_write_error(err: sqlx::Error) -> AppError {
    tracing::error!("hangul write failed: {}", err);
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "DB_ERROR",
        "database write failed",
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

struct LessonRow {
    id: String,
    character: String,
    romanization: String,
    description: String,
    character_type: Vec<String>,
    order_index: i32,
    examples: serde_json::Value,
    image_url: Option<String>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for LessonRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LessonRow {
            id: row.get("id"),
            character: row.get("character"),
            romanization: row.get("romanization"),
            description: row.get("description"),
            character_type: row.get("characterType"),
            order_index: row.get("orderIndex"),
            examples: row.get("examples"),
            image_url: row.get("imageUrl"),
        })
    }
}

impl From<LessonRow> for HangulLesson {
    fn from(row: LessonRow) -> Self {
        Self {
            id: row.id,
            character: row.character,
            romanization: row.romanization,
            description: row.description,
            character_type: row.character_type,
            order_index: row.order_index,
            examples: row.examples,
            image_url: row.image_url,
        }
    }
}

async fn select_lessons(pool: &PgPool) -> Result<Vec<HangulLesson>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LessonRow>(
        r#"
        SELECT "id","character","romanization","description","characterType","orderIndex","examples","imageUrl"
        FROM "hangul_lessons"
        ORDER BY "orderIndex" ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.into()).collect())
}

async fn select_completed_ids(
    pool: &PgPool,
    user_id: &str,
) -> Result<HashSet<String>, sqlx::Error> {
    let ids: Vec<String> =
        sqlx::query_scalar(r#"SELECT "lessonId" FROM "hangul_completions" WHERE "userId" = $1"#)
            .bind(user_id)
            .fetch_all(pool)
            .await?;

    Ok(ids.into_iter().collect())
}

async fn upsert_completion(
    pool: &PgPool,
    user_id: &str,
    lesson_id: &str,
    accuracy: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "hangul_completions" ("userId","lessonId","accuracy","attempts","lastReviewedAt")
        VALUES ($1,$2,$3,1,$4)
        ON CONFLICT ("userId","lessonId") DO UPDATE SET
          "accuracy" = EXCLUDED."accuracy",
          "attempts" = "hangul_completions"."attempts" + 1,
          "lastReviewedAt" = EXCLUDED."lastReviewedAt"
        "#,
    )
    .bind(user_id)
    .bind(lesson_id)
    .bind(accuracy)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;

    Ok(())
}
