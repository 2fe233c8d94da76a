// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        prize::{CreatePrizeRequest, UpdatePrizeRequest},
        question::{CreateQuestionRequest, UpdateQuestionRequest},
        quiz::{CreateQuizRequest, UpdateQuizRequest, valid_status_transition},
        redemption::{ClaimResponse, ClaimStatus, UpdateClaimRequest},
        user::User,
    },
    utils::{html::clean_html, jwt::Claims},
};

// ---------------------------------------------------------------------------
// Quizzes

/// Creates a new quiz in 'draft' status.
/// Admin only.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::bad_request(validation_errors.to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO quizzes (title, duration_minutes, passing_score, access_price)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(&payload.title)
    .bind(payload.duration_minutes.unwrap_or(30))
    .bind(payload.passing_score.unwrap_or(50))
    .bind(payload.access_price.unwrap_or(0))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Updates a quiz. Status changes must follow draft -> active -> paused
/// (paused quizzes can be re-activated).
/// Admin only.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::bad_request(validation_errors.to_string()));
    }

    let current_status: String = sqlx::query_scalar("SELECT status FROM quizzes WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if let Some(new_status) = &payload.status {
        if new_status != &current_status && !valid_status_transition(&current_status, new_status) {
            return Err(AppError::BusinessRule(format!(
                "Cannot move quiz from '{}' to '{}'",
                current_status, new_status
            )));
        }
    }

    if payload.title.is_none()
        && payload.status.is_none()
        && payload.duration_minutes.is_none()
        && payload.passing_score.is_none()
        && payload.access_price.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }
    if let Some(status) = payload.status {
        separated.push("status = ");
        separated.push_bind_unseparated(status);
    }
    if let Some(duration) = payload.duration_minutes {
        separated.push("duration_minutes = ");
        separated.push_bind_unseparated(duration);
    }
    if let Some(passing_score) = payload.passing_score {
        separated.push("passing_score = ");
        separated.push_bind_unseparated(passing_score);
    }
    if let Some(access_price) = payload.access_price {
        separated.push("access_price = ");
        separated.push_bind_unseparated(access_price);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update quiz: {:?}", e);
        AppError::from(e)
    })?;

    Ok(StatusCode::OK)
}

/// Deletes a quiz. Questions, attempts and answers cascade.
/// Admin only.
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete quiz: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Lists all quizzes regardless of status.
/// Admin only.
pub async fn list_quizzes(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let quizzes = sqlx::query_as::<_, crate::models::quiz::Quiz>(
        r#"
        SELECT id, title, status, duration_minutes, passing_score,
               access_price, points_allocated, created_at
        FROM quizzes
        ORDER BY id DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(quizzes))
}

// ---------------------------------------------------------------------------
// Questions

/// Creates a new question for a quiz. Prediction-style: no answer key at
/// authoring time, the key arrives at evaluation.
/// Admin only.
pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::bad_request(validation_errors.to_string()));
    }

    let quiz_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM quizzes WHERE id = $1")
        .bind(payload.quiz_id)
        .fetch_optional(&pool)
        .await?;
    if quiz_exists.is_none() {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    let options_json = serde_json::to_value(&payload.options).unwrap_or_default();

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO questions (quiz_id, content, options)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(payload.quiz_id)
    .bind(clean_html(&payload.content))
    .bind(options_json)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Updates a question's prompt or options.
/// Admin only.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::bad_request(validation_errors.to_string()));
    }

    if payload.content.is_none() && payload.options.is_none() {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(content) = payload.content {
        separated.push("content = ");
        separated.push_bind_unseparated(clean_html(&content));
    }
    if let Some(options) = payload.options {
        separated.push("options = ");
        separated.push_bind_unseparated(serde_json::to_value(options).unwrap_or_default());
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update question: {:?}", e);
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a question. Its answers cascade.
/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Prizes

/// Adds a prize to the catalogue.
/// Admin only.
pub async fn create_prize(
    State(pool): State<PgPool>,
    Json(payload): Json<CreatePrizeRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::bad_request(validation_errors.to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO prizes (name, description, points_required, stock)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(&payload.name)
    .bind(payload.description.as_deref().unwrap_or(""))
    .bind(payload.points_required)
    .bind(payload.stock)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create prize: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Updates a prize. Passing `"stock": null` switches it to unlimited.
/// Admin only.
pub async fn update_prize(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePrizeRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::bad_request(validation_errors.to_string()));
    }

    if payload.name.is_none()
        && payload.description.is_none()
        && payload.points_required.is_none()
        && payload.stock.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE prizes SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name);
    }
    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }
    if let Some(points_required) = payload.points_required {
        separated.push("points_required = ");
        separated.push_bind_unseparated(points_required);
    }
    if let Some(stock) = payload.stock {
        separated.push("stock = ");
        separated.push_bind_unseparated(stock);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update prize: {:?}", e);
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Prize not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Removes a prize from the catalogue. Claims against it are kept.
/// Admin only.
pub async fn delete_prize(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM prizes WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("foreign key") {
                AppError::Conflict("Prize has existing claims".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Prize not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Claims

/// Lists redemption claims for review, pending first.
/// Admin only.
pub async fn list_claims(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let claims = sqlx::query_as::<_, ClaimResponse>(
        r#"
        SELECT r.id, r.user_id, u.username, r.prize_id, p.name AS prize_name,
               r.points_spent, r.status, r.delivery_details, r.created_at
        FROM prize_redemptions r
        JOIN users u ON r.user_id = u.id
        JOIN prizes p ON r.prize_id = p.id
        ORDER BY (r.status = 'pending') DESC, r.created_at DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(claims))
}

/// Transitions a claim's status.
///
/// Legal moves: pending -> approved, pending -> rejected,
/// approved -> fulfilled. The transition into rejected refunds the
/// snapshotted points; the claim row is locked and its current status
/// re-checked inside the transaction, so repeating the call cannot refund
/// twice. Approval and fulfilment never touch the balance.
/// Admin only.
pub async fn update_claim(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateClaimRequest>,
) -> Result<impl IntoResponse, AppError> {
    let target = ClaimStatus::parse(&payload.status).ok_or_else(|| {
        AppError::bad_request(format!("Unknown claim status '{}'", payload.status))
    })?;

    let mut tx = pool.begin().await?;

    let row: Option<(String, i64, i32)> = sqlx::query_as(
        "SELECT status, user_id, points_spent FROM prize_redemptions WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let (current_str, user_id, points_spent) =
        row.ok_or(AppError::NotFound("Claim not found".to_string()))?;

    let current = ClaimStatus::parse(&current_str)
        .ok_or_else(|| AppError::InternalServerError(format!("Corrupt claim status '{}'", current_str)))?;

    if !current.can_transition_to(target) {
        return Err(AppError::BusinessRule(format!(
            "Cannot move claim from '{}' to '{}'",
            current.as_str(),
            target.as_str()
        )));
    }

    if target == ClaimStatus::Rejected {
        // Refund happens exactly once: the status check above already
        // guarantees the claim is not yet rejected.
        sqlx::query("UPDATE users SET points = points + $1 WHERE id = $2")
            .bind(points_spent as i64)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("UPDATE prize_redemptions SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(target.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        "Claim {} moved to '{}' (user {}, {} points)",
        id,
        target.as_str(),
        user_id,
        points_spent
    );

    Ok(Json(serde_json::json!({ "id": id, "status": target.as_str() })))
}

// ---------------------------------------------------------------------------
// Users

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, points, created_at
        FROM users
        ORDER BY id DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(users))
}

/// DTO for updating a user. Fields are optional.
#[derive(Debug, serde::Deserialize)]
pub struct AdminUpdateUserRequest {
    pub role: Option<String>,
    /// Manual balance correction. Negative balances are rejected.
    pub points: Option<i64>,
}

/// Updates a user's role or points balance.
/// Admin only.
pub async fn update_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if let Some(role) = &payload.role {
        if role != "user" && role != "admin" {
            return Err(AppError::bad_request(format!("Unknown role '{}'", role)));
        }
        sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(role)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(points) = payload.points {
        if points < 0 {
            return Err(AppError::bad_request("Points cannot be negative"));
        }
        sqlx::query("UPDATE users SET points = $1 WHERE id = $2")
            .bind(points)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    Ok(StatusCode::OK)
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let current_user_id = claims.user_id()?;
    if id == current_user_id {
        return Err(AppError::bad_request("Cannot delete yourself"));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
