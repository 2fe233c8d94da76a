// src/handlers/profile.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::user::{MeResponse, User},
    utils::jwt::Claims,
};

/// Returns the current user's profile with points balance and counters.
pub async fn me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, points, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let attempts_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await?;

    let pending_claims: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM prize_redemptions WHERE user_id = $1 AND status = 'pending'",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(MeResponse {
        id: user.id,
        username: user.username,
        role: user.role,
        points: user.points,
        created_at: user.created_at,
        attempts_count,
        pending_claims,
    }))
}
