// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,

    pub title: String,

    /// Lifecycle status: 'draft', 'active' or 'paused'.
    /// Only active quizzes accept submissions.
    pub status: String,

    /// Time limit shown to players, in minutes.
    pub duration_minutes: i32,

    /// Score threshold (0-100) a player must reach to pass.
    pub passing_score: i32,

    /// Entry fee charged outside this system (payment capture is an
    /// external concern; the amount is catalogue data here).
    pub access_price: i32,

    /// Set once the points allocator has run for this quiz.
    /// Guards against double-crediting the winning cohort.
    pub points_allocated: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Legal status transitions: draft -> active -> paused, and back to active.
pub fn valid_status_transition(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        ("draft", "active") | ("active", "paused") | ("paused", "active")
    )
}

/// DTO for creating a new quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 1, max = 480))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[validate(range(min = 0))]
    pub access_price: Option<i32>,
}

/// DTO for updating a quiz. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub status: Option<String>,
    #[validate(range(min = 1, max = 480))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[validate(range(min = 0))]
    pub access_price: Option<i32>,
}
