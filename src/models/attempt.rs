// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'quiz_attempts' table in the database.
/// One row per (user, quiz); the same row is reused by the reattempt path
/// when new questions are added after the first submission.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,

    /// The user has submitted a full set of answers at least once.
    pub completed: bool,

    /// Scored by the evaluator. Cleared again when a reattempt adds answers
    /// for newly added questions.
    pub evaluated: bool,

    /// Integer percentage 0-100. Meaningless until `evaluated` is true.
    pub score: i32,

    /// Points credited by the allocator, 0 until allocation.
    pub points: i32,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'answers' table: one row per (attempt, question).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub user_id: i64,
    pub question_id: i64,
    pub attempt_id: i64,

    /// Index into the question's option list.
    pub selected_option: i32,

    /// NULL until the evaluator runs.
    pub is_correct: Option<bool>,
}

/// DTO for submitting answers to a quiz.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    /// Map of question id -> selected option index.
    pub answers: std::collections::HashMap<i64, i32>,
}

/// One row of a quiz leaderboard, joined from attempts and users.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub score: i32,
    pub points: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}
