// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub quiz_id: i64,

    /// The prompt text of the question.
    pub content: String,

    /// Ordered list of options (e.g., ["Option A", "Option B"]).
    /// Stored as a JSON array in the database; answers reference options by
    /// index into this list.
    pub options: Json<Vec<String>>,

    /// Index of the correct option. NULL until the admin supplies the
    /// answer key at evaluation time - these are prediction-style questions
    /// with no correct answer at authoring time.
    pub correct_option: Option<i32>,

    /// Whether the answer key has been set for this question.
    pub has_answer: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending a question to players (excludes the answer key).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub quiz_id: i64,
    pub content: String,
    pub options: Json<Vec<String>>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            quiz_id: q.quiz_id,
            content: q.content,
            options: q.options,
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub quiz_id: i64,
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub content: Option<String>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<String>>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("need_at_least_two_options"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("option_length"));
        }
    }
    Ok(())
}
