// src/handlers/quiz.rs

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        attempt::{LeaderboardEntry, QuizAttempt, SubmitAnswersRequest},
        question::{PublicQuestion, Question},
        quiz::Quiz,
    },
    state::LeaderboardCache,
    utils::jwt::Claims,
};

/// Lists quizzes open for play (status 'active').
pub async fn list_quizzes(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let quizzes = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, title, status, duration_minutes, passing_score,
               access_price, points_allocated, created_at
        FROM quizzes
        WHERE status = 'active'
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list quizzes: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(quizzes))
}

/// Returns one quiz with its questions, answer keys hidden.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_quiz(&pool, quiz_id).await?;

    let questions = fetch_questions(&pool, quiz_id).await?;
    let public: Vec<PublicQuestion> = questions.into_iter().map(PublicQuestion::from).collect();

    Ok(Json(serde_json::json!({
        "quiz": quiz,
        "questions": public
    })))
}

/// Submits a user's answers for a quiz.
///
/// First submission must answer every question and marks the attempt
/// completed. A later submission is only accepted through the reattempt
/// path: it may answer exactly the questions added since the first
/// submission - answers for already-answered questions are rejected with an
/// `invalid_answers` list - and it re-marks the attempt unevaluated so the
/// next evaluation run scores the new answers.
pub async fn submit_answers(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(req): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    if req.answers.is_empty() {
        return Err(AppError::bad_request("No answers submitted"));
    }

    let quiz = fetch_quiz(&pool, quiz_id).await?;
    if quiz.status != "active" {
        return Err(AppError::BusinessRule("Quiz is not active".to_string()));
    }

    let questions = fetch_questions(&pool, quiz_id).await?;
    if questions.is_empty() {
        return Err(AppError::BusinessRule("Quiz has no questions".to_string()));
    }

    // Reject answers that do not belong to this quiz or point outside the
    // question's option list, before touching any state.
    let quiz_question_ids: HashSet<i64> = questions.iter().map(|q| q.id).collect();
    let unknown: Vec<String> = req
        .answers
        .keys()
        .filter(|id| !quiz_question_ids.contains(id))
        .map(|id| id.to_string())
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::Validation(
            "Answers reference questions outside this quiz".to_string(),
            unknown,
        ));
    }
    let out_of_range: Vec<String> = questions
        .iter()
        .filter_map(|q| {
            let selected = *req.answers.get(&q.id)?;
            (selected < 0 || selected as usize >= q.options.len()).then(|| q.id.to_string())
        })
        .collect();
    if !out_of_range.is_empty() {
        return Err(AppError::Validation(
            "Selected option out of range".to_string(),
            out_of_range,
        ));
    }

    let existing = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT id, user_id, quiz_id, completed, evaluated, score, points,
               created_at, updated_at
        FROM quiz_attempts
        WHERE user_id = $1 AND quiz_id = $2
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_optional(&pool)
    .await?;

    match existing {
        None => {
            // First submission: every question must be answered.
            let missing: Vec<String> = questions
                .iter()
                .filter(|q| !req.answers.contains_key(&q.id))
                .map(|q| q.id.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(AppError::Validation(
                    "All questions must be answered".to_string(),
                    missing,
                ));
            }

            let mut tx = pool.begin().await?;

            let attempt_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO quiz_attempts (user_id, quiz_id, completed, evaluated)
                VALUES ($1, $2, TRUE, FALSE)
                RETURNING id
                "#,
            )
            .bind(user_id)
            .bind(quiz_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if e.to_string().contains("unique constraint") {
                    // Concurrent duplicate submission handled gracefully
                    AppError::Conflict("Quiz already attempted".to_string())
                } else {
                    AppError::from(e)
                }
            })?;

            for (question_id, selected) in &req.answers {
                insert_answer(&mut tx, user_id, *question_id, attempt_id, *selected).await?;
            }

            tx.commit().await?;

            tracing::info!(
                "User {} submitted attempt {} for quiz {}",
                user_id,
                attempt_id,
                quiz_id
            );

            Ok(Json(serde_json::json!({
                "attempt_id": attempt_id,
                "answered": req.answers.len(),
                "total_questions": questions.len(),
                "reattempt": false
            })))
        }
        Some(attempt) => {
            // Reattempt path: only questions added after the first
            // submission may be answered; the attempt row is reused.
            let answered: HashSet<i64> = sqlx::query_scalar::<_, i64>(
                "SELECT question_id FROM answers WHERE attempt_id = $1",
            )
            .bind(attempt.id)
            .fetch_all(&pool)
            .await?
            .into_iter()
            .collect();

            let invalid: Vec<String> = req
                .answers
                .keys()
                .filter(|id| answered.contains(id))
                .map(|id| id.to_string())
                .collect();
            if !invalid.is_empty() {
                return Err(AppError::Validation(
                    "Questions already answered in a previous attempt".to_string(),
                    invalid,
                ));
            }

            let new_question_ids: Vec<i64> = questions
                .iter()
                .map(|q| q.id)
                .filter(|id| !answered.contains(id))
                .collect();
            if new_question_ids.is_empty() {
                return Err(AppError::BusinessRule(
                    "Quiz already completed, no new questions to answer".to_string(),
                ));
            }

            let missing: Vec<String> = new_question_ids
                .iter()
                .filter(|id| !req.answers.contains_key(id))
                .map(|id| id.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(AppError::Validation(
                    "All new questions must be answered".to_string(),
                    missing,
                ));
            }

            let mut tx = pool.begin().await?;

            for (question_id, selected) in &req.answers {
                insert_answer(&mut tx, user_id, *question_id, attempt.id, *selected).await?;
            }

            // New answers need scoring again; the evaluator only touches
            // attempts flagged unevaluated.
            sqlx::query(
                "UPDATE quiz_attempts SET evaluated = FALSE, updated_at = NOW() WHERE id = $1",
            )
            .bind(attempt.id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;

            tracing::info!(
                "User {} answered {} new questions on attempt {} (quiz {})",
                user_id,
                req.answers.len(),
                attempt.id,
                quiz_id
            );

            Ok(Json(serde_json::json!({
                "attempt_id": attempt.id,
                "answered": req.answers.len(),
                "total_questions": questions.len(),
                "reattempt": true
            })))
        }
    }
}

/// Returns the caller's attempt for a quiz, including score and awarded
/// points once evaluation and allocation have run.
pub async fn my_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT id, user_id, quiz_id, completed, evaluated, score, points,
               created_at, updated_at
        FROM quiz_attempts
        WHERE user_id = $1 AND quiz_id = $2
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("No attempt for this quiz".to_string()))?;

    Ok(Json(attempt))
}

/// Quiz leaderboard: evaluated attempts ranked by score, earlier submission
/// breaking ties. Served through the TTL cache; entries may be up to the
/// cache TTL stale since writes never invalidate.
pub async fn get_leaderboard(
    State(pool): State<PgPool>,
    State(cache): State<Arc<LeaderboardCache>>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(entries) = cache.get(&quiz_id) {
        return Ok(Json(entries));
    }

    let entries = sqlx::query_as::<_, LeaderboardEntry>(
        r#"
        SELECT u.username, a.score, a.points, a.created_at
        FROM quiz_attempts a
        JOIN users u ON a.user_id = u.id
        WHERE a.quiz_id = $1 AND a.evaluated = TRUE
        ORDER BY a.score DESC, a.created_at ASC
        LIMIT 50
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::from(e)
    })?;

    cache.insert(quiz_id, entries.clone());

    Ok(Json(entries))
}

async fn fetch_quiz(pool: &PgPool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, title, status, duration_minutes, passing_score,
               access_price, points_allocated, created_at
        FROM quizzes
        WHERE id = $1
        "#,
    )
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

async fn fetch_questions(pool: &PgPool, quiz_id: i64) -> Result<Vec<Question>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, content, options, correct_option, has_answer, created_at
        FROM questions
        WHERE quiz_id = $1
        ORDER BY id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;
    Ok(questions)
}

async fn insert_answer(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i64,
    question_id: i64,
    attempt_id: i64,
    selected: i32,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO answers (user_id, question_id, attempt_id, selected_option)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(question_id)
    .bind(attempt_id)
    .bind(selected)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") {
            AppError::Conflict(format!("Question {} already answered", question_id))
        } else {
            AppError::from(e)
        }
    })?;
    Ok(())
}
