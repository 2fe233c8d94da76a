// src/handlers/evaluation.rs
//
// Admin endpoints for the two-phase scoring flow: supply the answer key and
// score pending attempts, then rank evaluated attempts and credit the
// winning cohort.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::Question,
    utils::{
        ranking::{RankedAttempt, percentage_score, select_winners},
        tx::{TxOptions, with_retries},
    },
};

/// DTO for supplying the answer key of a quiz.
#[derive(Debug, Deserialize)]
pub struct EvaluateQuizRequest {
    /// Total mapping question id -> correct option index. Every question of
    /// the quiz must be present.
    pub answers: HashMap<i64, i32>,
}

/// DTO for triggering points allocation.
#[derive(Debug, Deserialize, Validate)]
pub struct AllocatePointsRequest {
    #[validate(range(min = 1, max = 1000))]
    pub points_per_winner: Option<i32>,
    #[validate(range(min = 0.01, max = 100.0))]
    pub top_percent: Option<f64>,
}

/// Supplies the answer key for a quiz and scores all pending attempts.
///
/// All-or-nothing: the key must cover every question of the quiz, and any
/// validation failure happens before a single write. Attempts already
/// flagged evaluated are never rescored - evaluation is a one-shot gate per
/// attempt, so a later run with a different key only affects attempts that
/// became unevaluated again through the reattempt path.
pub async fn evaluate_quiz(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
    Json(req): Json<EvaluateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM quizzes WHERE id = $1")
        .bind(quiz_id)
        .fetch_optional(&pool)
        .await?;
    if quiz_exists.is_none() {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, content, options, correct_option, has_answer, created_at
        FROM questions
        WHERE quiz_id = $1
        ORDER BY id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    if questions.is_empty() {
        return Err(AppError::BusinessRule(
            "Quiz has no questions to evaluate".to_string(),
        ));
    }

    let missing: Vec<String> = questions
        .iter()
        .filter(|q| !req.answers.contains_key(&q.id))
        .map(|q| q.id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation(
            "Answer key is missing questions".to_string(),
            missing,
        ));
    }

    let question_ids: std::collections::HashSet<i64> = questions.iter().map(|q| q.id).collect();
    let unknown: Vec<String> = req
        .answers
        .keys()
        .filter(|id| !question_ids.contains(id))
        .map(|id| id.to_string())
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::Validation(
            "Answer key references questions outside this quiz".to_string(),
            unknown,
        ));
    }

    let out_of_range: Vec<String> = questions
        .iter()
        .filter(|q| {
            let correct = req.answers[&q.id];
            correct < 0 || correct as usize >= q.options.len()
        })
        .map(|q| q.id.to_string())
        .collect();
    if !out_of_range.is_empty() {
        return Err(AppError::Validation(
            "Correct option out of range".to_string(),
            out_of_range,
        ));
    }

    let total_questions = questions.len() as i64;
    let key = req.answers;

    let evaluated = with_retries(&TxOptions::default(), || {
        let pool = pool.clone();
        let key = key.clone();
        async move {
            let mut tx = pool.begin().await?;

            for (question_id, correct) in &key {
                sqlx::query(
                    r#"
                    UPDATE questions
                    SET correct_option = $1, has_answer = TRUE
                    WHERE id = $2
                    "#,
                )
                .bind(correct)
                .bind(question_id)
                .execute(&mut *tx)
                .await?;
            }

            let pending: Vec<i64> = sqlx::query_scalar(
                r#"
                SELECT id FROM quiz_attempts
                WHERE quiz_id = $1 AND evaluated = FALSE
                FOR UPDATE
                "#,
            )
            .bind(quiz_id)
            .fetch_all(&mut *tx)
            .await?;

            for attempt_id in &pending {
                let answers: Vec<(i64, i64, i32)> = sqlx::query_as(
                    "SELECT id, question_id, selected_option FROM answers WHERE attempt_id = $1",
                )
                .bind(attempt_id)
                .fetch_all(&mut *tx)
                .await?;

                let mut correct_count: i64 = 0;
                for (answer_id, question_id, selected) in &answers {
                    let is_correct = key.get(question_id) == Some(selected);
                    if is_correct {
                        correct_count += 1;
                    }
                    sqlx::query("UPDATE answers SET is_correct = $1 WHERE id = $2")
                        .bind(is_correct)
                        .bind(answer_id)
                        .execute(&mut *tx)
                        .await?;
                }

                let score = percentage_score(correct_count, total_questions);
                sqlx::query(
                    r#"
                    UPDATE quiz_attempts
                    SET evaluated = TRUE, score = $1, updated_at = NOW()
                    WHERE id = $2
                    "#,
                )
                .bind(score)
                .bind(attempt_id)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(pending.len())
        }
    })
    .await?;

    tracing::info!(
        "Evaluated {} attempts for quiz {} ({} questions)",
        evaluated,
        quiz_id,
        total_questions
    );

    Ok(Json(serde_json::json!({
        "quiz_id": quiz_id,
        "questions": total_questions,
        "evaluated_attempts": evaluated
    })))
}

/// Ranks evaluated attempts and credits the winning cohort.
///
/// Cohort = top max(1, ceil(N * pct / 100)) attempts by score (earlier
/// submission wins ties), minus zero-scorers. The whole cohort is credited
/// in one transaction, and the quiz's `points_allocated` marker is set in
/// the same transaction: without it, a second run over an overlapping
/// cohort would credit every winner twice. Re-runs return 409.
pub async fn allocate_points(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
    Json(req): Json<AllocatePointsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::bad_request(validation_errors.to_string()));
    }
    let points_per_winner = req.points_per_winner.unwrap_or(10);
    let top_percent = req.top_percent.unwrap_or(10.0);

    let credited = with_retries(&TxOptions::default(), || {
        let pool = pool.clone();
        async move {
            let mut tx = pool.begin().await?;

            // Lock the quiz row so two allocator runs serialize on the
            // already-allocated check.
            let allocated: bool = sqlx::query_scalar(
                "SELECT points_allocated FROM quizzes WHERE id = $1 FOR UPDATE",
            )
            .bind(quiz_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

            if allocated {
                return Err(AppError::Conflict(
                    "Points already allocated for this quiz".to_string(),
                ));
            }

            let rows: Vec<(i64, i64, i32, DateTime<Utc>)> = sqlx::query_as(
                r#"
                SELECT id, user_id, score, created_at
                FROM quiz_attempts
                WHERE quiz_id = $1 AND evaluated = TRUE
                "#,
            )
            .bind(quiz_id)
            .fetch_all(&mut *tx)
            .await?;

            if rows.is_empty() {
                return Err(AppError::NotFound(
                    "No evaluated attempts for this quiz".to_string(),
                ));
            }

            let attempts: Vec<RankedAttempt> = rows
                .into_iter()
                .map(|(attempt_id, user_id, score, submitted_at)| RankedAttempt {
                    attempt_id,
                    user_id,
                    score,
                    submitted_at,
                })
                .collect();

            let winners = select_winners(attempts, top_percent);
            if winners.is_empty() {
                return Err(AppError::BusinessRule(
                    "No eligible winners: all top-ranked attempts scored zero".to_string(),
                ));
            }

            for winner in &winners {
                sqlx::query("UPDATE users SET points = points + $1 WHERE id = $2")
                    .bind(points_per_winner as i64)
                    .bind(winner.user_id)
                    .execute(&mut *tx)
                    .await?;

                sqlx::query("UPDATE quiz_attempts SET points = $1, updated_at = NOW() WHERE id = $2")
                    .bind(points_per_winner)
                    .bind(winner.attempt_id)
                    .execute(&mut *tx)
                    .await?;
            }

            sqlx::query("UPDATE quizzes SET points_allocated = TRUE WHERE id = $1")
                .bind(quiz_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(winners)
        }
    })
    .await?;

    tracing::info!(
        "Allocated {} points each to {} winners for quiz {}",
        points_per_winner,
        credited.len(),
        quiz_id
    );

    Ok(Json(serde_json::json!({
        "quiz_id": quiz_id,
        "points_per_winner": points_per_winner,
        "top_percent": top_percent,
        "winners": credited.iter().map(|w| w.user_id).collect::<Vec<_>>()
    })))
}
