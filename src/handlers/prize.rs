// src/handlers/prize.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        prize::Prize,
        redemption::{PrizeRedemption, RedeemPrizeRequest},
    },
    utils::{
        html::clean_html,
        jwt::Claims,
        tx::{TxOptions, with_retries},
    },
};

/// Lists the prize catalogue.
pub async fn list_prizes(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let prizes = sqlx::query_as::<_, Prize>(
        r#"
        SELECT id, name, description, points_required, stock, created_at
        FROM prizes
        ORDER BY points_required ASC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list prizes: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(prizes))
}

/// Redeems a prize for points, creating a pending claim.
///
/// The point debit, the stock decrement and the claim insert are one
/// transaction: a failure anywhere leaves the balance untouched and no
/// claim behind. The user row is locked so two concurrent redemptions
/// cannot both spend the same balance.
pub async fn redeem_prize(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(prize_id): Path<i64>,
    Json(req): Json<RedeemPrizeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    if let Err(validation_errors) = req.validate() {
        return Err(AppError::bad_request(validation_errors.to_string()));
    }
    let delivery_details = clean_html(&req.delivery_details);

    let claim = with_retries(&TxOptions::default(), || {
        let pool = pool.clone();
        let delivery_details = delivery_details.clone();
        async move {
            let mut tx = pool.begin().await?;

            let points: i64 =
                sqlx::query_scalar("SELECT points FROM users WHERE id = $1 FOR UPDATE")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or(AppError::NotFound("User not found".to_string()))?;

            let prize = sqlx::query_as::<_, Prize>(
                r#"
                SELECT id, name, description, points_required, stock, created_at
                FROM prizes
                WHERE id = $1
                FOR UPDATE
                "#,
            )
            .bind(prize_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Prize not found".to_string()))?;

            if points < prize.points_required as i64 {
                return Err(AppError::BusinessRule(format!(
                    "Insufficient points: have {}, need {}",
                    points, prize.points_required
                )));
            }

            if matches!(prize.stock, Some(stock) if stock <= 0) {
                return Err(AppError::BusinessRule("Prize out of stock".to_string()));
            }

            sqlx::query("UPDATE users SET points = points - $1 WHERE id = $2")
                .bind(prize.points_required as i64)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            if prize.stock.is_some() {
                sqlx::query("UPDATE prizes SET stock = stock - 1 WHERE id = $1")
                    .bind(prize_id)
                    .execute(&mut *tx)
                    .await?;
            }

            let claim = sqlx::query_as::<_, PrizeRedemption>(
                r#"
                INSERT INTO prize_redemptions
                    (user_id, prize_id, points_spent, status, delivery_details)
                VALUES ($1, $2, $3, 'pending', $4)
                RETURNING id, user_id, prize_id, points_spent, status,
                          delivery_details, created_at, updated_at
                "#,
            )
            .bind(user_id)
            .bind(prize_id)
            .bind(prize.points_required)
            .bind(&delivery_details)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(claim)
        }
    })
    .await?;

    tracing::info!(
        "User {} redeemed prize {} for {} points (claim {})",
        user_id,
        prize_id,
        claim.points_spent,
        claim.id
    );

    Ok((StatusCode::CREATED, Json(claim)))
}

/// Lists the caller's redemption claims, newest first.
pub async fn my_claims(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let rows = sqlx::query_as::<_, PrizeRedemption>(
        r#"
        SELECT id, user_id, prize_id, points_spent, status,
               delivery_details, created_at, updated_at
        FROM prize_redemptions
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}
