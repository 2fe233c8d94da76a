// src/models/redemption.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Claim lifecycle: pending -> approved -> fulfilled, or pending -> rejected.
/// Only the transition into `rejected` refunds the snapshotted points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
    Fulfilled,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
            ClaimStatus::Fulfilled => "fulfilled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ClaimStatus::Pending),
            "approved" => Some(ClaimStatus::Approved),
            "rejected" => Some(ClaimStatus::Rejected),
            "fulfilled" => Some(ClaimStatus::Fulfilled),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, target: ClaimStatus) -> bool {
        matches!(
            (self, target),
            (ClaimStatus::Pending, ClaimStatus::Approved)
                | (ClaimStatus::Pending, ClaimStatus::Rejected)
                | (ClaimStatus::Approved, ClaimStatus::Fulfilled)
        )
    }
}

/// Represents the 'prize_redemptions' table: one claim per redemption.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PrizeRedemption {
    pub id: i64,
    pub user_id: i64,
    pub prize_id: i64,

    /// Points debited at creation time. The refund on rejection restores
    /// exactly this amount even if the prize's price changed since.
    pub points_spent: i32,

    pub status: String,
    pub delivery_details: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Claim row joined with prize and user names for admin review.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ClaimResponse {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub prize_id: i64,
    pub prize_name: String,
    pub points_spent: i32,
    pub status: String,
    pub delivery_details: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for redeeming a prize.
#[derive(Debug, Deserialize, Validate)]
pub struct RedeemPrizeRequest {
    #[validate(length(min = 1, max = 2000, message = "Delivery details are required"))]
    pub delivery_details: String,
}

/// DTO for an admin claim-status transition.
#[derive(Debug, Deserialize)]
pub struct UpdateClaimRequest {
    pub status: String,
}
