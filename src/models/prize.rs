// src/models/prize.rs

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'prizes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Prize {
    pub id: i64,
    pub name: String,
    pub description: String,

    /// Point cost of one unit.
    pub points_required: i32,

    /// Remaining units. NULL means unlimited supply.
    pub stock: Option<i32>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new prize.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePrizeRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub points_required: i32,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
}

/// DTO for updating a prize. Fields are optional; `stock` uses a nested
/// Option so "set unlimited" (explicit null) and "leave unchanged" (absent)
/// stay distinguishable.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePrizeRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub points_required: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub stock: Option<Option<i32>>,
}

/// Maps an explicitly present field (including null) to `Some`, leaving
/// absent fields as `None` via `#[serde(default)]`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}
