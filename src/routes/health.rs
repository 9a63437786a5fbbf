use axum::{http::StatusCode, response::Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::today_et;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Slate date a request without `date` would use.
    pub slate_date: NaiveDate,
    pub timestamp: i64,
}

/// GET /health
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    let response = HealthResponse {
        status: "ok".to_string(),
        slate_date: today_et(),
        timestamp: chrono::Utc::now().timestamp(),
    };

    (StatusCode::OK, Json(response))
}
