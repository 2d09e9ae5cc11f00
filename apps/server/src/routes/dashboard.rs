//! Dashboard analytics handler.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use brewpos_db::repository::analytics::{DashboardAnalytics, Period};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub period: Period,
}

/// `GET /dashboard/analytics?period=daily|weekly|monthly` — authenticated.
pub async fn analytics(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<DashboardAnalytics>> {
    let dashboard = state.db.analytics().dashboard(query.period).await?;
    Ok(Json(dashboard))
}
