use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{ApiError, ApiQuery, AppState, Caller};
use crate::services::SalesReport;

#[derive(Debug, Deserialize)]
pub struct SalesParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn sales_report(State(s): State<AppState>, caller: Caller, ApiQuery(p): ApiQuery<SalesParams>) -> Result<Json<SalesReport>, ApiError> {
    caller.require_admin()?;
    Ok(Json(s.reports.sales_report(p.from, p.to).await?))
}
