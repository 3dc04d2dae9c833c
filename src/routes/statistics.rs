use axum::extract::{Json, Query, State};
use serde_json::{json, Value};

use crate::auth::AuthenticatedUser;
use crate::db::stats::{cargo_report, CargoReport};
use crate::error::{ApiError, ApiResult};
use crate::filters::{cargo_filter, Params};
use crate::AppState;

const DEFAULT_DAYS: u32 = 30;
const MAX_DAYS: u32 = 365;

async fn report(state: &AppState, params: &Params, kind: CargoReport) -> ApiResult<Json<Value>> {
    let filter = cargo_filter(params).map_err(ApiError::Validation)?;
    let data = cargo_report(&state.db, filter, kind).await?;
    Ok(Json(json!({ "success": true, "data": data })))
}

pub async fn general(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<Params>,
) -> ApiResult<Json<Value>> {
    report(&state, &params, CargoReport::General).await
}

pub async fn weight_volume(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<Params>,
) -> ApiResult<Json<Value>> {
    report(&state, &params, CargoReport::WeightVolume).await
}

pub async fn cities(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<Params>,
) -> ApiResult<Json<Value>> {
    report(&state, &params, CargoReport::Cities).await
}

pub async fn volunteers(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<Params>,
) -> ApiResult<Json<Value>> {
    report(&state, &params, CargoReport::Volunteers).await
}

fn parse_days(raw: Option<&String>) -> ApiResult<u32> {
    let Some(raw) = raw.map(|v| v.trim()).filter(|v| !v.is_empty()) else {
        return Ok(DEFAULT_DAYS);
    };
    match raw.parse::<u32>() {
        Ok(days) if (1..=MAX_DAYS).contains(&days) => Ok(days),
        _ => Err(ApiError::field("days", format!("days 1 ile {MAX_DAYS} arasında bir tam sayı olmalıdır."))),
    }
}

pub async fn time_based(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<Params>,
) -> ApiResult<Json<Value>> {
    let days = parse_days(params.get("days"))?;
    report(&state, &params, CargoReport::TimeBased { days }).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_default_and_bounds() {
        assert_eq!(parse_days(None).unwrap(), 30);
        assert_eq!(parse_days(Some(&"7".to_string())).unwrap(), 7);
        assert!(parse_days(Some(&"0".to_string())).is_err());
        assert!(parse_days(Some(&"366".to_string())).is_err());
        assert!(parse_days(Some(&"abc".to_string())).is_err());
    }
}
