use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::AuthenticatedUser;
use crate::choices::{city_display, content_suggestions, route_distance_km, CargoStatus, CargoType};
use crate::codes::validate_cargo_number;
use crate::db::{
    self,
    cargo::Change,
    models::{CargoRecord, Volunteer},
};
use crate::error::{ApiError, ApiJson, ApiResult, FieldErrors};
use crate::filters::{cargo_filter, Ordering, Page, Paginated, Params, CARGO_ORDERING};
use crate::AppState;

/// Assigned volunteer, summarised inside a cargo.
#[derive(Serialize, Debug, Clone)]
pub struct VolunteerBrief {
    pub id: i64,
    pub gonulluluk_no: String,
    pub full_name: String,
    pub telefon: String,
    pub sehir: String,
}

impl From<&Volunteer> for VolunteerBrief {
    fn from(v: &Volunteer) -> Self {
        VolunteerBrief {
            id: v.id,
            gonulluluk_no: v.code.clone(),
            full_name: v.full_name(),
            telefon: v.phone.clone(),
            sehir: city_display(&v.city),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct CargoView {
    pub id: i64,
    pub kargo_no: String,
    pub anonim_gonderici: bool,
    pub gonderici_ad: Option<String>,
    pub gonderici_soyad: Option<String>,
    pub gonderici_telefon: Option<String>,
    pub gonderici_email: Option<String>,
    pub cikis_yeri: String,
    pub cikis_yeri_display: String,
    pub ulasacagi_yer: String,
    pub ulasacagi_yer_display: String,
    pub agirlik: f64,
    pub hacim: f64,
    pub miktar: i64,
    pub durum: CargoStatus,
    pub durum_display: &'static str,
    pub kargo_tipi: CargoType,
    pub kargo_tipi_display: &'static str,
    pub icerik: String,
    pub toplama_gonullusu: i64,
    pub toplama_gonullusu_detail: Option<VolunteerBrief>,
    pub tasima_gonullusu: Option<i64>,
    pub tasima_gonullusu_detail: Option<VolunteerBrief>,
    pub dagitim_gonullusu: Option<i64>,
    pub dagitim_gonullusu_detail: Option<VolunteerBrief>,
    pub ozel_not: Option<String>,
    pub tahmini_mesafe_km: Option<f64>,
    pub olusturulma_tarihi: DateTime<Utc>,
    pub son_degisiklik: DateTime<Utc>,
}

impl From<CargoRecord> for CargoView {
    fn from(record: CargoRecord) -> Self {
        let c = record.cargo;
        CargoView {
            id: c.id,
            cikis_yeri_display: city_display(&c.origin),
            ulasacagi_yer_display: city_display(&c.destination),
            tahmini_mesafe_km: route_distance_km(&c.origin, &c.destination),
            kargo_no: c.code,
            anonim_gonderici: c.anonymous,
            gonderici_ad: c.sender_first_name,
            gonderici_soyad: c.sender_last_name,
            gonderici_telefon: c.sender_phone,
            gonderici_email: c.sender_email,
            cikis_yeri: c.origin,
            ulasacagi_yer: c.destination,
            agirlik: c.weight,
            hacim: c.volume,
            miktar: c.quantity,
            durum: c.status,
            durum_display: c.status.label(),
            kargo_tipi: c.kind,
            kargo_tipi_display: c.kind.label(),
            icerik: c.content,
            toplama_gonullusu: c.collector_id,
            toplama_gonullusu_detail: record.collector.as_ref().map(VolunteerBrief::from),
            tasima_gonullusu: c.transporter_id,
            tasima_gonullusu_detail: record.transporter.as_ref().map(VolunteerBrief::from),
            dagitim_gonullusu: c.distributor_id,
            dagitim_gonullusu_detail: record.distributor.as_ref().map(VolunteerBrief::from),
            ozel_not: c.note,
            olusturulma_tarihi: c.created_at,
            son_degisiklik: c.updated_at,
        }
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Kargo bulunamadı.".to_string())
}

fn write_failed(e: anyhow::Error) -> ApiError {
    if db::is_unique_violation(&e) {
        tracing::warn!("Cargo write hit a unique constraint: {:#}", e);
        return ApiError::Conflict("Kargo numarası çakışması, lütfen tekrar deneyiniz.".to_string());
    }
    e.into()
}

pub async fn list_cargo(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<Params>,
) -> ApiResult<Json<Paginated<CargoView>>> {
    let filter = cargo_filter(&params).map_err(ApiError::Validation)?;
    let ordering = Ordering::resolve(&params, CARGO_ORDERING, "-olusturulma_tarihi");

    let count = db::cargo::count(&state.db, filter.clone()).await?;
    let page = Page::resolve(&params, count);
    let rows = db::cargo::list(&state.db, filter, ordering, Some((page.limit(), page.offset()))).await?;
    let results = rows.into_iter().map(CargoView::from).collect();
    Ok(Json(Paginated::new("/api/v1/kargo/", &params, page, count, results)))
}

pub async fn create_cargo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<impl IntoResponse> {
    let input = db::cargo::parse_input(body).map_err(ApiError::Validation)?;
    let record = db::cargo::create(&state.db, input, Some(user.user.id.to_string()))
        .await
        .map_err(write_failed)?
        .map_err(ApiError::Validation)?;
    Ok((StatusCode::CREATED, Json(CargoView::from(record))))
}

pub async fn get_cargo(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<CargoView>> {
    let record = db::cargo::find(&state.db, id).await?.ok_or_else(not_found)?;
    Ok(Json(record.into()))
}

async fn apply(state: &AppState, user: &AuthenticatedUser, id: i64, change: Change) -> ApiResult<Json<CargoView>> {
    let record = db::cargo::update(&state.db, id, change, Some(user.user.id.to_string()))
        .await
        .map_err(write_failed)?
        .ok_or_else(not_found)?
        .map_err(ApiError::Validation)?;
    Ok(Json(record.into()))
}

pub async fn put_cargo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<CargoView>> {
    apply(&state, &user, id, Change::Replace(body)).await
}

pub async fn patch_cargo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<CargoView>> {
    apply(&state, &user, id, Change::Merge(body)).await
}

pub async fn update_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    let status = match body.get("durum").and_then(Value::as_str).map(str::trim) {
        None | Some("") => return Err(ApiError::field("durum", "Durum alanı gereklidir.")),
        Some(code) => CargoStatus::parse(code)
            .ok_or_else(|| ApiError::field("durum", format!("Geçersiz durum: {code}")))?,
    };

    let record = db::cargo::set_status(&state.db, id, status, Some(user.user.id.to_string()))
        .await?
        .ok_or_else(not_found)?
        .map_err(ApiError::Validation)?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Kargo durumu '{}' olarak güncellendi.", status.label()),
        "data": CargoView::from(record),
    })))
}

fn track_error(status: StatusCode, error: &str, code: &str) -> Response {
    (status, Json(json!({ "success": false, "error": error, "code": code }))).into_response()
}

/// Public lookup by tracking code. The format is checked before any query runs.
pub async fn track(State(state): State<AppState>, Query(params): Query<Params>) -> Response {
    let code = params.get("kargo_no").map(|v| v.trim().to_uppercase()).unwrap_or_default();
    if code.is_empty() {
        return track_error(StatusCode::BAD_REQUEST, "Kargo numarası gereklidir.", "MISSING_CARGO_NUMBER");
    }
    if let Err(message) = validate_cargo_number(&code) {
        return track_error(StatusCode::BAD_REQUEST, message, "INVALID_CARGO_FORMAT");
    }

    let cargo = match db::cargo::find_by_code(&state.db, code.clone()).await {
        Ok(Some(cargo)) => cargo,
        Ok(None) => {
            return track_error(
                StatusCode::NOT_FOUND,
                &format!("{code} numaralı kargo bulunamadı."),
                "CARGO_NOT_FOUND",
            )
        }
        Err(e) => {
            tracing::error!("Tracking lookup failed: {:#}", e);
            return track_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Sistem hatası oluştu. Lütfen daha sonra tekrar deneyiniz.",
                "SYSTEM_ERROR",
            );
        }
    };

    // Public view: no sender identity, no volunteer contact details.
    Json(json!({
        "success": true,
        "data": {
            "kargo_no": cargo.code,
            "durum": cargo.status,
            "durum_display": cargo.status.label(),
            "kargo_tipi": cargo.kind,
            "kargo_tipi_display": cargo.kind.label(),
            "cikis_yeri": cargo.origin,
            "cikis_yeri_display": city_display(&cargo.origin),
            "ulasacagi_yer": cargo.destination,
            "ulasacagi_yer_display": city_display(&cargo.destination),
            "tahmini_mesafe_km": route_distance_km(&cargo.origin, &cargo.destination),
            "olusturulma_tarihi": cargo.created_at,
            "son_degisiklik": cargo.updated_at,
        }
    }))
    .into_response()
}

pub async fn by_volunteer(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<Params>,
) -> ApiResult<Json<Value>> {
    let raw = params.get("volunteer_id").map(|v| v.trim()).unwrap_or_default();
    if raw.is_empty() {
        return Err(ApiError::field("volunteer_id", "volunteer_id parametresi gereklidir."));
    }
    let id: i64 = raw
        .parse()
        .map_err(|_| ApiError::field("volunteer_id", "Geçerli bir gönüllü kimliği giriniz."))?;

    let volunteer = db::volunteers::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Gönüllü bulunamadı.".to_string()))?;
    let records = db::cargo::by_volunteer(&state.db, id).await?;
    let data: Vec<CargoView> = records.into_iter().map(CargoView::from).collect();

    Ok(Json(json!({
        "success": true,
        "volunteer": VolunteerBrief::from(&volunteer),
        "count": data.len(),
        "data": data,
    })))
}

/// Typical contents for one cargo type, or for all of them.
pub async fn content_options(_user: AuthenticatedUser, Query(params): Query<Params>) -> ApiResult<Json<Value>> {
    match params.get("kargo_tipi").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(code) => {
            let kind = CargoType::parse(code).ok_or_else(|| {
                let mut errors = FieldErrors::new();
                errors.add("kargo_tipi", format!("Geçersiz kargo tipi: {code}"));
                ApiError::Validation(errors)
            })?;
            Ok(Json(json!({
                "success": true,
                "kargo_tipi": kind,
                "kargo_tipi_display": kind.label(),
                "suggestions": content_suggestions(kind),
            })))
        }
        None => {
            let all: serde_json::Map<String, Value> = CargoType::ALL
                .iter()
                .map(|kind| (kind.as_str().to_string(), json!(content_suggestions(*kind))))
                .collect();
            Ok(Json(json!({ "success": true, "suggestions": all })))
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Response {
    match db::cargo::count(&state.db, Default::default()).await {
        Ok(total) => Json(json!({
            "success": true,
            "status": "healthy",
            "service": "kargo",
            "total_cargo": total,
            "timestamp": Utc::now(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Cargo health check failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "status": "unhealthy", "service": "kargo" })),
            )
                .into_response()
        }
    }
}
