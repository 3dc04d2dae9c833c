use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::{self, AdminUser};
use crate::choices::city_display;
use crate::db::{self, audit, models::Volunteer};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::filters::{self, Ordering, Page, Paginated, Params, VOLUNTEER_ORDERING};
use crate::validation::{validate_registration, VolunteerRegistration};
use crate::AppState;

#[derive(Serialize, Debug, Clone)]
pub struct VolunteerView {
    pub id: i64,
    pub gonulluluk_no: String,
    pub ad: String,
    pub soyad: String,
    pub full_name: String,
    pub email: String,
    pub telefon: String,
    pub sehir: String,
    pub sehir_display: String,
    pub gonullu_tipi: String,
    pub gonullu_tipi_display: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Volunteer> for VolunteerView {
    fn from(v: Volunteer) -> Self {
        VolunteerView {
            id: v.id,
            full_name: v.full_name(),
            sehir_display: city_display(&v.city),
            gonullu_tipi: v.role.as_str().to_string(),
            gonullu_tipi_display: v.role.label().to_string(),
            gonulluluk_no: v.code,
            ad: v.first_name,
            soyad: v.last_name,
            email: v.email,
            telefon: v.phone,
            sehir: v.city,
            is_active: v.is_active,
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

pub async fn list_volunteers(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<Params>,
) -> ApiResult<Json<Paginated<VolunteerView>>> {
    let filter = filters::volunteer_filter(&params).map_err(ApiError::Validation)?;
    let ordering = Ordering::resolve(&params, VOLUNTEER_ORDERING, "-created_at");

    let count = db::volunteers::count(&state.db, filter.clone()).await?;
    let page = Page::resolve(&params, count);
    let rows = db::volunteers::list(&state.db, filter, ordering, page.limit(), page.offset()).await?;
    let results = rows.into_iter().map(VolunteerView::from).collect();
    Ok(Json(Paginated::new("/api/v1/volunteers/", &params, page, count, results)))
}

async fn create_volunteer(state: &AppState, input: VolunteerRegistration) -> ApiResult<Volunteer> {
    let new = validate_registration(&input).map_err(|e| ApiError::invalid("Kayıt bilgilerinde hata var.", e))?;
    let hash = auth::hash_password_blocking(new.password.clone()).await?;
    match db::volunteers::register(&state.db, new, hash).await {
        Ok(Ok(volunteer)) => Ok(volunteer),
        Ok(Err(errors)) => Err(ApiError::invalid("Kayıt bilgilerinde hata var.", errors)),
        Err(e) if db::is_unique_violation(&e) => {
            tracing::warn!("Volunteer registration hit a unique constraint: {:#}", e);
            Err(ApiError::Conflict("Kayıt çakışması oluştu, lütfen tekrar deneyiniz.".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn registered(volunteer: Volunteer) -> (StatusCode, Json<Value>) {
    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Gönüllü kaydınız başarıyla tamamlandı! Artık giriş yapabilirsiniz.",
            "volunteer": VolunteerView::from(volunteer),
        })),
    )
}

/// Public self-registration.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<VolunteerRegistration>,
) -> ApiResult<impl IntoResponse> {
    // Self-registered accounts always start active.
    let input = VolunteerRegistration { is_active: None, ..input };
    let volunteer = create_volunteer(&state, input).await?;
    Ok(registered(volunteer))
}

pub async fn admin_create(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiJson(input): ApiJson<VolunteerRegistration>,
) -> ApiResult<impl IntoResponse> {
    let volunteer = create_volunteer(&state, input).await?;
    audit::log_audit(
        &state.db,
        Some(admin.user.id.to_string()),
        "CREATE",
        "volunteers",
        Some(volunteer.id.to_string()),
        Some(format!("Gönüllü oluşturuldu: {}", volunteer.code)),
    )
    .await?;
    Ok(registered(volunteer))
}

pub async fn get_volunteer(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<VolunteerView>> {
    let volunteer = db::volunteers::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Gönüllü bulunamadı.".to_string()))?;
    Ok(Json(volunteer.into()))
}

/// Only `is_active` may change here.
pub async fn patch_volunteer(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<VolunteerView>> {
    let Some(raw) = body.get("is_active") else {
        return Err(ApiError::BadRequest("Sadece is_active alanı güncellenebilir.".to_string()));
    };
    let active = match raw {
        Value::Bool(b) => *b,
        Value::String(s) => filters::parse_bool(s)
            .ok_or_else(|| ApiError::field("is_active", "Geçerli bir boolean değeri giriniz."))?,
        _ => return Err(ApiError::field("is_active", "Geçerli bir boolean değeri giriniz.")),
    };

    let volunteer = db::volunteers::set_active(&state.db, id, active)
        .await?
        .ok_or_else(|| ApiError::NotFound("Gönüllü bulunamadı.".to_string()))?;

    tracing::info!(volunteer = %volunteer.code, active, "volunteer activity changed");
    audit::log_audit(
        &state.db,
        Some(admin.user.id.to_string()),
        "UPDATE",
        "volunteers",
        Some(volunteer.id.to_string()),
        Some(format!("{}: is_active={}", volunteer.code, active)),
    )
    .await?;
    Ok(Json(volunteer.into()))
}

pub async fn stats(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Value>> {
    Ok(Json(db::stats::volunteer_report(&state.db).await?))
}
