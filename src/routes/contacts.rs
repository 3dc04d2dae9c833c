use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Json, Multipart, Path, Query, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::AdminUser;
use crate::choices::ContactStatus;
use crate::db::{
    self,
    contacts::{Attachment, BulkAction, ContactUpdate, Origin},
    models::{ContactMessage, User},
};
use crate::error::{ApiError, ApiJson, ApiResult, FieldErrors};
use crate::filters::{contact_filter, Ordering, Page, Paginated, Params, CONTACT_ORDERING};
use crate::storage;
use crate::validation::{validate_contact, ContactInput};
use crate::AppState;

/// Where a public submission came from.
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let ip = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(|ua| ua.chars().take(500).collect());
        Ok(ClientMeta { ip, user_agent })
    }
}

#[derive(Serialize)]
pub struct ContactView {
    #[serde(flatten)]
    pub message: ContactMessage,
    pub full_name: String,
    pub kategori_display: &'static str,
    pub durum_display: &'static str,
    pub oncelik_display: &'static str,
    pub dosya_url: Option<String>,
}

impl From<ContactMessage> for ContactView {
    fn from(message: ContactMessage) -> Self {
        ContactView {
            full_name: message.full_name(),
            kategori_display: message.category.label(),
            durum_display: message.status.label(),
            oncelik_display: message.priority.label(),
            dosya_url: message
                .attachment_key
                .as_ref()
                .map(|_| format!("/api/v1/contacts/{}/attachment/", message.id)),
            message,
        }
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Mesaj bulunamadı.".to_string())
}

fn admin_name(user: &User) -> String {
    let full = format!("{} {}", user.first_name, user.last_name).trim().to_string();
    if full.is_empty() {
        user.username.clone()
    } else {
        full
    }
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

/// Public contact form, sent as multipart with an optional `dosya` file.
pub async fn submit(
    State(state): State<AppState>,
    meta: ClientMeta,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut input = ContactInput::default();
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("Contact form multipart error: {}", e);
        ApiError::BadRequest("Form verisi okunamadı.".to_string())
    })? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "dosya" {
            let file_name = field.file_name().unwrap_or("dosya").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|_| ApiError::field("dosya", "Dosya boyutu 10MB'dan büyük olamaz."))?;
            if !bytes.is_empty() {
                upload = Some(Upload { file_name, bytes: bytes.to_vec() });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|_| ApiError::BadRequest("Form verisi okunamadı.".to_string()))?;
        let slot = match name.as_str() {
            "ad" => &mut input.ad,
            "soyad" => &mut input.soyad,
            "telefon" => &mut input.telefon,
            "email" => &mut input.email,
            "sehir" => &mut input.sehir,
            "kategori" => &mut input.kategori,
            "konu" => &mut input.konu,
            "mesaj" => &mut input.mesaj,
            "kvkk_onayi" => &mut input.kvkk_onayi,
            _ => continue,
        };
        *slot = Some(value);
    }

    let draft = validate_contact(&input, upload.as_ref().map(|u| u.bytes.len()))
        .map_err(|e| ApiError::invalid("Form bilgilerinde hata var.", e))?;

    let attachment = match upload {
        Some(Upload { file_name, bytes }) => {
            let key = storage::attachment_key(&file_name, Utc::now());
            let size = bytes.len() as i64;
            storage::put(&state.storage, &key, bytes).await?;
            let file_name: String = file_name.chars().take(255).collect();
            Some(Attachment { key, file_name, size })
        }
        None => None,
    };

    let message = db::contacts::insert(
        &state.db,
        draft,
        attachment,
        Origin { ip_address: meta.ip, user_agent: meta.user_agent },
    )
    .await?;
    tracing::info!(contact = message.id, kategori = %message.category, "contact message received");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Mesajınız başarıyla gönderildi. En kısa sürede size dönüş yapacağız.",
            "data": {
                "id": message.id,
                "konu": message.subject,
                "olusturulma_tarihi": message.created_at,
            },
        })),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<Params>,
) -> ApiResult<Json<Paginated<ContactView>>> {
    let filter = contact_filter(&params).map_err(ApiError::Validation)?;
    let ordering = Ordering::resolve(&params, CONTACT_ORDERING, "-olusturulma_tarihi");

    let count = db::contacts::count(&state.db, filter.clone()).await?;
    let page = Page::resolve(&params, count);
    let rows = db::contacts::list(&state.db, filter, ordering, Some((page.limit(), page.offset()))).await?;
    let results = rows.into_iter().map(ContactView::from).collect();
    Ok(Json(Paginated::new("/api/v1/contacts/", &params, page, count, results)))
}

pub async fn detail(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ContactView>> {
    let message = db::contacts::find(&state.db, id).await?.ok_or_else(not_found)?;
    Ok(Json(message.into()))
}

pub async fn update(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<ContactView>> {
    let mut changes: ContactUpdate = serde_json::from_value(body).map_err(|e| {
        let mut errors = FieldErrors::new();
        errors.add("non_field_errors", format!("Geçersiz veri: {e}"));
        ApiError::Validation(errors)
    })?;
    if changes.durum == Some(ContactStatus::Answered) && changes.cevaplayan_admin.is_none() {
        changes.cevaplayan_admin = Some(admin_name(&admin.user));
    }

    let message = db::contacts::update(&state.db, id, changes, admin.user.id.to_string())
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(message.into()))
}

pub async fn attachment(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let message = db::contacts::find(&state.db, id).await?.ok_or_else(not_found)?;
    let Some(key) = message.attachment_key else {
        return Err(ApiError::NotFound("Bu mesajda dosya bulunmuyor.".to_string()));
    };
    let file_name = message.attachment_name.unwrap_or_else(|| "dosya".to_string());
    let bytes = storage::get(&state.storage, &key).await?;

    let encoded: String = url::form_urlencoded::byte_serialize(file_name.as_bytes()).collect();
    let disposition = format!("attachment; filename*=UTF-8''{}", encoded.replace('+', "%20"));

    let mut resp = Response::new(bytes.into());
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(storage::content_type(&file_name)));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|e| anyhow::anyhow!("bad disposition header: {e}"))?,
    );
    Ok(resp)
}

#[derive(Deserialize)]
pub struct BulkRequest {
    #[serde(default)]
    pub ids: Vec<i64>,
    pub action: Option<String>,
}

pub async fn bulk(
    State(state): State<AppState>,
    admin: AdminUser,
    ApiJson(req): ApiJson<BulkRequest>,
) -> ApiResult<Json<Value>> {
    let mut errors = FieldErrors::new();
    if req.ids.is_empty() {
        errors.add("ids", "En az bir mesaj seçmelisiniz.");
    }
    let action = match req.action.as_deref() {
        None | Some("") => {
            errors.add("action", "İşlem seçilmelidir.");
            None
        }
        Some(raw) => {
            let parsed = serde_json::from_value::<BulkAction>(Value::String(raw.to_string())).ok();
            if parsed.is_none() {
                errors.add("action", format!("Geçersiz işlem: {raw}"));
            }
            parsed
        }
    };
    errors.into_result()?;
    let Some(action) = action else {
        return Err(ApiError::field("action", "İşlem seçilmelidir."));
    };

    let updated = db::contacts::bulk(&state.db, req.ids, action, admin_name(&admin.user)).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("{updated} mesaj güncellendi."),
        "updated": updated,
    })))
}
