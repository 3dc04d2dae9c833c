//! CSV exports for admins.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::Response,
};
use chrono::{DateTime, NaiveDate, Utc};

use crate::auth::AdminUser;
use crate::choices::city_display;
use crate::db::{self, models::Volunteer};
use crate::error::{ApiError, ApiResult};
use crate::filters::{cargo_filter, contact_filter, Ordering, Params, CARGO_ORDERING, CONTACT_ORDERING};
use crate::AppState;

const STAMP: &str = "%Y-%m-%d %H:%M";

fn csv_response(body: Vec<u8>, file_name: &'static str) -> Response {
    let mut resp = Response::new(body.into());
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename={file_name}")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    resp
}

fn finish(writer: csv::Writer<Vec<u8>>) -> anyhow::Result<Vec<u8>> {
    writer.into_inner().map_err(|e| anyhow::anyhow!("CSV flush failed: {}", e))
}

fn volunteer_cell(v: Option<&Volunteer>) -> String {
    v.map(|v| format!("{} ({})", v.full_name(), v.code)).unwrap_or_default()
}

pub async fn export_cargo(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<Params>,
) -> ApiResult<Response> {
    let filter = cargo_filter(&params).map_err(ApiError::Validation)?;
    let ordering = Ordering::resolve(&params, CARGO_ORDERING, "-olusturulma_tarihi");
    let records = db::cargo::list(&state.db, filter, ordering, None).await?;

    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record([
        "Kargo No",
        "Durum",
        "Kargo Tipi",
        "Çıkış Yeri",
        "Ulaşacağı Yer",
        "Ağırlık (kg)",
        "Hacim (m³)",
        "Miktar",
        "İçerik",
        "Gönderici",
        "Toplama Gönüllüsü",
        "Taşıma Gönüllüsü",
        "Dağıtım Gönüllüsü",
        "Oluşturulma Tarihi",
    ])
    .map_err(anyhow::Error::from)?;

    for r in &records {
        let c = &r.cargo;
        let sender = if c.anonymous {
            "Anonim".to_string()
        } else {
            format!(
                "{} {}",
                c.sender_first_name.as_deref().unwrap_or_default(),
                c.sender_last_name.as_deref().unwrap_or_default()
            )
            .trim()
            .to_string()
        };
        w.write_record([
            c.code.clone(),
            c.status.label().to_string(),
            c.kind.label().to_string(),
            city_display(&c.origin),
            city_display(&c.destination),
            format!("{:.2}", c.weight),
            format!("{:.2}", c.volume),
            c.quantity.to_string(),
            c.content.clone(),
            sender,
            volunteer_cell(r.collector.as_ref()),
            volunteer_cell(r.transporter.as_ref()),
            volunteer_cell(r.distributor.as_ref()),
            c.created_at.format(STAMP).to_string(),
        ])
        .map_err(anyhow::Error::from)?;
    }

    tracing::info!(rows = records.len(), "cargo export generated");
    Ok(csv_response(finish(w)?, "kargo_listesi.csv"))
}

pub async fn export_contacts(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<Params>,
) -> ApiResult<Response> {
    let filter = contact_filter(&params).map_err(ApiError::Validation)?;
    let ordering = Ordering::resolve(&params, CONTACT_ORDERING, "-olusturulma_tarihi");
    let messages = db::contacts::list(&state.db, filter, ordering, None).await?;

    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record([
        "ID",
        "Ad Soyad",
        "E-posta",
        "Telefon",
        "Şehir",
        "Kategori",
        "Konu",
        "Mesaj",
        "Durum",
        "Öncelik",
        "Dosya",
        "Cevaplayan",
        "Cevap Tarihi",
        "Oluşturulma Tarihi",
    ])
    .map_err(anyhow::Error::from)?;

    for m in &messages {
        w.write_record([
            m.id.to_string(),
            m.full_name(),
            m.email.clone(),
            m.phone.clone(),
            m.city.clone(),
            m.category.label().to_string(),
            m.subject.clone(),
            m.message.clone(),
            m.status.label().to_string(),
            m.priority.label().to_string(),
            m.attachment_name.clone().unwrap_or_default(),
            m.answered_by.clone().unwrap_or_default(),
            m.answered_at.map(|t| t.format(STAMP).to_string()).unwrap_or_default(),
            m.created_at.format(STAMP).to_string(),
        ])
        .map_err(anyhow::Error::from)?;
    }

    Ok(csv_response(finish(w)?, "iletisim_mesajlari.csv"))
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_since(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub async fn export_audit(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<Params>,
) -> ApiResult<Response> {
    let since = match params.get("since").map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            parse_since(raw).ok_or_else(|| ApiError::field("since", "Geçerli bir tarih giriniz (YYYY-MM-DD)."))?,
        ),
        None => None,
    };
    let logs = db::audit::list_audit_logs(&state.db, since).await?;

    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(["id", "user_id", "action", "table_name", "record_id", "details", "created_at"])
        .map_err(anyhow::Error::from)?;
    for a in logs {
        w.write_record([
            a.id,
            a.user_id.unwrap_or_default(),
            a.action,
            a.table_name,
            a.record_id.unwrap_or_default(),
            a.details.unwrap_or_default(),
            a.created_at.to_rfc3339(),
        ])
        .map_err(anyhow::Error::from)?;
    }

    Ok(csv_response(finish(w)?, "audit_logs.csv"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_accepts_dates_and_timestamps() {
        let day = parse_since("2025-02-01").unwrap();
        assert_eq!(day.to_rfc3339(), "2025-02-01T00:00:00+00:00");
        let ts = parse_since("2025-02-01T10:30:00+03:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-02-01T07:30:00+00:00");
        assert!(parse_since("dün").is_none());
    }
}
