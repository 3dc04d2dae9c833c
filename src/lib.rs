use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use opendal::Operator;
use serde_json::json;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod choices;
pub mod codes;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod mail;
pub mod routes;
pub mod storage;
pub mod validation;

use config::Config;
use db::DbPool;
use mail::Mailer;
use routes::{accounts, cargo, contacts, reports, statistics, volunteers};

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub storage: Operator,
    pub config: Arc<Config>,
    pub mailer: Mailer,
}

/// Multipart bodies carry one attachment plus a handful of text fields.
const CONTACT_BODY_LIMIT: usize = validation::MAX_ATTACHMENT_BYTES + 1024 * 1024;

/// Every API route, guarded and wrapped with tracing and security headers.
/// CORS and rate limiting are left to the binary.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/", get(api_root))
        .route("/api/v1/health/", get(health_check))
        // Cargo
        .route("/api/v1/kargo/", get(cargo::list_cargo).post(cargo::create_cargo))
        .route("/api/v1/kargo/track/", get(cargo::track))
        .route("/api/v1/kargo/by_volunteer/", get(cargo::by_volunteer))
        .route("/api/v1/kargo/content-options/", get(cargo::content_options))
        .route("/api/v1/kargo/health/", get(cargo::health))
        .route("/api/v1/kargo/export/", get(reports::export_cargo))
        .route("/api/v1/kargo/statistics/", get(statistics::general))
        .route("/api/v1/kargo/weight-volume-stats/", get(statistics::weight_volume))
        .route("/api/v1/kargo/city-stats/", get(statistics::cities))
        .route("/api/v1/kargo/volunteer-stats/", get(statistics::volunteers))
        .route("/api/v1/kargo/time-based-stats/", get(statistics::time_based))
        .route(
            "/api/v1/kargo/{id}/",
            get(cargo::get_cargo).put(cargo::put_cargo).patch(cargo::patch_cargo),
        )
        .route("/api/v1/kargo/{id}/update_status/", patch(cargo::update_status))
        // Volunteers
        .route("/api/v1/volunteers/", get(volunteers::list_volunteers).post(volunteers::admin_create))
        .route("/api/v1/volunteers/register/", post(volunteers::register))
        .route("/api/v1/volunteers/stats/", get(volunteers::stats))
        .route(
            "/api/v1/volunteers/{id}/",
            get(volunteers::get_volunteer).patch(volunteers::patch_volunteer),
        )
        // Accounts
        .route("/api/v1/volunteers/auth/login/", post(auth::login))
        .route("/api/v1/volunteers/auth/logout/", post(auth::logout))
        .route("/api/v1/volunteers/auth/user/", get(auth::me))
        .route("/api/v1/volunteers/auth/status/", get(auth::status))
        .route("/api/v1/volunteers/auth/change-password/", post(accounts::change_password))
        .route("/api/v1/volunteers/auth/deactivate/", post(accounts::deactivate))
        .route("/api/v1/volunteers/auth/password-reset-request/", post(accounts::reset_request))
        .route(
            "/api/v1/volunteers/auth/password-reset-verify/{uid}/{token}/",
            get(accounts::reset_verify),
        )
        .route(
            "/api/v1/volunteers/auth/password-reset-confirm/{uid}/{token}/",
            post(accounts::reset_confirm),
        )
        // Contact desk
        .route(
            "/api/v1/contacts/",
            post(contacts::submit)
                .layer(DefaultBodyLimit::max(CONTACT_BODY_LIMIT))
                .get(contacts::list),
        )
        .route("/api/v1/contacts/bulk/", post(contacts::bulk))
        .route("/api/v1/contacts/export/", get(reports::export_contacts))
        .route("/api/v1/contacts/{id}/", get(contacts::detail).patch(contacts::update))
        .route("/api/v1/contacts/{id}/attachment/", get(contacts::attachment))
        // Audit
        .route("/api/v1/audit/export/", get(reports::export_audit))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("same-origin"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
        .with_state(state)
}

/// API paths reachable without a session.
fn is_public(method: &Method, path: &str) -> bool {
    const OPEN: &[&str] = &[
        "/api/v1/",
        "/api/v1/health/",
        "/api/v1/kargo/track/",
        "/api/v1/kargo/health/",
        "/api/v1/volunteers/register/",
        "/api/v1/volunteers/auth/login/",
        "/api/v1/volunteers/auth/status/",
        "/api/v1/volunteers/auth/password-reset-request/",
    ];
    if OPEN.contains(&path) {
        return true;
    }
    if path == "/api/v1/contacts/" {
        return method == Method::POST;
    }
    path.starts_with("/api/v1/volunteers/auth/password-reset-verify/")
        || path.starts_with("/api/v1/volunteers/auth/password-reset-confirm/")
}

async fn require_auth(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path();
    if req.method() == Method::OPTIONS || !path.starts_with("/api/") || is_public(req.method(), path) {
        return next.run(req).await;
    }

    if let Some(token) = auth::extract_token_from_headers(req.headers()) {
        if auth::validate_token_str(&state.config.auth, &token).is_ok() {
            return next.run(req).await;
        }
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "message": "Kimlik doğrulama bilgileri sağlanmadı." })),
    )
        .into_response()
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "message": "Ayika Backend is running successfully" }))
}

async fn api_root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Ayika API - Acil Yardım ve İhtiyaç Koordinasyon Ağı",
        "version": "1.0.0",
        "endpoints": {
            "health": "/api/v1/health/",
            "kargo": "/api/v1/kargo/",
            "kargo_tracking": "/api/v1/kargo/track/",
            "volunteers": "/api/v1/volunteers/",
            "volunteer_register": "/api/v1/volunteers/register/",
            "volunteer_auth": "/api/v1/volunteers/auth/",
            "contacts": "/api/v1/contacts/",
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_paths() {
        assert!(is_public(&Method::GET, "/api/v1/kargo/track/"));
        assert!(is_public(&Method::POST, "/api/v1/contacts/"));
        assert!(!is_public(&Method::GET, "/api/v1/contacts/"));
        assert!(is_public(&Method::GET, "/api/v1/volunteers/auth/password-reset-verify/MQ/abc/"));
        assert!(!is_public(&Method::GET, "/api/v1/kargo/"));
        assert!(!is_public(&Method::GET, "/api/v1/kargo/statistics/"));
    }
}
