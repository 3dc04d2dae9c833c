use std::future::Future;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRequestParts, Json, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::AuthSettings;
use crate::db::{self, models::User};
use crate::error::{ApiError, ApiJson, ApiResult, FieldErrors};
use crate::routes::volunteers::VolunteerView;
use crate::AppState;

pub const AUTH_COOKIE_NAME: &str = "auth_token";
const SESSION_HOURS: i64 = 24;
const RESET_PURPOSE: &str = "password_reset";

// Claims for our session JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub username: String,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    sub: String,
    exp: usize,
    purpose: String,
    // password_changed_at in microseconds; a new password voids the link
    pwd: i64,
}

pub fn create_jwt(settings: &AuthSettings, user: &User) -> anyhow::Result<String> {
    let expiration = (Utc::now() + Duration::hours(SESSION_HOURS)).timestamp();

    let claims = Claims {
        sub: user.id.to_string(),
        exp: expiration as usize,
        username: user.username.clone(),
        is_admin: user.is_admin(),
        iss: settings.issuer.clone(),
        aud: settings.audience.clone(),
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(settings.secret.as_ref()))?;
    Ok(token)
}

fn validation(settings: &AuthSettings) -> Validation {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    if let Some(issuer) = &settings.issuer {
        validation.set_issuer(&[issuer.as_str()]);
    }
    if let Some(audience) = &settings.audience {
        validation.set_audience(&[audience.as_str()]);
    }
    validation
}

pub fn validate_token_str(settings: &AuthSettings, token: &str) -> anyhow::Result<Claims> {
    let data = decode::<Claims>(token, &DecodingKey::from_secret(settings.secret.as_ref()), &validation(settings))?;
    Ok(data.claims)
}

pub fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    let cookie_header = headers.get(header::COOKIE).and_then(|h| h.to_str().ok())?;
    cookie_header
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(k, _)| *k == AUTH_COOKIE_NAME)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

pub fn build_auth_cookie(settings: &AuthSettings, token: &str) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        AUTH_COOKIE_NAME,
        token,
        SESSION_HOURS * 3600
    );
    if settings.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_auth_cookie(settings: &AuthSettings) -> String {
    let mut cookie = format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", AUTH_COOKIE_NAME);
    if settings.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::warn!("Unreadable password hash: {}", e);
            false
        }
    }
}

/// Hashing is deliberately slow; keep it off the async workers.
pub async fn hash_password_blocking(password: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| anyhow::anyhow!("hashing task failed: {e}"))?
}

pub async fn verify_password_blocking(password: String, stored_hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| anyhow::anyhow!("verify task failed: {e}"))
}

pub fn encode_uid(user_id: i64) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

pub fn decode_uid(uid: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uid.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()?.parse().ok()
}

pub fn create_reset_token(settings: &AuthSettings, user: &User) -> anyhow::Result<String> {
    let claims = ResetClaims {
        sub: user.id.to_string(),
        exp: (Utc::now() + Duration::hours(24)).timestamp() as usize,
        purpose: RESET_PURPOSE.to_string(),
        pwd: user.password_changed_at.timestamp_micros(),
    };
    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(settings.secret.as_ref()))?)
}

/// True when `token` was issued for `user` and the password has not changed since.
pub fn verify_reset_token(settings: &AuthSettings, token: &str, user: &User) -> bool {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    match decode::<ResetClaims>(token, &DecodingKey::from_secret(settings.secret.as_ref()), &validation) {
        Ok(data) => {
            data.claims.purpose == RESET_PURPOSE
                && data.claims.sub == user.id.to_string()
                && data.claims.pwd == user.password_changed_at.timestamp_micros()
        }
        Err(e) => {
            tracing::debug!("Reset token rejected: {}", e);
            false
        }
    }
}

/// Signed-in, active account behind the request's session token.
pub struct AuthenticatedUser {
    pub user: User,
}

/// Resolves the session user from headers, if any.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> ApiResult<Option<User>> {
    let Some(token) = extract_token_from_headers(headers) else {
        return Ok(None);
    };
    let claims = match validate_token_str(&state.config.auth, &token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("Token error: {}", e);
            return Ok(None);
        }
    };
    let Ok(user_id) = claims.sub.parse::<i64>() else {
        return Ok(None);
    };
    let user = db::users::find_by_id(&state.db, user_id).await?;
    Ok(user.filter(|u| u.is_active))
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            match current_user(state, &parts.headers).await? {
                Some(user) => Ok(AuthenticatedUser { user }),
                None => Err(ApiError::Unauthorized("Kimlik doğrulama bilgileri sağlanmadı.".to_string())),
            }
        }
    }
}

/// Staff or superuser.
pub struct AdminUser {
    pub user: User,
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let AuthenticatedUser { user } = AuthenticatedUser::from_request_parts(parts, state).await?;
            if !user.is_admin() {
                return Err(ApiError::Forbidden);
            }
            Ok(AdminUser { user })
        }
    }
}

/// Account as the client sees it, with the linked volunteer profile.
#[derive(Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_admin: bool,
    pub volunteer_profile: Option<VolunteerView>,
}

pub async fn auth_user(state: &AppState, user: User) -> ApiResult<AuthUser> {
    let profile = db::volunteers::find_by_user(&state.db, user.id).await?;
    Ok(AuthUser {
        id: user.id,
        is_admin: user.is_admin(),
        username: user.username,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        is_active: user.is_active,
        is_staff: user.is_staff,
        is_superuser: user.is_superuser,
        volunteer_profile: profile.map(VolunteerView::from),
    })
}

fn with_cookie(mut response: Response, cookie: &str) -> ApiResult<Response> {
    let value = HeaderValue::from_str(cookie).map_err(|e| anyhow::anyhow!("invalid cookie header: {e}"))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login(State(state): State<AppState>, ApiJson(payload): ApiJson<LoginRequest>) -> ApiResult<Response> {
    let email = payload.email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    let mut errors = FieldErrors::new();
    if email.is_empty() {
        errors.add("email", "Bu alan zorunludur.");
    } else if !crate::validation::is_valid_email(&email) {
        errors.add("email", "Geçerli bir e-posta adresi giriniz.");
    }
    if password.is_empty() {
        errors.add("password", "Bu alan zorunludur.");
    }
    if !errors.is_empty() {
        return Err(ApiError::invalid("Geçersiz veri.", errors));
    }

    let user = match db::users::find_by_email(&state.db, email.clone()).await? {
        Some(user) if user.is_active => user,
        _ => {
            tracing::info!(email = %email, "login for unknown or inactive account");
            return Err(ApiError::Unauthorized(
                "Bu e-posta adresi ile kayıtlı kullanıcı bulunamadı.".to_string(),
            ));
        }
    };

    if !verify_password_blocking(password, user.password_hash.clone()).await? {
        tracing::info!(user = user.id, "login with wrong password");
        return Err(ApiError::Unauthorized("E-posta veya şifre hatalı.".to_string()));
    }

    let token = create_jwt(&state.config.auth, &user)?;
    let cookie = build_auth_cookie(&state.config.auth, &token);
    tracing::info!(user = user.id, username = %user.username, "user logged in");

    let body = auth_user(&state, user).await?;
    with_cookie(
        Json(json!({ "success": true, "message": "Giriş başarılı.", "user": body })).into_response(),
        &cookie,
    )
}

pub async fn logout(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult<Response> {
    tracing::info!(user = user.user.id, "user logged out");
    let cookie = clear_auth_cookie(&state.config.auth);
    with_cookie(
        Json(json!({ "success": true, "message": "Çıkış başarılı." })).into_response(),
        &cookie,
    )
}

pub async fn me(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult<Json<serde_json::Value>> {
    let body = auth_user(&state, user.user).await?;
    Ok(Json(json!({ "success": true, "user": body })))
}

pub async fn status(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<serde_json::Value>> {
    match current_user(&state, &headers).await? {
        Some(user) => {
            let body = auth_user(&state, user).await?;
            Ok(Json(json!({ "authenticated": true, "user": body })))
        }
        None => Ok(Json(json!({ "authenticated": false, "user": null }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AuthSettings {
        AuthSettings { secret: "test-secret".into(), issuer: None, audience: None, secure_cookies: false }
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 7,
            username: "ayse".into(),
            email: "ayse@example.com".into(),
            password_hash: String::new(),
            first_name: "Ayşe".into(),
            last_name: "Yılmaz".into(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            password_changed_at: now,
            date_joined: now,
        }
    }

    #[test]
    fn session_token_round_trips() {
        let token = create_jwt(&settings(), &user()).unwrap();
        let claims = validate_token_str(&settings(), &token).unwrap();
        assert_eq!(claims.sub, "7");
        assert!(!claims.is_admin);
    }

    #[test]
    fn audience_is_enforced_when_configured() {
        let mut with_aud = settings();
        with_aud.audience = Some("ayika".into());
        let token = create_jwt(&with_aud, &user()).unwrap();
        assert!(validate_token_str(&with_aud, &token).is_ok());

        let mut other = settings();
        other.audience = Some("elsewhere".into());
        assert!(validate_token_str(&other, &token).is_err());
    }

    #[test]
    fn passwords_hash_and_verify() {
        let hash = hash_password("Guclu1!sifre").unwrap();
        assert!(verify_password("Guclu1!sifre", &hash));
        assert!(!verify_password("yanlis", &hash));
        assert!(!verify_password("x", "not-a-phc-string"));
    }

    #[test]
    fn reset_token_dies_with_password_change() {
        let mut u = user();
        let token = create_reset_token(&settings(), &u).unwrap();
        assert!(verify_reset_token(&settings(), &token, &u));

        u.password_changed_at = u.password_changed_at + Duration::seconds(1);
        assert!(!verify_reset_token(&settings(), &token, &u));
    }

    #[test]
    fn session_token_is_not_a_reset_token() {
        let u = user();
        let session = create_jwt(&settings(), &u).unwrap();
        assert!(!verify_reset_token(&settings(), &session, &u));
    }

    #[test]
    fn uid_round_trips() {
        assert_eq!(decode_uid(&encode_uid(42)), Some(42));
        assert_eq!(decode_uid("!!"), None);
    }

    #[test]
    fn token_read_from_bearer_or_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("a=1; auth_token=abc"));
        assert_eq!(extract_token_from_headers(&headers).as_deref(), Some("abc"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(extract_token_from_headers(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn cookie_flags_follow_settings() {
        let mut s = settings();
        assert!(!build_auth_cookie(&s, "t").contains("Secure"));
        s.secure_cookies = true;
        let cookie = build_auth_cookie(&s, "t");
        assert!(cookie.contains("HttpOnly; SameSite=Strict; Path=/; Max-Age=86400"));
        assert!(cookie.ends_with("; Secure"));
    }
}
