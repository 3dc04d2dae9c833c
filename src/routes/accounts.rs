//! Password changes, self-deactivation and the emailed password-reset flow.

use axum::{
    extract::{Json, Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{self, AuthenticatedUser};
use crate::db::{self, audit, models::User};
use crate::error::{ApiError, ApiJson, ApiResult, FieldErrors};
use crate::validation::{is_valid_email, password_problems};
use crate::AppState;

const RESET_SUBJECT: &str = "Ayika - Şifre Sıfırlama";

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser { user }: AuthenticatedUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<Value>> {
    let current = req.current_password.unwrap_or_default();
    let new = req.new_password.unwrap_or_default();

    if current.is_empty() || new.is_empty() {
        let mut errors = FieldErrors::new();
        if current.is_empty() {
            errors.add("current_password", "Mevcut şifre gereklidir.");
        }
        if new.is_empty() {
            errors.add("new_password", "Yeni şifre gereklidir.");
        }
        return Err(ApiError::invalid("Mevcut şifre ve yeni şifre gereklidir.", errors));
    }

    if !auth::verify_password_blocking(current, user.password_hash.clone()).await? {
        let mut errors = FieldErrors::new();
        errors.add("current_password", "Mevcut şifre yanlış.");
        return Err(ApiError::invalid("Mevcut şifre yanlış.", errors));
    }

    let problems = password_problems(&new);
    if !problems.is_empty() {
        let mut errors = FieldErrors::new();
        for p in problems {
            errors.add("new_password", p);
        }
        return Err(ApiError::invalid("Şifre güvenlik gereksinimlerini karşılamıyor.", errors));
    }

    let hash = auth::hash_password_blocking(new).await?;
    db::users::set_password(&state.db, user.id, hash).await?;
    tracing::info!(user = user.id, "password changed");
    audit::log_audit(&state.db, Some(user.id.to_string()), "PASSWORD_CHANGE", "users", Some(user.id.to_string()), None)
        .await?;

    Ok(Json(json!({ "success": true, "message": "Şifre başarıyla değiştirildi." })))
}

pub async fn deactivate(
    State(state): State<AppState>,
    AuthenticatedUser { user }: AuthenticatedUser,
) -> ApiResult<Response> {
    db::users::deactivate(&state.db, user.id).await?;
    tracing::info!(user = user.id, "account deactivated");
    audit::log_audit(&state.db, Some(user.id.to_string()), "DEACTIVATE", "users", Some(user.id.to_string()), None)
        .await?;

    let mut response = Json(json!({ "success": true, "message": "Hesap başarıyla deaktif edildi." })).into_response();
    let cookie = auth::clear_auth_cookie(&state.config.auth);
    if let Ok(value) = cookie.parse() {
        response.headers_mut().insert(axum::http::header::SET_COOKIE, value);
    }
    Ok(response)
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub email: Option<String>,
}

fn reset_mail(user: &User, reset_url: &str) -> (String, String) {
    let name = if user.first_name.is_empty() { &user.username } else { &user.first_name };
    let text = format!(
        "Merhaba {name},\n\n\
         Hesabınız için şifre sıfırlama talebinde bulundunuz. Yeni şifrenizi oluşturmak için \
         aşağıdaki bağlantıyı kullanın:\n\n{reset_url}\n\n\
         Bu bağlantı 24 saat boyunca geçerlidir. Eğer şifre sıfırlama talebinde bulunmadıysanız, \
         bu e-postayı görmezden gelebilirsiniz.\n\n\
         Güvenliğiniz için, bu bağlantıyı kimseyle paylaşmayın.\n"
    );
    let html = format!(
        "<html><body style=\"font-family: Arial, sans-serif; line-height: 1.6; color: #333;\">\
         <h2 style=\"color: #1976d2;\">{RESET_SUBJECT}</h2>\
         <p>Merhaba {name},</p>\
         <p>Hesabınız için şifre sıfırlama talebinde bulundunuz. Yeni şifrenizi oluşturmak için aşağıdaki bağlantıya tıklayın:</p>\
         <p><a href=\"{reset_url}\">Şifremi Sıfırla</a></p>\
         <p>Bu bağlantı 24 saat boyunca geçerlidir.</p>\
         </body></html>"
    );
    (text, html)
}

/// Always answers with success for well-formed addresses, known or not.
pub async fn reset_request(State(state): State<AppState>, Json(req): Json<ResetRequest>) -> ApiResult<Json<Value>> {
    let email = req.email.unwrap_or_default().trim().to_lowercase();
    if email.is_empty() {
        let mut errors = FieldErrors::new();
        errors.add("email", "E-posta adresi gereklidir.");
        return Err(ApiError::invalid("E-posta adresi gereklidir.", errors));
    }
    if !is_valid_email(&email) {
        let mut errors = FieldErrors::new();
        errors.add("email", "Geçerli bir e-posta adresi giriniz.");
        return Err(ApiError::invalid("Geçerli bir e-posta adresi giriniz.", errors));
    }

    let user = match db::users::find_by_email(&state.db, email).await? {
        Some(user) if user.is_active => user,
        _ => {
            return Ok(Json(json!({
                "success": true,
                "message": "Eğer bu e-posta adresi sistemde kayıtlıysa, şifre sıfırlama bağlantısı gönderildi.",
            })))
        }
    };

    let token = auth::create_reset_token(&state.config.auth, &user)?;
    let reset_url = format!(
        "{}/password-reset/{}/{}/",
        state.config.frontend_url.trim_end_matches('/'),
        auth::encode_uid(user.id),
        token
    );
    let (text, html) = reset_mail(&user, &reset_url);
    state.mailer.send(&user.email, RESET_SUBJECT, text, Some(html)).await?;
    tracing::info!(user = user.id, "password reset link sent");

    Ok(Json(json!({
        "success": true,
        "message": "Şifre sıfırlama bağlantısı e-posta adresinize gönderildi.",
    })))
}

/// The account a reset link points at, if the link is still good.
async fn reset_target(state: &AppState, uid: &str, token: &str) -> ApiResult<User> {
    let invalid_link = || ApiError::BadRequest("Geçersiz bağlantı.".to_string());
    let id = auth::decode_uid(uid).ok_or_else(invalid_link)?;
    let user = db::users::find_by_id(&state.db, id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(invalid_link)?;
    if !auth::verify_reset_token(&state.config.auth, token, &user) {
        return Err(ApiError::BadRequest("Geçersiz veya süresi dolmuş bağlantı.".to_string()));
    }
    Ok(user)
}

pub async fn reset_verify(
    State(state): State<AppState>,
    Path((uid, token)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let user = reset_target(&state, &uid, &token).await?;
    Ok(Json(json!({ "success": true, "message": "Token geçerli.", "user_email": user.email })))
}

#[derive(Deserialize)]
pub struct ResetConfirm {
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

pub async fn reset_confirm(
    State(state): State<AppState>,
    Path((uid, token)): Path<(String, String)>,
    ApiJson(req): ApiJson<ResetConfirm>,
) -> ApiResult<Json<Value>> {
    let user = reset_target(&state, &uid, &token).await?;

    let new = req.new_password.unwrap_or_default();
    let confirm = req.confirm_password.unwrap_or_default();
    if new.is_empty() || confirm.is_empty() {
        let mut errors = FieldErrors::new();
        if new.is_empty() {
            errors.add("new_password", "Yeni şifre gereklidir.");
        }
        if confirm.is_empty() {
            errors.add("confirm_password", "Şifre tekrarı gereklidir.");
        }
        return Err(ApiError::invalid("Yeni şifre ve şifre tekrarı gereklidir.", errors));
    }
    if new != confirm {
        let mut errors = FieldErrors::new();
        errors.add("confirm_password", "Şifreler eşleşmiyor.");
        return Err(ApiError::invalid("Şifreler eşleşmiyor.", errors));
    }
    let problems = password_problems(&new);
    if !problems.is_empty() {
        let mut errors = FieldErrors::new();
        for p in problems {
            errors.add("new_password", p);
        }
        return Err(ApiError::invalid("Şifre güvenlik gereksinimlerini karşılamıyor.", errors));
    }

    let hash = auth::hash_password_blocking(new).await?;
    db::users::set_password(&state.db, user.id, hash).await?;
    tracing::info!(user = user.id, "password reset completed");
    audit::log_audit(&state.db, Some(user.id.to_string()), "PASSWORD_RESET", "users", Some(user.id.to_string()), None)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Şifreniz başarıyla değiştirildi. Artık yeni şifrenizle giriş yapabilirsiniz.",
    })))
}
