mod common;

use common::{spawn_app, VOLUNTEER_PASSWORD};
use serde_json::{json, Value};

#[tokio::test]
async fn registration_issues_volunteer_codes_and_rejects_duplicates() {
    let app = spawn_app().await;
    let first = app.register_volunteer("ilk@example.com", "5351234567", "tasima", "ankara").await;
    let second = app.register_volunteer("ikinci@example.com", "5351234568", "dagitim", "hatay").await;
    assert_eq!(first["gonulluluk_no"], "G000000000");
    assert_eq!(second["gonulluluk_no"], "G000000001");
    assert_eq!(first["gonullu_tipi_display"], "Taşıma Gönüllüsü");

    let resp = app
        .client
        .post(app.url("/api/v1/volunteers/register/"))
        .json(&json!({
            "ad": "Deniz",
            "soyad": "Kaya",
            "email": "ILK@example.com",
            "telefon": "5351234569",
            "sehir": "ankara",
            "gonullu_tipi": "tasima",
            "password": VOLUNTEER_PASSWORD,
            "password_confirm": VOLUNTEER_PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["errors"]["email"].is_array());
}

#[tokio::test]
async fn weak_registration_collects_every_error() {
    let app = spawn_app().await;
    let resp = app
        .client
        .post(app.url("/api/v1/volunteers/register/"))
        .json(&json!({
            "ad": "",
            "email": "not-an-email",
            "telefon": "0123",
            "sehir": "atlantis",
            "gonullu_tipi": "toplama",
            "password": "short",
            "password_confirm": "other",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    for field in ["ad", "soyad", "email", "telefon", "sehir", "password", "password_confirm"] {
        assert!(body["errors"][field].is_array(), "missing error for {field}");
    }
}

#[tokio::test]
async fn login_status_and_logout() {
    let app = spawn_app().await;
    app.register_volunteer("giris@example.com", "5361234567", "karma", "izmir").await;

    let resp = app
        .client
        .post(app.url("/api/v1/volunteers/auth/login/"))
        .json(&json!({ "email": "giris@example.com", "password": "Yanlis123!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let token = app.login("giris@example.com", VOLUNTEER_PASSWORD).await;
    let body: Value = app.get("/api/v1/volunteers/auth/status/", &token).await.json().await.unwrap();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["volunteer_profile"]["sehir"], "izmir");

    let anonymous: Value = app
        .client
        .get(app.url("/api/v1/volunteers/auth/status/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(anonymous["authenticated"], false);

    let resp = app.post_json("/api/v1/volunteers/auth/logout/", &token, &json!({})).await;
    assert_eq!(resp.status(), 200);
    let cookie = resp.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn admin_endpoints_reject_volunteers() {
    let app = spawn_app().await;
    app.register_volunteer("sade@example.com", "5371234567", "toplama", "istanbul").await;
    let token = app.login("sade@example.com", VOLUNTEER_PASSWORD).await;

    assert_eq!(app.get("/api/v1/volunteers/", &token).await.status(), 403);
    assert_eq!(app.get("/api/v1/contacts/", &token).await.status(), 403);
    assert_eq!(app.get("/api/v1/audit/export/", &token).await.status(), 403);
    assert_eq!(app.get("/api/v1/kargo/statistics/", &token).await.status(), 200);
}

#[tokio::test]
async fn admin_can_list_and_deactivate_volunteers() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let v = app.register_volunteer("pasif@example.com", "5381234567", "toplama", "istanbul").await;
    let id = v["id"].as_i64().unwrap();

    let list: Value = app.get("/api/v1/volunteers/?sehir=istanbul", &admin).await.json().await.unwrap();
    assert_eq!(list["count"], 1);

    let resp = app.patch_json(&format!("/api/v1/volunteers/{id}/"), &admin, &json!({ "ad": "Yeni" })).await;
    assert_eq!(resp.status(), 400);

    let resp = app.patch_json(&format!("/api/v1/volunteers/{id}/"), &admin, &json!({ "is_active": false })).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["is_active"], false);

    let stats: Value = app.get("/api/v1/volunteers/stats/", &admin).await.json().await.unwrap();
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["inactive"], 1);
    assert_eq!(stats["monthly_registrations"].as_array().unwrap().len(), 12);

    let audit = app.get("/api/v1/audit/export/", &admin).await.text().await.unwrap();
    assert!(audit.contains("is_active=false"));
}

#[tokio::test]
async fn password_reset_round_trip() {
    let app = spawn_app().await;
    app.register_volunteer("unuttum@example.com", "5391234567", "dagitim", "hatay").await;

    // Unknown addresses get the same success answer and no mail.
    let resp = app
        .client
        .post(app.url("/api/v1/volunteers/auth/password-reset-request/"))
        .json(&json!({ "email": "yok@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(app.sent_mail().is_empty());

    let resp = app
        .client
        .post(app.url("/api/v1/volunteers/auth/password-reset-request/"))
        .json(&json!({ "email": "unuttum@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let mail = app.sent_mail();
    assert_eq!(mail.len(), 1);
    assert_eq!(mail[0].to, "unuttum@example.com");
    let link = mail[0]
        .text
        .lines()
        .find(|l| l.contains("/password-reset/"))
        .expect("reset link")
        .trim()
        .to_string();
    let mut parts = link.trim_end_matches('/').rsplit('/');
    let token = parts.next().unwrap().to_string();
    let uid = parts.next().unwrap().to_string();

    let verify = app
        .client
        .get(app.url(&format!("/api/v1/volunteers/auth/password-reset-verify/{uid}/{token}/")))
        .send()
        .await
        .unwrap();
    assert_eq!(verify.status(), 200);
    let body: Value = verify.json().await.unwrap();
    assert_eq!(body["user_email"], "unuttum@example.com");

    let confirm_url = app.url(&format!("/api/v1/volunteers/auth/password-reset-confirm/{uid}/{token}/"));
    let resp = app
        .client
        .post(&confirm_url)
        .json(&json!({ "new_password": "YeniSifre9!", "confirm_password": "YeniSifre9!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // The link dies once the password has changed.
    let resp = app
        .client
        .post(&confirm_url)
        .json(&json!({ "new_password": "Baska1234!", "confirm_password": "Baska1234!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    app.login("unuttum@example.com", "YeniSifre9!").await;
}

#[tokio::test]
async fn change_password_checks_current_one() {
    let app = spawn_app().await;
    app.register_volunteer("degis@example.com", "5401234567", "toplama", "ankara").await;
    let token = app.login("degis@example.com", VOLUNTEER_PASSWORD).await;

    let resp = app
        .post_json(
            "/api/v1/volunteers/auth/change-password/",
            &token,
            &json!({ "current_password": "Yanlis123!", "new_password": "YeniSifre9!" }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    let resp = app
        .post_json(
            "/api/v1/volunteers/auth/change-password/",
            &token,
            &json!({ "current_password": VOLUNTEER_PASSWORD, "new_password": "YeniSifre9!" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    app.login("degis@example.com", "YeniSifre9!").await;
}
