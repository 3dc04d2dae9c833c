mod common;

use common::{cargo_body, spawn_app};
use serde_json::{json, Value};

#[tokio::test]
async fn sequential_creations_issue_increasing_codes() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let collector = app.register_volunteer("toplama@example.com", "5301112233", "toplama", "istanbul").await;
    let collector_id = collector["id"].as_i64().unwrap();

    let mut codes = Vec::new();
    for _ in 0..3 {
        let resp = app.post_json("/api/v1/kargo/", &token, &cargo_body(collector_id)).await;
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        codes.push(body["kargo_no"].as_str().unwrap().to_string());
    }
    assert_eq!(codes, ["AYK000000000", "AYK000000001", "AYK000000002"]);
}

#[tokio::test]
async fn concurrent_creations_get_distinct_codes() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let collector = app.register_volunteer("karma@example.com", "5301112234", "karma", "ankara").await;
    let collector_id = collector["id"].as_i64().unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let client = app.client.clone();
        let url = app.url("/api/v1/kargo/");
        let token = token.clone();
        let body = cargo_body(collector_id);
        handles.push(tokio::spawn(async move {
            let resp = client.post(url).bearer_auth(token).json(&body).send().await.unwrap();
            assert_eq!(resp.status(), 201);
            let body: Value = resp.json().await.unwrap();
            body["kargo_no"].as_str().unwrap().to_string()
        }));
    }

    let mut codes = Vec::new();
    for h in handles {
        codes.push(h.await.unwrap());
    }
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), 6);
}

#[tokio::test]
async fn validation_reports_offending_fields() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let collector = app.register_volunteer("t1@example.com", "5301112235", "toplama", "izmir").await;
    let distributor = app.register_volunteer("d1@example.com", "5301112236", "dagitim", "izmir").await;

    let mut same_city = cargo_body(collector["id"].as_i64().unwrap());
    same_city["ulasacagi_yer"] = json!("istanbul");
    let resp = app.post_json("/api/v1/kargo/", &token, &same_city).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["errors"]["ulasacagi_yer"].is_array());

    let wrong_role = cargo_body(distributor["id"].as_i64().unwrap());
    let resp = app.post_json("/api/v1/kargo/", &token, &wrong_role).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["errors"]["toplama_gonullusu"].is_array());
}

#[tokio::test]
async fn anonymous_sender_fields_are_cleared() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let collector = app.register_volunteer("anon@example.com", "5301112237", "toplama", "istanbul").await;

    let mut body = cargo_body(collector["id"].as_i64().unwrap());
    body["anonim_gonderici"] = json!(true);
    let resp = app.post_json("/api/v1/kargo/", &token, &body).await;
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["anonim_gonderici"], true);
    for field in ["gonderici_ad", "gonderici_soyad", "gonderici_telefon", "gonderici_email"] {
        assert!(created[field].is_null(), "{field} should be null");
    }

    let id = created["id"].as_i64().unwrap();
    let fetched: Value = app.get(&format!("/api/v1/kargo/{id}/"), &token).await.json().await.unwrap();
    assert!(fetched["gonderici_ad"].is_null());
    assert_eq!(fetched["toplama_gonullusu_detail"]["id"], collector["id"]);
}

#[tokio::test]
async fn tracking_checks_format_before_lookup() {
    let app = spawn_app().await;

    let resp = app.client.get(app.url("/api/v1/kargo/track/?kargo_no=AYK000000000")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "CARGO_NOT_FOUND");

    let resp = app.client.get(app.url("/api/v1/kargo/track/?kargo_no=bad")).send().await.unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_CARGO_FORMAT");

    let resp = app.client.get(app.url("/api/v1/kargo/track/")).send().await.unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_CARGO_NUMBER");
}

#[tokio::test]
async fn tracking_hides_sender_identity() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let collector = app.register_volunteer("track@example.com", "5301112238", "toplama", "istanbul").await;
    let resp = app.post_json("/api/v1/kargo/", &token, &cargo_body(collector["id"].as_i64().unwrap())).await;
    assert_eq!(resp.status(), 201);

    let resp = app.client.get(app.url("/api/v1/kargo/track/?kargo_no=ayk000000000")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["kargo_no"], "AYK000000000");
    assert!(body["data"].get("gonderici_ad").is_none());
}

#[tokio::test]
async fn statistics_over_empty_store_are_zero() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let body: Value = app.get("/api/v1/kargo/statistics/", &token).await.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["toplam_kargo"], 0);
    assert_eq!(body["data"]["durum_teslim_edildi"]["count"], 0);
    assert_eq!(body["data"]["durum_teslim_edildi"]["percentage"], 0.0);

    let body: Value = app.get("/api/v1/kargo/weight-volume-stats/", &token).await.json().await.unwrap();
    assert_eq!(body["data"]["toplam_agirlik"], 0.0);

    let resp = app.get("/api/v1/kargo/time-based-stats/?days=0", &token).await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn status_update_and_export() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let collector = app.register_volunteer("exp@example.com", "5301112239", "toplama", "istanbul").await;
    let created: Value = app
        .post_json("/api/v1/kargo/", &token, &cargo_body(collector["id"].as_i64().unwrap()))
        .await
        .json()
        .await
        .unwrap();
    let id = created["id"].as_i64().unwrap();

    let resp = app
        .patch_json(&format!("/api/v1/kargo/{id}/update_status/"), &token, &json!({ "durum": "yolda" }))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["durum"], "yolda");

    let resp = app.get("/api/v1/kargo/export/", &token).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()["content-disposition"].to_str().unwrap().contains("kargo_listesi.csv"));
    let csv = resp.text().await.unwrap();
    assert!(csv.contains("AYK000000000"));
    assert!(csv.contains("Yolda"));
}

#[tokio::test]
async fn cargo_endpoints_require_a_session() {
    let app = spawn_app().await;
    let resp = app.client.get(app.url("/api/v1/kargo/")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app.client.get(app.url("/api/v1/kargo/health/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn status_change_rechecks_volunteer_assignments() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let collector = app.register_volunteer("pasif@example.com", "5301112240", "toplama", "istanbul").await;
    let collector_id = collector["id"].as_i64().unwrap();
    let created: Value = app.post_json("/api/v1/kargo/", &token, &cargo_body(collector_id)).await.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();

    let resp = app
        .patch_json(&format!("/api/v1/volunteers/{collector_id}/"), &token, &json!({ "is_active": false }))
        .await;
    assert_eq!(resp.status(), 200);

    let resp = app
        .patch_json(&format!("/api/v1/kargo/{id}/update_status/"), &token, &json!({ "durum": "yolda" }))
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["errors"]["toplama_gonullusu"].is_array());

    let fetched: Value = app.get(&format!("/api/v1/kargo/{id}/"), &token).await.json().await.unwrap();
    assert_eq!(fetched["durum"], "hazirlaniyor");
    assert!(!app.audit_csv(&token).await.contains("STATUS_CHANGE"));
}

#[tokio::test]
async fn sender_mode_changes_clear_fields_and_are_audited() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let collector = app.register_volunteer("mod@example.com", "5301112241", "toplama", "istanbul").await;
    let collector_id = collector["id"].as_i64().unwrap();
    let created: Value = app.post_json("/api/v1/kargo/", &token, &cargo_body(collector_id)).await.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();
    let path = format!("/api/v1/kargo/{id}/");

    // Named to anonymous through a full replacement.
    let mut replacement = cargo_body(collector_id);
    replacement["anonim_gonderici"] = json!(true);
    let resp = app.put_json(&path, &token, &replacement).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    for field in ["gonderici_ad", "gonderici_soyad", "gonderici_telefon", "gonderici_email"] {
        assert!(body[field].is_null(), "{field} should be cleared");
    }
    assert!(app.audit_csv(&token).await.contains("AYK000000000: gönderici durumu anonim"));

    // Back to named needs the sender fields again.
    let resp = app.patch_json(&path, &token, &json!({ "anonim_gonderici": false })).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["errors"]["gonderici_ad"].is_array());
    assert!(body["errors"]["gonderici_telefon"].is_array());

    let resp = app
        .patch_json(
            &path,
            &token,
            &json!({
                "anonim_gonderici": false,
                "gonderici_ad": "Ali",
                "gonderici_soyad": "Veli",
                "gonderici_telefon": "5329876543",
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["anonim_gonderici"], false);
    assert_eq!(body["gonderici_ad"], "Ali");
    assert!(app.audit_csv(&token).await.contains("AYK000000000: gönderici durumu gönderici bilgili"));

    // A partial update to anonymous drops the stored sender too.
    let resp = app.patch_json(&path, &token, &json!({ "anonim_gonderici": true })).await;
    assert_eq!(resp.status(), 200);
    let fetched: Value = app.get(&path, &token).await.json().await.unwrap();
    assert!(fetched["gonderici_ad"].is_null());
    assert!(fetched["gonderici_telefon"].is_null());

    let audit = app.audit_csv(&token).await;
    assert_eq!(audit.matches("ANONYMITY_CHANGE").count(), 3);
}

#[tokio::test]
async fn malformed_json_gets_the_error_envelope() {
    let app = spawn_app().await;
    let token = app.admin_token().await;
    let resp = app
        .client
        .post(app.url("/api/v1/kargo/"))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{\"agirlik\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().starts_with("Geçersiz JSON"));
}
