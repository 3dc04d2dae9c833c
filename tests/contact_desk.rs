mod common;

use common::spawn_app;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};

fn contact_form(subject: &str) -> Form {
    Form::new()
        .text("ad", "Elif")
        .text("soyad", "Demir")
        .text("telefon", "5551234567")
        .text("email", "elif@example.com")
        .text("sehir", "Malatya")
        .text("kategori", "yardim")
        .text("konu", subject.to_string())
        .text("mesaj", "Mahallemizde battaniye ihtiyacı var.")
        .text("kvkk_onayi", "true")
}

async fn submit(app: &common::TestApp, form: Form) -> reqwest::Response {
    app.client
        .post(app.url("/api/v1/contacts/"))
        .multipart(form)
        .send()
        .await
        .expect("contact submit")
}

#[tokio::test]
async fn consent_is_required() {
    let app = spawn_app().await;
    let form = Form::new()
        .text("ad", "Elif")
        .text("soyad", "Demir")
        .text("telefon", "5551234567")
        .text("email", "elif@example.com")
        .text("sehir", "Malatya")
        .text("kategori", "genel")
        .text("konu", "Bilgi")
        .text("mesaj", "Merhaba");
    let resp = submit(&app, form).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["errors"]["kvkk_onayi"].is_array());
}

#[tokio::test]
async fn submission_with_attachment_reaches_the_admin_desk() {
    let app = spawn_app().await;
    let file = Part::bytes(b"%PDF-1.4 test".to_vec()).file_name("ihtiyac listesi.pdf");
    let resp = submit(&app, contact_form("Battaniye talebi").part("dosya", file)).await;
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    let id = created["data"]["id"].as_i64().unwrap();

    // Anonymous visitors cannot read the desk.
    let resp = app.client.get(app.url("/api/v1/contacts/")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let admin = app.admin_token().await;
    let list: Value = app.get("/api/v1/contacts/?kategori=yardim", &admin).await.json().await.unwrap();
    assert_eq!(list["count"], 1);
    let row = &list["results"][0];
    assert_eq!(row["durum"], "yeni");
    assert_eq!(row["oncelik"], "normal");
    assert_eq!(row["dosya_adi"], "ihtiyac listesi.pdf");
    assert_eq!(row["ip_adresi"], "127.0.0.1");
    assert_eq!(row["dosya_url"], format!("/api/v1/contacts/{id}/attachment/"));

    let resp = app.get(&format!("/api/v1/contacts/{id}/attachment/"), &admin).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"%PDF-1.4 test");
}

#[tokio::test]
async fn answering_stamps_reply_metadata() {
    let app = spawn_app().await;
    let created: Value = submit(&app, contact_form("Soru")).await.json().await.unwrap();
    let id = created["data"]["id"].as_i64().unwrap();
    let admin = app.admin_token().await;

    let resp = app
        .patch_json(
            &format!("/api/v1/contacts/{id}/"),
            &admin,
            &json!({ "durum": "cevaplandi", "admin_notu": "Telefonla dönüldü." }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["durum"], "cevaplandi");
    assert_eq!(body["cevaplayan_admin"], "admin");
    assert!(!body["cevap_tarihi"].is_null());

    let resp = app
        .patch_json(&format!("/api/v1/contacts/{id}/"), &admin, &json!({ "durum": "bilinmeyen" }))
        .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn bulk_actions_update_every_selected_message() {
    let app = spawn_app().await;
    let mut ids = Vec::new();
    for subject in ["Birinci", "İkinci"] {
        let created: Value = submit(&app, contact_form(subject)).await.json().await.unwrap();
        ids.push(created["data"]["id"].as_i64().unwrap());
    }
    let admin = app.admin_token().await;

    let resp = app
        .post_json("/api/v1/contacts/bulk/", &admin, &json!({ "ids": ids, "action": "set_high_priority" }))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["updated"], 2);

    let list: Value = app.get("/api/v1/contacts/?oncelik=yuksek", &admin).await.json().await.unwrap();
    assert_eq!(list["count"], 2);

    let resp = app
        .post_json("/api/v1/contacts/bulk/", &admin, &json!({ "ids": ids, "action": "delete_all" }))
        .await;
    assert_eq!(resp.status(), 400);

    let csv = app.get("/api/v1/contacts/export/", &admin).await.text().await.unwrap();
    assert!(csv.contains("Birinci"));
    assert!(csv.contains("Yüksek"));
}
