#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use ayika::config::{Config, StorageSettings};
use ayika::db::{self, DbPool};
use ayika::mail::{Mailer, OutgoingMail};
use ayika::{auth, build_router, storage, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const ADMIN_EMAIL: &str = "admin@ayika.org";
pub const ADMIN_PASSWORD: &str = "Yonetici1!";
pub const VOLUNTEER_PASSWORD: &str = "Gonullu12!";

pub struct TestApp {
    pub base: String,
    pub client: reqwest::Client,
    pub pool: DbPool,
    pub outbox: Arc<Mutex<Vec<OutgoingMail>>>,
    _dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("ayika-test.db");
    let config = Config::local(db_path.to_string_lossy().to_string(), "integration-test-secret");

    let pool = db::init_pool(&config.database_path, 4).await.expect("init pool");
    db::migrate(&pool).await.expect("migrate");

    let hash = auth::hash_password(ADMIN_PASSWORD).expect("hash");
    db::users::upsert_admin(&pool, "admin".into(), ADMIN_EMAIL.into(), hash)
        .await
        .expect("seed admin");

    let (mailer, outbox) = Mailer::outbox("noreply@ayika.org");
    let state = AppState {
        db: pool.clone(),
        storage: storage::build_operator(&StorageSettings::Memory).expect("memory storage"),
        config: Arc::new(config),
        mailer,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .expect("server");
    });

    TestApp {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
        pool,
        outbox,
        _dir: dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Logs in and returns the session token from the `auth_token` cookie.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/v1/volunteers/auth/login/"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request");
        assert_eq!(resp.status(), 200, "login failed for {email}");
        let cookie = resp
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("auth_token="))
            .expect("auth cookie")
            .to_string();
        cookie
            .trim_start_matches("auth_token=")
            .split(';')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Self-registers a volunteer and returns the created record.
    pub async fn register_volunteer(&self, email: &str, phone: &str, role: &str, city: &str) -> Value {
        self.register_named_volunteer(("Deniz", "Kaya"), email, phone, role, city).await
    }

    pub async fn register_named_volunteer(
        &self,
        (first, last): (&str, &str),
        email: &str,
        phone: &str,
        role: &str,
        city: &str,
    ) -> Value {
        let resp = self
            .client
            .post(self.url("/api/v1/volunteers/register/"))
            .json(&json!({
                "ad": first,
                "soyad": last,
                "email": email,
                "telefon": phone,
                "sehir": city,
                "gonullu_tipi": role,
                "password": VOLUNTEER_PASSWORD,
                "password_confirm": VOLUNTEER_PASSWORD,
            }))
            .send()
            .await
            .expect("register request");
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.expect("json");
        body["volunteer"].clone()
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("GET")
    }

    pub async fn post_json(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("POST")
    }

    pub async fn patch_json(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("PATCH")
    }

    pub async fn put_json(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("PUT")
    }

    pub async fn audit_csv(&self, token: &str) -> String {
        self.get("/api/v1/audit/export/", token).await.text().await.expect("audit csv")
    }

    pub fn sent_mail(&self) -> Vec<OutgoingMail> {
        self.outbox.lock().expect("outbox").clone()
    }
}

/// A valid named-sender cargo from Istanbul to Hatay.
pub fn cargo_body(collector_id: i64) -> Value {
    json!({
        "anonim_gonderici": false,
        "gonderici_ad": "Ayşe",
        "gonderici_soyad": "Yılmaz",
        "gonderici_telefon": "5321234567",
        "gonderici_email": "ayse@example.com",
        "cikis_yeri": "istanbul",
        "ulasacagi_yer": "hatay",
        "agirlik": 12.5,
        "hacim": 0.4,
        "miktar": 3,
        "kargo_tipi": "gida",
        "icerik": "Kuru Gıda Paketi",
        "toplama_gonullusu": collector_id,
    })
}
