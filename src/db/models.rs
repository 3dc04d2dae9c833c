use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::choices::{CargoStatus, CargoType, ContactCategory, ContactPriority, ContactStatus, VolunteerRole};

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub password_changed_at: DateTime<Utc>,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub const COLUMNS: &'static str = "id, username, email, password_hash, first_name, last_name, \
        is_active, is_staff, is_superuser, password_changed_at, date_joined";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            is_active: row.get("is_active")?,
            is_staff: row.get("is_staff")?,
            is_superuser: row.get("is_superuser")?,
            password_changed_at: row.get("password_changed_at")?,
            date_joined: row.get("date_joined")?,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Volunteer {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    #[serde(rename = "gonulluluk_no")]
    pub code: String,
    #[serde(rename = "ad")]
    pub first_name: String,
    #[serde(rename = "soyad")]
    pub last_name: String,
    #[serde(rename = "telefon")]
    pub phone: String,
    #[serde(rename = "sehir")]
    pub city: String,
    #[serde(rename = "gonullu_tipi")]
    pub role: VolunteerRole,
    pub is_active: bool,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Volunteer {
    /// Selected from `volunteers v JOIN users u`.
    pub const COLUMNS: &'static str = "v.id, v.user_id, v.gonulluluk_no, v.ad, v.soyad, v.telefon, \
        v.sehir, v.gonullu_tipi, v.is_active, u.email, v.created_at, v.updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            code: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            phone: row.get(5)?,
            city: row.get(6)?,
            role: row.get(7)?,
            is_active: row.get(8)?,
            email: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct Cargo {
    pub id: i64,
    pub code: String,
    pub anonymous: bool,
    pub sender_first_name: Option<String>,
    pub sender_last_name: Option<String>,
    pub sender_phone: Option<String>,
    pub sender_email: Option<String>,
    pub origin: String,
    pub destination: String,
    pub weight: f64,
    pub volume: f64,
    pub quantity: i64,
    pub status: CargoStatus,
    pub kind: CargoType,
    pub content: String,
    pub collector_id: i64,
    pub transporter_id: Option<i64>,
    pub distributor_id: Option<i64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cargo {
    pub const COLUMNS: &'static str = "id, kargo_no, anonim_gonderici, gonderici_ad, gonderici_soyad, \
        gonderici_telefon, gonderici_email, cikis_yeri, ulasacagi_yer, agirlik, hacim, miktar, durum, \
        kargo_tipi, icerik, toplama_gonullusu_id, tasima_gonullusu_id, dagitim_gonullusu_id, ozel_not, \
        olusturulma_tarihi, son_degisiklik";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            code: row.get("kargo_no")?,
            anonymous: row.get("anonim_gonderici")?,
            sender_first_name: row.get("gonderici_ad")?,
            sender_last_name: row.get("gonderici_soyad")?,
            sender_phone: row.get("gonderici_telefon")?,
            sender_email: row.get("gonderici_email")?,
            origin: row.get("cikis_yeri")?,
            destination: row.get("ulasacagi_yer")?,
            weight: row.get("agirlik")?,
            volume: row.get("hacim")?,
            quantity: row.get("miktar")?,
            status: row.get("durum")?,
            kind: row.get("kargo_tipi")?,
            content: row.get("icerik")?,
            collector_id: row.get("toplama_gonullusu_id")?,
            transporter_id: row.get("tasima_gonullusu_id")?,
            distributor_id: row.get("dagitim_gonullusu_id")?,
            note: row.get("ozel_not")?,
            created_at: row.get("olusturulma_tarihi")?,
            updated_at: row.get("son_degisiklik")?,
        })
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ContactMessage {
    pub id: i64,
    #[serde(rename = "ad")]
    pub first_name: String,
    #[serde(rename = "soyad")]
    pub last_name: String,
    #[serde(rename = "telefon")]
    pub phone: String,
    pub email: String,
    #[serde(rename = "sehir")]
    pub city: String,
    #[serde(rename = "kategori")]
    pub category: ContactCategory,
    #[serde(rename = "konu")]
    pub subject: String,
    #[serde(rename = "mesaj")]
    pub message: String,
    #[serde(rename = "dosya")]
    pub attachment_key: Option<String>,
    #[serde(rename = "dosya_adi")]
    pub attachment_name: Option<String>,
    #[serde(rename = "dosya_boyutu")]
    pub attachment_size: Option<i64>,
    #[serde(rename = "kvkk_onayi")]
    pub consent: bool,
    #[serde(rename = "durum")]
    pub status: ContactStatus,
    #[serde(rename = "oncelik")]
    pub priority: ContactPriority,
    #[serde(rename = "admin_notu")]
    pub admin_note: Option<String>,
    #[serde(rename = "cevaplayan_admin")]
    pub answered_by: Option<String>,
    #[serde(rename = "cevap_tarihi")]
    pub answered_at: Option<DateTime<Utc>>,
    #[serde(rename = "ip_adresi")]
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[serde(rename = "olusturulma_tarihi")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "son_degisiklik")]
    pub updated_at: DateTime<Utc>,
}

impl ContactMessage {
    pub const COLUMNS: &'static str = "id, ad, soyad, telefon, email, sehir, kategori, konu, mesaj, dosya, \
        dosya_adi, dosya_boyutu, kvkk_onayi, durum, oncelik, admin_notu, cevaplayan_admin, cevap_tarihi, \
        ip_adresi, user_agent, olusturulma_tarihi, son_degisiklik";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            first_name: row.get("ad")?,
            last_name: row.get("soyad")?,
            phone: row.get("telefon")?,
            email: row.get("email")?,
            city: row.get("sehir")?,
            category: row.get("kategori")?,
            subject: row.get("konu")?,
            message: row.get("mesaj")?,
            attachment_key: row.get("dosya")?,
            attachment_name: row.get("dosya_adi")?,
            attachment_size: row.get("dosya_boyutu")?,
            consent: row.get("kvkk_onayi")?,
            status: row.get("durum")?,
            priority: row.get("oncelik")?,
            admin_note: row.get("admin_notu")?,
            answered_by: row.get("cevaplayan_admin")?,
            answered_at: row.get("cevap_tarihi")?,
            ip_address: row.get("ip_adresi")?,
            user_agent: row.get("user_agent")?,
            created_at: row.get("olusturulma_tarihi")?,
            updated_at: row.get("son_degisiklik")?,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuditLog {
    pub id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<String>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A cargo row with its assigned volunteers resolved.
#[derive(Debug, Clone)]
pub struct CargoRecord {
    pub cargo: Cargo,
    pub collector: Option<Volunteer>,
    pub transporter: Option<Volunteer>,
    pub distributor: Option<Volunteer>,
}
