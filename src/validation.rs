//! Input rules for cargo, volunteers and contact messages.
//!
//! Every check runs and every violation is reported against its field, so a
//! client gets the whole picture from one round trip.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::choices::{CargoStatus, CargoType, City, ContactCategory, VolunteerRole};
use crate::error::FieldErrors;

static SENDER_PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^5\d{9}$").expect("static regex"));
static VOLUNTEER_PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9][0-9]{9}$").expect("static regex"));
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"));

const REQUIRED: &str = "Bu alan zorunludur.";
const BAD_CITY: &str = "Geçersiz şehir seçimi.";
const BAD_EMAIL: &str = "Geçerli bir e-posta adresi girin.";
const SENDER_PHONE_FORMAT: &str = "Telefon numarası 5XXXXXXXXX formatında olmalıdır.";

pub const MAX_CONTENT_CHARS: usize = 500;
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

/// Trimmed value, with blank strings treated as absent.
fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn check_len(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(field, format!("En fazla {max} karakter olabilir."));
    }
}

fn has_two_decimals(value: f64) -> bool {
    let scaled = value * 100.0;
    (scaled - scaled.round()).abs() < 1e-6
}

/// Cargo payload as the client sends it. Absent and `null` are both `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CargoInput {
    #[serde(default)]
    pub anonim_gonderici: Option<bool>,
    #[serde(default)]
    pub gonderici_ad: Option<String>,
    #[serde(default)]
    pub gonderici_soyad: Option<String>,
    #[serde(default)]
    pub gonderici_telefon: Option<String>,
    #[serde(default)]
    pub gonderici_email: Option<String>,
    #[serde(default)]
    pub cikis_yeri: Option<String>,
    #[serde(default)]
    pub ulasacagi_yer: Option<String>,
    #[serde(default)]
    pub agirlik: Option<f64>,
    #[serde(default)]
    pub hacim: Option<f64>,
    #[serde(default)]
    pub miktar: Option<i64>,
    #[serde(default)]
    pub durum: Option<String>,
    #[serde(default)]
    pub kargo_tipi: Option<String>,
    #[serde(default)]
    pub icerik: Option<String>,
    #[serde(default)]
    pub toplama_gonullusu: Option<i64>,
    #[serde(default)]
    pub tasima_gonullusu: Option<i64>,
    #[serde(default)]
    pub dagitim_gonullusu: Option<i64>,
    #[serde(default)]
    pub ozel_not: Option<String>,
}

/// A cargo record that passed every rule, sender fields already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct CargoDraft {
    pub anonymous: bool,
    pub sender_first_name: Option<String>,
    pub sender_last_name: Option<String>,
    pub sender_phone: Option<String>,
    pub sender_email: Option<String>,
    pub origin: City,
    pub destination: City,
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
}

/// What the assignment rules need to know about a referenced volunteer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolunteerRef {
    pub role: VolunteerRole,
    pub is_active: bool,
}

struct Slot {
    field: &'static str,
    role: VolunteerRole,
    wrong_role: &'static str,
    inactive: &'static str,
}

const COLLECTION: Slot = Slot {
    field: "toplama_gonullusu",
    role: VolunteerRole::Collection,
    wrong_role: "Toplama gönüllüsü sadece \"toplama\" veya \"karma\" tipli olabilir.",
    inactive: "Seçilen toplama gönüllüsü aktif değil.",
};
const TRANSPORT: Slot = Slot {
    field: "tasima_gonullusu",
    role: VolunteerRole::Transport,
    wrong_role: "Taşıma gönüllüsü sadece \"tasima\" veya \"karma\" tipli olabilir.",
    inactive: "Seçilen taşıma gönüllüsü aktif değil.",
};
const DISTRIBUTION: Slot = Slot {
    field: "dagitim_gonullusu",
    role: VolunteerRole::Distribution,
    wrong_role: "Dağıtım gönüllüsü sadece \"dagitim\" veya \"karma\" tipli olabilir.",
    inactive: "Seçilen dağıtım gönüllüsü aktif değil.",
};

fn check_assignment<F>(errors: &mut FieldErrors, slot: &Slot, id: Option<i64>, lookup: &F)
where
    F: Fn(i64) -> Option<VolunteerRef>,
{
    let Some(id) = id else { return };
    match lookup(id) {
        None => errors.add(slot.field, "Seçilen gönüllü bulunamadı."),
        Some(v) => {
            if !v.role.can_fill(slot.role) {
                errors.add(slot.field, slot.wrong_role);
            }
            if !v.is_active {
                errors.add(slot.field, slot.inactive);
            }
        }
    }
}

fn parse_city(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> Option<City> {
    match clean(value) {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(code) => {
            let city = City::parse(&code);
            if city.is_none() {
                errors.add(field, BAD_CITY);
            }
            city
        }
    }
}

fn parse_measure(errors: &mut FieldErrors, field: &str, value: Option<f64>, too_small: &str) -> Option<f64> {
    match value {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(v) if !v.is_finite() || v < 0.01 => {
            errors.add(field, too_small);
            None
        }
        Some(v) if !has_two_decimals(v) => {
            errors.add(field, "En fazla 2 ondalık basamak girilebilir.");
            None
        }
        Some(v) => Some(v),
    }
}

/// Runs every cargo rule. `lookup` resolves volunteer ids against storage.
pub fn validate_cargo<F>(input: &CargoInput, lookup: F) -> Result<CargoDraft, FieldErrors>
where
    F: Fn(i64) -> Option<VolunteerRef>,
{
    let mut errors = FieldErrors::new();
    let anonymous = input.anonim_gonderici.unwrap_or(false);

    let (mut first, mut last, mut phone, mut email) = (
        clean(&input.gonderici_ad),
        clean(&input.gonderici_soyad),
        clean(&input.gonderici_telefon),
        clean(&input.gonderici_email),
    );

    if anonymous {
        first = None;
        last = None;
        phone = None;
        email = None;
    } else {
        for (field, value, label) in [
            ("gonderici_ad", &first, "gönderici adı"),
            ("gonderici_soyad", &last, "gönderici soyadı"),
            ("gonderici_telefon", &phone, "gönderici telefonu"),
        ] {
            if value.is_none() {
                errors.add(field, format!("Anonim olmayan gönderici için {label} zorunludur."));
            }
        }
        if let Some(v) = &first {
            check_len(&mut errors, "gonderici_ad", v, 50);
        }
        if let Some(v) = &last {
            check_len(&mut errors, "gonderici_soyad", v, 50);
        }
        if let Some(p) = &phone {
            if !SENDER_PHONE.is_match(p) {
                errors.add("gonderici_telefon", SENDER_PHONE_FORMAT);
            }
        }
        if let Some(e) = &email {
            if !is_valid_email(e) {
                errors.add("gonderici_email", BAD_EMAIL);
            }
        }
    }

    let origin = parse_city(&mut errors, "cikis_yeri", &input.cikis_yeri);
    let destination = parse_city(&mut errors, "ulasacagi_yer", &input.ulasacagi_yer);
    if let (Some(o), Some(d)) = (origin, destination) {
        if o == d {
            errors.add("ulasacagi_yer", "Çıkış yeri ve ulaşacağı yer aynı olamaz.");
        }
    }

    let weight = parse_measure(&mut errors, "agirlik", input.agirlik, "Ağırlık en az 0.01 kg olmalıdır.");
    let volume = parse_measure(&mut errors, "hacim", input.hacim, "Hacim en az 0.01 m³ olmalıdır.");
    let quantity = match input.miktar {
        None => {
            errors.add("miktar", REQUIRED);
            None
        }
        Some(n) if n < 1 => {
            errors.add("miktar", "Miktar en az 1 olmalıdır.");
            None
        }
        Some(n) => Some(n),
    };

    let status = match input.durum.as_deref().map(str::trim) {
        None | Some("") => Some(CargoStatus::Preparing),
        Some(code) => {
            let status = CargoStatus::parse(code);
            if status.is_none() {
                errors.add("durum", "Geçersiz durum seçimi.");
            }
            status
        }
    };

    let kind = match clean(&input.kargo_tipi) {
        None => {
            errors.add("kargo_tipi", REQUIRED);
            None
        }
        Some(code) => {
            let kind = CargoType::parse(&code);
            if kind.is_none() {
                errors.add("kargo_tipi", "Geçersiz kargo tipi.");
            }
            kind
        }
    };

    let content = match input.icerik.as_deref().map(str::trim) {
        None => {
            errors.add("icerik", REQUIRED);
            None
        }
        Some("") => {
            errors.add("icerik", "İçerik boş olamaz.");
            None
        }
        Some(text) if text.chars().count() > MAX_CONTENT_CHARS => {
            errors.add("icerik", "İçerik açıklaması 500 karakterden uzun olamaz.");
            None
        }
        Some(text) => Some(text.to_string()),
    };

    if input.toplama_gonullusu.is_none() {
        errors.add("toplama_gonullusu", "Toplama gönüllüsü seçilmelidir.");
    }
    check_assignment(&mut errors, &COLLECTION, input.toplama_gonullusu, &lookup);
    check_assignment(&mut errors, &TRANSPORT, input.tasima_gonullusu, &lookup);
    check_assignment(&mut errors, &DISTRIBUTION, input.dagitim_gonullusu, &lookup);

    match (origin, destination, weight, volume, quantity, status, kind, content, input.toplama_gonullusu) {
        (
            Some(origin),
            Some(destination),
            Some(weight),
            Some(volume),
            Some(quantity),
            Some(status),
            Some(kind),
            Some(content),
            Some(collector_id),
        ) if errors.is_empty() => Ok(CargoDraft {
            anonymous,
            sender_first_name: first,
            sender_last_name: last,
            sender_phone: phone,
            sender_email: email,
            origin,
            destination,
            weight,
            volume,
            quantity,
            status,
            kind,
            content,
            collector_id,
            transporter_id: input.tasima_gonullusu,
            distributor_id: input.dagitim_gonullusu,
            note: clean(&input.ozel_not),
        }),
        _ => Err(errors),
    }
}

/// Password rules shared by registration, password change and reset.
pub fn password_problems(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < 8 {
        problems.push("Şifre en az 8 karakter olmalıdır.");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push("Şifre en az bir küçük harf içermelidir.");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("Şifre en az bir büyük harf içermelidir.");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Şifre en az bir rakam içermelidir.");
    }
    if !password.chars().any(|c| "@$!%*?&".contains(c)) {
        problems.push("Şifre en az bir özel işaret (@$!%*?&) içermelidir.");
    }
    problems
}

pub fn check_password(errors: &mut FieldErrors, field: &str, password: &str) {
    for problem in password_problems(password) {
        errors.add(field, problem);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolunteerRegistration {
    #[serde(default)]
    pub ad: Option<String>,
    #[serde(default)]
    pub soyad: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telefon: Option<String>,
    #[serde(default)]
    pub sehir: Option<String>,
    #[serde(default)]
    pub gonullu_tipi: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_confirm: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewVolunteer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub city: City,
    pub role: VolunteerRole,
    pub password: String,
    pub is_active: bool,
}

/// Format rules only; email uniqueness is checked against storage by the caller.
pub fn validate_registration(input: &VolunteerRegistration) -> Result<NewVolunteer, FieldErrors> {
    let mut errors = FieldErrors::new();

    let mut required = |field: &str, value: &Option<String>, max: usize| {
        let value = clean(value);
        match &value {
            None => errors.add(field, REQUIRED),
            Some(v) => check_len(&mut errors, field, v, max),
        }
        value
    };
    let first_name = required("ad", &input.ad, 50);
    let last_name = required("soyad", &input.soyad, 50);
    let email = required("email", &input.email, 254).map(|e| e.to_lowercase());
    let phone = required("telefon", &input.telefon, 10);

    if let Some(e) = &email {
        if !is_valid_email(e) {
            errors.add("email", BAD_EMAIL);
        }
    }
    if let Some(p) = &phone {
        if !VOLUNTEER_PHONE.is_match(p) {
            errors.add("telefon", "Telefon numarası 10 haneli olmalı ve 0 ile başlamamalı (5XXXXXXXXX)");
        }
    }

    let city = parse_city(&mut errors, "sehir", &input.sehir);
    let role = match clean(&input.gonullu_tipi) {
        None => {
            errors.add("gonullu_tipi", REQUIRED);
            None
        }
        Some(code) => {
            let role = VolunteerRole::parse(&code);
            if role.is_none() {
                errors.add("gonullu_tipi", "Geçersiz gönüllü tipi.");
            }
            role
        }
    };

    let password = input.password.clone().unwrap_or_default();
    if password.is_empty() {
        errors.add("password", REQUIRED);
    } else {
        check_password(&mut errors, "password", &password);
    }
    match input.password_confirm.as_deref() {
        None | Some("") => errors.add("password_confirm", REQUIRED),
        Some(confirm) if !password.is_empty() && confirm != password => {
            errors.add("password_confirm", "Şifreler eşleşmiyor.")
        }
        Some(_) => {}
    }

    match (first_name, last_name, email, phone, city, role) {
        (Some(first_name), Some(last_name), Some(email), Some(phone), Some(city), Some(role))
            if errors.is_empty() =>
        {
            Ok(NewVolunteer {
                first_name,
                last_name,
                email,
                phone,
                city,
                role,
                password,
                is_active: input.is_active.unwrap_or(true),
            })
        }
        _ => Err(errors),
    }
}

/// Text fields of the public contact form.
#[derive(Debug, Clone, Default)]
pub struct ContactInput {
    pub ad: Option<String>,
    pub soyad: Option<String>,
    pub telefon: Option<String>,
    pub email: Option<String>,
    pub sehir: Option<String>,
    pub kategori: Option<String>,
    pub konu: Option<String>,
    pub mesaj: Option<String>,
    pub kvkk_onayi: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ContactDraft {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub city: String,
    pub category: ContactCategory,
    pub subject: String,
    pub message: String,
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

pub fn validate_contact(input: &ContactInput, attachment_size: Option<usize>) -> Result<ContactDraft, FieldErrors> {
    let mut errors = FieldErrors::new();

    let mut required = |field: &str, value: &Option<String>, max: Option<usize>| {
        let value = clean(value);
        match (&value, max) {
            (None, _) => errors.add(field, REQUIRED),
            (Some(v), Some(max)) => check_len(&mut errors, field, v, max),
            _ => {}
        }
        value
    };
    let first_name = required("ad", &input.ad, Some(50));
    let last_name = required("soyad", &input.soyad, Some(50));
    let phone = required("telefon", &input.telefon, None);
    let email = required("email", &input.email, Some(254));
    let city = required("sehir", &input.sehir, Some(50));
    let subject = required("konu", &input.konu, Some(200));
    let message = required("mesaj", &input.mesaj, None);
    let category = required("kategori", &input.kategori, None);

    if let Some(p) = &phone {
        if !SENDER_PHONE.is_match(p) {
            errors.add("telefon", SENDER_PHONE_FORMAT);
        }
    }
    if let Some(e) = &email {
        if !is_valid_email(e) {
            errors.add("email", BAD_EMAIL);
        }
    }
    let category = category.and_then(|code| {
        let parsed = ContactCategory::parse(&code);
        if parsed.is_none() {
            errors.add("kategori", "Geçersiz kategori seçimi.");
        }
        parsed
    });
    if !input.kvkk_onayi.as_deref().map(truthy).unwrap_or(false) {
        errors.add("kvkk_onayi", "KVKK metnini onaylamanız gerekmektedir.");
    }
    if attachment_size.is_some_and(|size| size > MAX_ATTACHMENT_BYTES) {
        errors.add("dosya", "Dosya boyutu 10MB'dan büyük olamaz.");
    }

    match (first_name, last_name, phone, email, city, category, subject, message) {
        (Some(first_name), Some(last_name), Some(phone), Some(email), Some(city), Some(category), Some(subject), Some(message))
            if errors.is_empty() =>
        {
            Ok(ContactDraft {
                first_name,
                last_name,
                phone,
                email,
                city,
                category,
                subject,
                message,
            })
        }
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(role: VolunteerRole) -> Option<VolunteerRef> {
        Some(VolunteerRef { role, is_active: true })
    }

    fn named_cargo() -> CargoInput {
        CargoInput {
            anonim_gonderici: Some(false),
            gonderici_ad: Some("Ayşe".into()),
            gonderici_soyad: Some("Yılmaz".into()),
            gonderici_telefon: Some("5321234567".into()),
            cikis_yeri: Some("istanbul".into()),
            ulasacagi_yer: Some("hatay".into()),
            agirlik: Some(12.5),
            hacim: Some(0.4),
            miktar: Some(3),
            kargo_tipi: Some("gida".into()),
            icerik: Some("Kuru Gıda Paketi".into()),
            toplama_gonullusu: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_complete_named_cargo() {
        let draft = validate_cargo(&named_cargo(), |_| active(VolunteerRole::Collection)).unwrap();
        assert_eq!(draft.status, CargoStatus::Preparing);
        assert_eq!(draft.sender_phone.as_deref(), Some("5321234567"));
    }

    #[test]
    fn anonymous_sender_clears_identity() {
        let mut input = named_cargo();
        input.anonim_gonderici = Some(true);
        input.gonderici_email = Some("not-an-email".into());
        let draft = validate_cargo(&input, |_| active(VolunteerRole::Mixed)).unwrap();
        assert!(draft.sender_first_name.is_none());
        assert!(draft.sender_last_name.is_none());
        assert!(draft.sender_phone.is_none());
        assert!(draft.sender_email.is_none());
    }

    #[test]
    fn reports_every_violation() {
        let mut input = named_cargo();
        input.gonderici_ad = None;
        input.gonderici_telefon = Some("05321234567".into());
        input.ulasacagi_yer = Some("istanbul".into());
        input.miktar = Some(0);
        input.icerik = Some("   ".into());
        let errors = validate_cargo(&input, |_| active(VolunteerRole::Collection)).unwrap_err();
        for field in ["gonderici_ad", "gonderici_telefon", "ulasacagi_yer", "miktar", "icerik"] {
            assert!(errors.has(field), "missing error for {field}");
        }
    }

    #[test]
    fn role_and_activity_are_checked_per_slot() {
        let mut input = named_cargo();
        input.tasima_gonullusu = Some(2);
        input.dagitim_gonullusu = Some(3);
        let errors = validate_cargo(&input, |id| match id {
            1 => active(VolunteerRole::Distribution),
            2 => Some(VolunteerRef { role: VolunteerRole::Transport, is_active: false }),
            _ => None,
        })
        .unwrap_err();
        assert_eq!(
            errors.get("toplama_gonullusu").unwrap(),
            ["Toplama gönüllüsü sadece \"toplama\" veya \"karma\" tipli olabilir."]
        );
        assert_eq!(errors.get("tasima_gonullusu").unwrap(), ["Seçilen taşıma gönüllüsü aktif değil."]);
        assert!(errors.has("dagitim_gonullusu"));
    }

    #[test]
    fn collector_is_mandatory() {
        let mut input = named_cargo();
        input.toplama_gonullusu = None;
        let errors = validate_cargo(&input, |_| None).unwrap_err();
        assert_eq!(errors.get("toplama_gonullusu").unwrap(), ["Toplama gönüllüsü seçilmelidir."]);
    }

    #[test]
    fn measures_need_two_decimals_at_most() {
        let mut input = named_cargo();
        input.agirlik = Some(1.234);
        input.hacim = Some(0.001);
        let errors = validate_cargo(&input, |_| active(VolunteerRole::Collection)).unwrap_err();
        assert!(errors.has("agirlik"));
        assert!(errors.has("hacim"));
    }

    #[test]
    fn password_policy() {
        assert_eq!(password_problems("Secret1!").len(), 0);
        assert_eq!(password_problems("short").len(), 4);
        assert!(password_problems("alllowercase1!").contains(&"Şifre en az bir büyük harf içermelidir."));
    }

    #[test]
    fn registration_confirms_password_and_lowercases_email() {
        let mut input = VolunteerRegistration {
            ad: Some("Mehmet".into()),
            soyad: Some("Demir".into()),
            email: Some(" Mehmet@Example.com ".into()),
            telefon: Some("5551234567".into()),
            sehir: Some("ankara".into()),
            gonullu_tipi: Some("karma".into()),
            password: Some("Secret1!".into()),
            password_confirm: Some("Secret1!".into()),
            is_active: None,
        };
        let ok = validate_registration(&input).unwrap();
        assert_eq!(ok.email, "mehmet@example.com");
        assert!(ok.is_active);

        input.password_confirm = Some("Secret2!".into());
        input.telefon = Some("0551234567".into());
        let errors = validate_registration(&input).unwrap_err();
        assert_eq!(errors.get("password_confirm").unwrap(), ["Şifreler eşleşmiyor."]);
        assert!(errors.has("telefon"));
    }

    #[test]
    fn contact_requires_consent_and_small_attachment() {
        let input = ContactInput {
            ad: Some("Ali".into()),
            soyad: Some("Kaya".into()),
            telefon: Some("5001112233".into()),
            email: Some("ali@example.com".into()),
            sehir: Some("İzmir".into()),
            kategori: Some("yardim".into()),
            konu: Some("Battaniye".into()),
            mesaj: Some("Mahallemize battaniye lazım.".into()),
            kvkk_onayi: Some("false".into()),
        };
        let errors = validate_contact(&input, Some(MAX_ATTACHMENT_BYTES + 1)).unwrap_err();
        assert!(errors.has("kvkk_onayi"));
        assert!(errors.has("dosya"));

        let consenting = ContactInput { kvkk_onayi: Some("true".into()), ..input };
        assert!(validate_contact(&consenting, Some(1024)).is_ok());
    }
}
