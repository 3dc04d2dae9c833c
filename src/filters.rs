//! Query-string filters compiled to SQL `WHERE` fragments with bound parameters,
//! plus ordering and page-number pagination shared by the list endpoints.

use std::collections::HashMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use serde::Serialize;

use crate::choices::{CargoStatus, CargoType, City, ContactCategory, ContactPriority, ContactStatus, VolunteerRole};
use crate::error::FieldErrors;

pub type Params = HashMap<String, String>;

static SENDER_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s@.-]").expect("static regex"));
static VOLUNTEER_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("static regex"));

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Conjunction of conditions, each with its own positional parameters.
#[derive(Debug, Default, Clone)]
pub struct SqlWhere {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl SqlWhere {
    pub fn push(&mut self, condition: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.conditions.push(condition.into());
        self.params.extend(params);
    }

    /// ` WHERE a AND b`, or an empty string when unfiltered.
    pub fn clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// `%value%` with LIKE metacharacters escaped. Pair with `ESCAPE '\'`.
pub fn like_pattern(value: &str) -> Value {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    Value::Text(escaped)
}

fn like_any(columns: &[&str], value: &str) -> (String, Vec<Value>) {
    let condition = columns
        .iter()
        .map(|c| format!("{c} LIKE ? ESCAPE '\\'"))
        .collect::<Vec<_>>()
        .join(" OR ");
    (format!("({condition})"), columns.iter().map(|_| like_pattern(value)).collect())
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| chrono::DateTime::parse_from_rfc3339(value).ok().map(|d| d.date_naive()))
}

fn non_empty<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Exact and `__in` filters on a choice column, validated against its codes.
fn choice_filter(
    filter: &mut SqlWhere,
    errors: &mut FieldErrors,
    params: &Params,
    column: &str,
    valid: impl Fn(&str) -> bool,
) {
    if let Some(value) = non_empty(params, column) {
        if valid(value) {
            filter.push(format!("{column} = ?"), [Value::Text(value.to_string())]);
        } else {
            errors.add(column, format!("Geçersiz seçim: {value}"));
        }
    }
    let key = format!("{column}__in");
    if let Some(list) = non_empty(params, &key) {
        let values: Vec<&str> = list.split(',').map(str::trim).filter(|v| !v.is_empty()).collect();
        if let Some(bad) = values.iter().find(|v| !valid(v)) {
            errors.add(&key, format!("Geçersiz seçim: {bad}"));
        } else if !values.is_empty() {
            let marks = vec!["?"; values.len()].join(", ");
            filter.push(
                format!("{column} IN ({marks})"),
                values.into_iter().map(|v| Value::Text(v.to_string())),
            );
        }
    }
}

fn number_filter(
    filter: &mut SqlWhere,
    errors: &mut FieldErrors,
    params: &Params,
    key: &str,
    sql: &str,
) {
    if let Some(raw) = non_empty(params, key) {
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => filter.push(sql, [Value::Real(n)]),
            _ => errors.add(key, "Geçerli bir sayı girin."),
        }
    }
}

fn date_filter(filter: &mut SqlWhere, errors: &mut FieldErrors, params: &Params, key: &str, sql: &str) {
    if let Some(raw) = non_empty(params, key) {
        match parse_date(raw) {
            Some(d) => filter.push(sql, [Value::Text(d.format("%Y-%m-%d").to_string())]),
            None => errors.add(key, "Geçerli bir tarih girin (YYYY-MM-DD)."),
        }
    }
}

fn bool_filter(filter: &mut SqlWhere, errors: &mut FieldErrors, params: &Params, key: &str, column: &str) {
    if let Some(raw) = non_empty(params, key) {
        match parse_bool(raw) {
            Some(b) => filter.push(format!("{column} = ?"), [Value::Integer(b as i64)]),
            None => errors.add(key, "Geçerli bir mantıksal değer girin."),
        }
    }
}

/// Volunteers assigned to the current `kargo` row, in any slot.
const ASSIGNED_VOLUNTEERS: &str = "SELECT 1 FROM volunteers v WHERE v.id IN \
     (kargo.toplama_gonullusu_id, kargo.tasima_gonullusu_id, kargo.dagitim_gonullusu_id)";

/// Builds the cargo list filter. Statistics endpoints reuse it unchanged.
pub fn cargo_filter(params: &Params) -> Result<SqlWhere, FieldErrors> {
    let mut filter = SqlWhere::default();
    let mut errors = FieldErrors::new();

    choice_filter(&mut filter, &mut errors, params, "durum", |v| CargoStatus::parse(v).is_some());
    choice_filter(&mut filter, &mut errors, params, "kargo_tipi", |v| CargoType::parse(v).is_some());
    choice_filter(&mut filter, &mut errors, params, "cikis_yeri", |v| City::parse(v).is_some());
    choice_filter(&mut filter, &mut errors, params, "ulasacagi_yer", |v| City::parse(v).is_some());
    bool_filter(&mut filter, &mut errors, params, "anonim_gonderici", "anonim_gonderici");

    for column in ["agirlik", "hacim"] {
        number_filter(&mut filter, &mut errors, params, column, &format!("round({column}, 2) = round(?, 2)"));
        for (suffix, op) in [("__gte", ">="), ("_min", ">="), ("__lte", "<="), ("_max", "<=")] {
            let key = format!("{column}{suffix}");
            number_filter(&mut filter, &mut errors, params, &key, &format!("{column} {op} ?"));
        }
    }
    number_filter(&mut filter, &mut errors, params, "miktar", "miktar = ?");
    number_filter(&mut filter, &mut errors, params, "miktar__gte", "miktar >= ?");
    number_filter(&mut filter, &mut errors, params, "miktar__lte", "miktar <= ?");

    date_filter(&mut filter, &mut errors, params, "olusturulma_tarihi", "date(olusturulma_tarihi) = ?");
    for key in ["olusturulma_tarihi__gte", "olusturulma_tarihi_start"] {
        date_filter(&mut filter, &mut errors, params, key, "date(olusturulma_tarihi) >= ?");
    }
    for key in ["olusturulma_tarihi__lte", "olusturulma_tarihi_end"] {
        date_filter(&mut filter, &mut errors, params, key, "date(olusturulma_tarihi) <= ?");
    }

    if let Some(term) = non_empty(params, "search") {
        let (own, mut own_params) = like_any(
            &["kargo_no", "gonderici_ad", "gonderici_soyad", "gonderici_telefon", "gonderici_email", "icerik", "ozel_not"],
            term,
        );
        let (volunteer, volunteer_params) = like_any(&["v.ad", "v.soyad", "v.gonulluluk_no"], term);
        own_params.extend(volunteer_params);
        filter.push(format!("({own} OR EXISTS ({ASSIGNED_VOLUNTEERS} AND {volunteer}))"), own_params);
    }

    if let Some(term) = sender_search_term(params.get("gonderici_search").map(String::as_str)) {
        let (condition, values) = like_any(
            &["gonderici_ad", "gonderici_soyad", "gonderici_telefon", "gonderici_email"],
            &term,
        );
        filter.push(condition, values);
    }

    match volunteer_search_term(params.get("gonullu_search").map(String::as_str)) {
        Some(VolunteerSearch::Code(code)) => {
            let (condition, values) = like_any(&["v.gonulluluk_no"], &code);
            filter.push(format!("EXISTS ({ASSIGNED_VOLUNTEERS} AND {condition})"), values);
        }
        Some(VolunteerSearch::Text(text)) => {
            let (condition, values) = like_any(&["v.ad", "v.soyad", "v.gonulluluk_no"], &text);
            filter.push(format!("EXISTS ({ASSIGNED_VOLUNTEERS} AND {condition})"), values);
        }
        None => {}
    }

    match parse_route(params.get("rota").map(String::as_str)) {
        Some(Route::Either(city)) => {
            let (condition, values) = like_any(&["cikis_yeri", "ulasacagi_yer"], &city);
            filter.push(condition, values);
        }
        Some(Route::Between { origin, destination }) => {
            if let Some(origin) = origin {
                filter.push("cikis_yeri LIKE ? ESCAPE '\\'", [like_pattern(&origin)]);
            }
            if let Some(destination) = destination {
                filter.push("ulasacagi_yer LIKE ? ESCAPE '\\'", [like_pattern(&destination)]);
            }
        }
        None => {}
    }

    if let Some(raw) = non_empty(params, "aktif_gonullu") {
        match parse_bool(raw) {
            Some(true) => filter.push(format!("EXISTS ({ASSIGNED_VOLUNTEERS} AND v.is_active = 1)"), Vec::new()),
            Some(false) => filter.push(
                "toplama_gonullusu_id IS NULL AND tasima_gonullusu_id IS NULL AND dagitim_gonullusu_id IS NULL",
                Vec::new(),
            ),
            None => errors.add("aktif_gonullu", "Geçerli bir mantıksal değer girin."),
        }
    }

    if errors.is_empty() {
        Ok(filter)
    } else {
        Err(errors)
    }
}

/// Sender search text, or `None` when it should be ignored.
pub fn sender_search_term(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.chars().count() < 2 {
        return None;
    }
    let cleaned = SENDER_STRIP.replace_all(value, "").to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

#[derive(Debug, PartialEq, Eq)]
pub enum VolunteerSearch {
    /// Matches membership codes only.
    Code(String),
    Text(String),
}

pub fn volunteer_search_term(raw: Option<&str>) -> Option<VolunteerSearch> {
    let value = raw?.trim();
    if value.chars().count() < 2 {
        return None;
    }
    if value.starts_with(['G', 'g']) && value.chars().count() >= 3 {
        return Some(VolunteerSearch::Code(value.to_string()));
    }
    let cleaned = VOLUNTEER_STRIP.replace_all(value, "").to_string();
    (!cleaned.is_empty()).then_some(VolunteerSearch::Text(cleaned))
}

#[derive(Debug, PartialEq, Eq)]
pub enum Route {
    Either(String),
    Between { origin: Option<String>, destination: Option<String> },
}

/// Parses `origin-destination`. A lone city matches either end.
pub fn parse_route(raw: Option<&str>) -> Option<Route> {
    let value = raw?;
    if !value.contains('-') {
        let city = value.trim().to_lowercase();
        return (!city.is_empty()).then_some(Route::Either(city));
    }
    let parts: Vec<&str> = value.split('-').collect();
    if parts.len() != 2 {
        return None;
    }
    let side = |s: &str| Some(s.trim().to_lowercase()).filter(|s| !s.is_empty());
    match (side(parts[0]), side(parts[1])) {
        (None, None) => None,
        (origin, destination) => Some(Route::Between { origin, destination }),
    }
}

pub fn volunteer_filter(params: &Params) -> Result<SqlWhere, FieldErrors> {
    let mut filter = SqlWhere::default();
    let mut errors = FieldErrors::new();

    if let Some(term) = non_empty(params, "search") {
        let (condition, values) = like_any(&["ad", "soyad", "gonulluluk_no", "telefon"], term);
        filter.push(condition, values);
    }
    choice_filter(&mut filter, &mut errors, params, "gonullu_tipi", |v| VolunteerRole::parse(v).is_some());
    choice_filter(&mut filter, &mut errors, params, "sehir", |v| City::parse(v).is_some());
    bool_filter(&mut filter, &mut errors, params, "is_active", "is_active");
    if let Some(code) = non_empty(params, "gonulluluk_no") {
        filter.push("gonulluluk_no = ?", [Value::Text(code.to_uppercase())]);
    }

    if errors.is_empty() {
        Ok(filter)
    } else {
        Err(errors)
    }
}

pub fn contact_filter(params: &Params) -> Result<SqlWhere, FieldErrors> {
    let mut filter = SqlWhere::default();
    let mut errors = FieldErrors::new();

    choice_filter(&mut filter, &mut errors, params, "durum", |v| ContactStatus::parse(v).is_some());
    choice_filter(&mut filter, &mut errors, params, "oncelik", |v| ContactPriority::parse(v).is_some());
    choice_filter(&mut filter, &mut errors, params, "kategori", |v| ContactCategory::parse(v).is_some());
    bool_filter(&mut filter, &mut errors, params, "kvkk_onayi", "kvkk_onayi");
    if let Some(city) = non_empty(params, "sehir") {
        filter.push("sehir = ?", [Value::Text(city.to_string())]);
    }
    if let Some(term) = non_empty(params, "search") {
        let (condition, values) =
            like_any(&["ad", "soyad", "email", "telefon", "konu", "mesaj", "sehir"], term);
        filter.push(condition, values);
    }

    if errors.is_empty() {
        Ok(filter)
    } else {
        Err(errors)
    }
}

/// Allow-listed sort column from the `ordering` parameter, `-` meaning descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    field: String,
    desc: bool,
}

impl Ordering {
    /// Falls back to `default` when the requested field is not allowed.
    pub fn resolve(params: &Params, allowed: &[&str], default: &str) -> Self {
        let requested = non_empty(params, "ordering").unwrap_or(default);
        let (desc, field) = match requested.strip_prefix('-') {
            Some(field) => (true, field),
            None => (false, requested),
        };
        if allowed.contains(&field) {
            Ordering { field: field.to_string(), desc }
        } else {
            Ordering {
                field: default.trim_start_matches('-').to_string(),
                desc: default.starts_with('-'),
            }
        }
    }

    /// ` ORDER BY <field> <dir>, id <dir>`, columns prefixed with `alias.` when given.
    pub fn sql(&self, alias: Option<&str>) -> String {
        let dir = if self.desc { "DESC" } else { "ASC" };
        let prefix = alias.map(|a| format!("{a}.")).unwrap_or_default();
        format!(" ORDER BY {prefix}{} {dir}, {prefix}id {dir}", self.field)
    }
}

pub const CARGO_ORDERING: &[&str] = &[
    "olusturulma_tarihi",
    "son_degisiklik",
    "kargo_no",
    "durum",
    "kargo_tipi",
    "cikis_yeri",
    "ulasacagi_yer",
    "agirlik",
    "hacim",
    "miktar",
];

pub const VOLUNTEER_ORDERING: &[&str] = &[
    "created_at",
    "updated_at",
    "ad",
    "soyad",
    "gonulluluk_no",
    "sehir",
    "gonullu_tipi",
    "is_active",
];

pub const CONTACT_ORDERING: &[&str] = &["olusturulma_tarihi", "son_degisiklik", "durum", "oncelik", "kategori"];

/// A resolved page, clamped into the available range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
    pub total_pages: u32,
}

impl Page {
    pub fn resolve(params: &Params, count: u64) -> Page {
        let size = params
            .get("page_size")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .map(|n| n.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let total_pages = (count.div_ceil(size as u64)).max(1) as u32;
        let requested = params
            .get("page")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(1);
        let number = requested.clamp(1, total_pages as i64) as u32;
        Page { number, size, total_pages }
    }

    pub fn offset(&self) -> i64 {
        (self.number as i64 - 1) * self.size as i64
    }

    pub fn limit(&self) -> i64 {
        self.size as i64
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T: Serialize> Paginated<T> {
    /// Wraps one page of results with links relative to `path`.
    pub fn new(path: &str, params: &Params, page: Page, count: u64, results: Vec<T>) -> Self {
        let link = |number: u32| {
            let mut keys: Vec<&String> = params.keys().filter(|k| k.as_str() != "page").collect();
            keys.sort();
            let mut query = url::form_urlencoded::Serializer::new(String::new());
            for key in keys {
                query.append_pair(key, &params[key]);
            }
            query.append_pair("page", &number.to_string());
            format!("{path}?{}", query.finish())
        };
        Paginated {
            count,
            next: (page.number < page.total_pages).then(|| link(page.number + 1)),
            previous: (page.number > 1).then(|| link(page.number - 1)),
            results,
        }
    }
}
