//! Read-only dashboard aggregates. Empty sets yield zeros, never nulls.

use chrono::{DateTime, Datelike, Utc};
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection};
use serde_json::{json, Map, Value};

use super::{with_conn, DbPool};
use crate::choices::{city_display, round2, CargoStatus, CargoType, VolunteerRole};
use crate::filters::SqlWhere;

const TR_MONTHS: [&str; 12] = ["Oca", "Şub", "Mar", "Nis", "May", "Haz", "Tem", "Ağu", "Eyl", "Eki", "Kas", "Ara"];

fn percentage(count: i64, total: i64) -> f64 {
    if total > 0 {
        round2(count as f64 / total as f64 * 100.0)
    } else {
        0.0
    }
}

fn grouped_counts(conn: &Connection, column: &str, filter: &SqlWhere) -> anyhow::Result<Vec<(String, i64)>> {
    let sql = format!("SELECT {column}, COUNT(*) FROM kargo{} GROUP BY {column}", filter.clause());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params()), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn count_of(groups: &[(String, i64)], code: &str) -> i64 {
    groups.iter().find(|(c, _)| c == code).map(|(_, n)| *n).unwrap_or(0)
}

pub fn general(conn: &Connection, filter: &SqlWhere) -> anyhow::Result<Value> {
    let sql = format!(
        "SELECT COUNT(*), COALESCE(SUM(anonim_gonderici), 0) FROM kargo{}",
        filter.clause()
    );
    let (total, anonymous): (i64, i64) =
        conn.query_row(&sql, params_from_iter(filter.params()), |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut stats = Map::new();
    stats.insert("toplam_kargo".into(), json!(total));
    stats.insert("anonim_gonderici".into(), json!(anonymous));
    stats.insert("gonderici_bilgili".into(), json!(total - anonymous));

    let by_status = grouped_counts(conn, "durum", filter)?;
    for status in CargoStatus::ALL {
        let count = count_of(&by_status, status.as_str());
        stats.insert(
            format!("durum_{}", status.as_str()),
            json!({ "count": count, "percentage": percentage(count, total), "name": status.label() }),
        );
    }
    let by_type = grouped_counts(conn, "kargo_tipi", filter)?;
    for kind in CargoType::ALL {
        let count = count_of(&by_type, kind.as_str());
        stats.insert(
            format!("tip_{}", kind.as_str()),
            json!({ "count": count, "percentage": percentage(count, total), "name": kind.label() }),
        );
    }
    Ok(Value::Object(stats))
}

pub fn weight_volume(conn: &Connection, filter: &SqlWhere) -> anyhow::Result<Value> {
    let sql = format!(
        "SELECT COALESCE(SUM(agirlik), 0), COALESCE(AVG(agirlik), 0), COALESCE(MIN(agirlik), 0),
                COALESCE(MAX(agirlik), 0), COALESCE(SUM(hacim), 0), COALESCE(AVG(hacim), 0),
                COALESCE(MIN(hacim), 0), COALESCE(MAX(hacim), 0), COALESCE(SUM(miktar), 0),
                COALESCE(AVG(miktar), 0)
         FROM kargo{}",
        filter.clause()
    );
    conn.query_row(&sql, params_from_iter(filter.params()), |row| {
        let f = |i: usize| -> rusqlite::Result<f64> { Ok(round2(row.get::<_, f64>(i)?)) };
        Ok(json!({
            "toplam_agirlik": f(0)?,
            "ortalama_agirlik": f(1)?,
            "min_agirlik": f(2)?,
            "max_agirlik": f(3)?,
            "toplam_hacim": f(4)?,
            "ortalama_hacim": f(5)?,
            "min_hacim": f(6)?,
            "max_hacim": f(7)?,
            "toplam_miktar": row.get::<_, i64>(8)?,
            "ortalama_miktar": f(9)?,
        }))
    })
    .map_err(Into::into)
}

fn top_cities(conn: &Connection, column: &str, filter: &SqlWhere) -> anyhow::Result<Vec<Value>> {
    let sql = format!(
        "SELECT {column}, COUNT(*) AS n FROM kargo{} GROUP BY {column} ORDER BY n DESC, {column} ASC LIMIT 10",
        filter.clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params()), |row| {
            let code: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let mut item = Map::new();
            item.insert(column.to_string(), json!(code));
            item.insert("display_name".into(), json!(city_display(&code)));
            item.insert("count".into(), json!(count));
            Ok(Value::Object(item))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn cities(conn: &Connection, filter: &SqlWhere) -> anyhow::Result<Value> {
    Ok(json!({
        "top_origins": top_cities(conn, "cikis_yeri", filter)?,
        "top_destinations": top_cities(conn, "ulasacagi_yer", filter)?,
    }))
}

fn count_where(conn: &Connection, filter: &SqlWhere, extra: &str) -> anyhow::Result<i64> {
    let mut filter = filter.clone();
    filter.push(extra, Vec::new());
    let sql = format!("SELECT COUNT(*) FROM kargo{}", filter.clause());
    Ok(conn.query_row(&sql, params_from_iter(filter.params()), |row| row.get(0))?)
}

fn top_volunteers(conn: &Connection, filter: &SqlWhere, slot: &str) -> anyhow::Result<Vec<Value>> {
    let column = format!("{slot}_gonullusu_id");
    let mut filter = filter.clone();
    filter.push(format!("{column} IS NOT NULL"), Vec::new());
    let sql = format!(
        "SELECT vol.gonulluluk_no, vol.ad, vol.soyad, t.n
         FROM (SELECT {column} AS vid, COUNT(*) AS n FROM kargo{} GROUP BY {column}) t
         JOIN volunteers vol ON vol.id = t.vid
         ORDER BY t.n DESC, vol.gonulluluk_no ASC
         LIMIT 5",
        filter.clause()
    );
    let prefix = format!("{slot}_gonullusu__");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(filter.params()), |row| {
            let mut item = Map::new();
            item.insert(format!("{prefix}gonulluluk_no"), json!(row.get::<_, String>(0)?));
            item.insert(format!("{prefix}ad"), json!(row.get::<_, String>(1)?));
            item.insert(format!("{prefix}soyad"), json!(row.get::<_, String>(2)?));
            item.insert("count".into(), json!(row.get::<_, i64>(3)?));
            Ok(Value::Object(item))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn volunteer_assignments(conn: &Connection, filter: &SqlWhere) -> anyhow::Result<Value> {
    Ok(json!({
        "toplama_atanmis": count_where(conn, filter, "toplama_gonullusu_id IS NOT NULL")?,
        "tasima_atanmis": count_where(conn, filter, "tasima_gonullusu_id IS NOT NULL")?,
        "dagitim_atanmis": count_where(conn, filter, "dagitim_gonullusu_id IS NOT NULL")?,
        "hic_atanmamis": count_where(
            conn,
            filter,
            "toplama_gonullusu_id IS NULL AND tasima_gonullusu_id IS NULL AND dagitim_gonullusu_id IS NULL",
        )?,
        "top_toplama_gonulluleri": top_volunteers(conn, filter, "toplama")?,
        "top_tasima_gonulluleri": top_volunteers(conn, filter, "tasima")?,
        "top_dagitim_gonulluleri": top_volunteers(conn, filter, "dagitim")?,
    }))
}

pub fn time_based(conn: &Connection, filter: &SqlWhere, days: u32, now: DateTime<Utc>) -> anyhow::Result<Value> {
    let mut filter = filter.clone();
    let since = now - chrono::Duration::days(days as i64);
    filter.push("olusturulma_tarihi >= ?", [SqlValue::Text(since.format("%Y-%m-%d %H:%M:%S").to_string())]);

    let sql = format!(
        "SELECT date(olusturulma_tarihi) AS d, COUNT(*) FROM kargo{} GROUP BY d ORDER BY d",
        filter.clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let daily = stmt
        .query_map(params_from_iter(filter.params()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let total: i64 = daily.iter().map(|(_, n)| n).sum();

    Ok(json!({
        "period_days": days,
        "total_in_period": total,
        "daily_average": round2(total as f64 / days as f64),
        "daily_distribution": daily
            .into_iter()
            .map(|(date, count)| json!({ "date": date, "count": count }))
            .collect::<Vec<_>>(),
    }))
}

/// The twelve calendar months ending with `now`'s month, oldest first.
pub fn last_twelve_months(now: DateTime<Utc>) -> Vec<(i32, u32)> {
    let mut months = Vec::with_capacity(12);
    let (mut year, mut month) = (now.year(), now.month());
    for _ in 0..12 {
        months.push((year, month));
        if month == 1 {
            year -= 1;
            month = 12;
        } else {
            month -= 1;
        }
    }
    months.reverse();
    months
}

pub fn volunteers(conn: &Connection, now: DateTime<Utc>) -> anyhow::Result<Value> {
    let (total, active): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_active), 0) FROM volunteers",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let mut by_type = Map::new();
    for role in VolunteerRole::ALL {
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM volunteers WHERE gonullu_tipi = ?1",
            [role.as_str()],
            |row| row.get(0),
        )?;
        by_type.insert(role.as_str().to_string(), json!(n));
    }

    let mut stmt = conn.prepare(
        "SELECT sehir, COUNT(*) AS n FROM volunteers GROUP BY sehir ORDER BY n DESC, sehir ASC LIMIT 15",
    )?;
    let by_city = stmt
        .query_map([], |row| {
            let code: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok(json!({ "city": code, "display_name": city_display(&code), "count": count }))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT strftime('%Y-%m', created_at) AS ym, COUNT(*) FROM volunteers GROUP BY ym",
    )?;
    let per_month = stmt
        .query_map([], |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let monthly: Vec<Value> = last_twelve_months(now)
        .into_iter()
        .map(|(year, month)| {
            let key = format!("{year:04}-{month:02}");
            let count = per_month
                .iter()
                .find(|(ym, _)| ym.as_deref() == Some(key.as_str()))
                .map(|(_, n)| *n)
                .unwrap_or(0);
            json!({ "month": format!("{} {}", TR_MONTHS[month as usize - 1], year), "count": count })
        })
        .collect();

    Ok(json!({
        "total": total,
        "active": active,
        "inactive": total - active,
        "by_type": by_type,
        "by_city": by_city,
        "monthly_registrations": monthly,
    }))
}

#[derive(Debug, Clone, Copy)]
pub enum CargoReport {
    General,
    WeightVolume,
    Cities,
    Volunteers,
    TimeBased { days: u32 },
}

pub async fn cargo_report(pool: &DbPool, filter: SqlWhere, report: CargoReport) -> anyhow::Result<Value> {
    with_conn(pool, move |conn| match report {
        CargoReport::General => general(conn, &filter),
        CargoReport::WeightVolume => weight_volume(conn, &filter),
        CargoReport::Cities => cities(conn, &filter),
        CargoReport::Volunteers => volunteer_assignments(conn, &filter),
        CargoReport::TimeBased { days } => time_based(conn, &filter, days, Utc::now()),
    })
    .await
}

pub async fn volunteer_report(pool: &DbPool) -> anyhow::Result<Value> {
    with_conn(pool, |conn| volunteers(conn, Utc::now())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn twelve_months_cross_year_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap();
        let months = last_twelve_months(now);
        assert_eq!(months.len(), 12);
        assert_eq!(months.first(), Some(&(2024, 4)));
        assert_eq!(months.last(), Some(&(2025, 3)));
    }

    #[test]
    fn percentage_of_empty_set_is_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 3), 33.33);
    }

    #[test]
    fn aggregates_over_empty_table_are_zero() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(crate::db::SCHEMA).unwrap();
        let filter = SqlWhere::default();

        let general = general(&conn, &filter).unwrap();
        assert_eq!(general["toplam_kargo"], 0);
        assert_eq!(general["durum_yolda"]["percentage"], 0.0);
        assert_eq!(general["tip_gida"]["count"], 0);

        let wv = weight_volume(&conn, &filter).unwrap();
        assert_eq!(wv["ortalama_agirlik"], 0.0);
        assert_eq!(wv["toplam_miktar"], 0);

        let time = time_based(&conn, &filter, 30, Utc::now()).unwrap();
        assert_eq!(time["total_in_period"], 0);
        assert_eq!(time["daily_average"], 0.0);

        let vol = volunteers(&conn, Utc::now()).unwrap();
        assert_eq!(vol["total"], 0);
        assert_eq!(vol["monthly_registrations"].as_array().map(Vec::len), Some(12));
    }
}
