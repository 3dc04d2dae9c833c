use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use super::{models::Volunteer, users, with_conn, DbPool};
use crate::codes::{next_code, CodeKind};
use crate::error::FieldErrors;
use crate::filters::{Ordering, SqlWhere};
use crate::validation::{NewVolunteer, VolunteerRef};

const FROM: &str = "FROM volunteers v JOIN users u ON u.id = v.user_id";

/// Login name derived from the person: `ayseyilmaz4567`, suffixed on collision.
pub fn username_base(first_name: &str, last_name: &str, phone: &str) -> String {
    let tail: String = phone.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("{first_name}{last_name}{tail}")
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

pub fn get(conn: &Connection, id: i64) -> anyhow::Result<Option<Volunteer>> {
    let sql = format!("SELECT {} {FROM} WHERE v.id = ?1", Volunteer::COLUMNS);
    Ok(conn.query_row(&sql, [id], Volunteer::from_row).optional()?)
}

pub fn get_by_user(conn: &Connection, user_id: i64) -> anyhow::Result<Option<Volunteer>> {
    let sql = format!("SELECT {} {FROM} WHERE v.user_id = ?1", Volunteer::COLUMNS);
    Ok(conn.query_row(&sql, [user_id], Volunteer::from_row).optional()?)
}

/// Role and activity of a volunteer, for assignment checks.
pub fn assignment_ref(conn: &Connection, id: i64) -> rusqlite::Result<Option<VolunteerRef>> {
    conn.query_row(
        "SELECT gonullu_tipi, is_active FROM volunteers WHERE id = ?1",
        [id],
        |row| Ok(VolunteerRef { role: row.get(0)?, is_active: row.get(1)? }),
    )
    .optional()
}

pub async fn find(pool: &DbPool, id: i64) -> anyhow::Result<Option<Volunteer>> {
    with_conn(pool, move |conn| get(conn, id)).await
}

pub async fn find_by_user(pool: &DbPool, user_id: i64) -> anyhow::Result<Option<Volunteer>> {
    with_conn(pool, move |conn| get_by_user(conn, user_id)).await
}

/// Creates the login account and the volunteer profile in one immediate
/// transaction, assigning the next membership code.
pub async fn register(
    pool: &DbPool,
    new: NewVolunteer,
    password_hash: String,
) -> anyhow::Result<Result<Volunteer, FieldErrors>> {
    with_conn(pool, move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if users::email_taken(&tx, &new.email)? {
            let mut errors = FieldErrors::new();
            errors.add("email", "Bu e-posta adresi zaten kullanılıyor.");
            return Ok(Err(errors));
        }

        let username = users::unique_username(
            &tx,
            &username_base(&new.first_name, &new.last_name, &new.phone),
        )?;
        let user_id = users::insert(
            &tx,
            &users::NewUser {
                username: &username,
                email: &new.email,
                password_hash: &password_hash,
                first_name: &new.first_name,
                last_name: &new.last_name,
                is_active: true,
                is_staff: false,
                is_superuser: false,
            },
        )?;

        let code = next_code(&tx, CodeKind::Volunteer)?;
        let now = Utc::now();
        tx.execute(
            "INSERT INTO volunteers (user_id, gonulluluk_no, ad, soyad, telefon, sehir, gonullu_tipi,
                                     is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                user_id,
                code,
                new.first_name,
                new.last_name,
                new.phone,
                new.city.code(),
                new.role,
                new.is_active,
                now
            ],
        )?;
        let id = tx.last_insert_rowid();
        let volunteer = get(&tx, id)?.ok_or_else(|| anyhow::anyhow!("volunteer {id} vanished after insert"))?;
        tx.commit()?;

        tracing::info!(volunteer = %volunteer.code, user = %username, "volunteer registered");
        Ok(Ok(volunteer))
    })
    .await
}

pub async fn list(
    pool: &DbPool,
    filter: SqlWhere,
    ordering: Ordering,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Volunteer>> {
    with_conn(pool, move |conn| {
        let sql = format!(
            "SELECT {} {FROM} WHERE v.id IN (SELECT id FROM volunteers{}) {} LIMIT {limit} OFFSET {offset}",
            Volunteer::COLUMNS,
            filter.clause(),
            ordering.sql(Some("v")),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(filter.params()), Volunteer::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
    .await
}

pub async fn count(pool: &DbPool, filter: SqlWhere) -> anyhow::Result<u64> {
    with_conn(pool, move |conn| {
        let sql = format!("SELECT COUNT(*) FROM volunteers{}", filter.clause());
        let n: i64 = conn.query_row(&sql, params_from_iter(filter.params()), |row| row.get(0))?;
        Ok(n as u64)
    })
    .await
}

/// Toggles the active flag; `None` when the volunteer does not exist.
pub async fn set_active(pool: &DbPool, id: i64, active: bool) -> anyhow::Result<Option<Volunteer>> {
    with_conn(pool, move |conn| {
        let changed = conn.execute(
            "UPDATE volunteers SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active, Utc::now(), id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        get(conn, id)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_uses_last_four_phone_digits() {
        assert_eq!(username_base("Ayşe", "Yıl Maz", "5321234567"), "ayşeyılmaz4567");
    }
}
