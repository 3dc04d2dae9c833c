use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{models::User, with_conn, DbPool};

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

pub fn insert(conn: &Connection, user: &NewUser<'_>) -> anyhow::Result<i64> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (username, email, password_hash, first_name, last_name, is_active, is_staff,
                            is_superuser, password_changed_at, date_joined)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            user.username,
            user.email,
            user.password_hash,
            user.first_name,
            user.last_name,
            user.is_active,
            user.is_staff,
            user.is_superuser,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn email_taken(conn: &Connection, email: &str) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// `base` itself when free, otherwise `base1`, `base2`, ...
pub fn unique_username(conn: &Connection, base: &str) -> anyhow::Result<String> {
    let mut stmt = conn.prepare("SELECT 1 FROM users WHERE username = ?1")?;
    let mut candidate = base.to_string();
    let mut counter = 1;
    while stmt.exists([&candidate])? {
        candidate = format!("{base}{counter}");
        counter += 1;
    }
    Ok(candidate)
}

pub fn get_by_id(conn: &Connection, id: i64) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS);
    Ok(conn.query_row(&sql, [id], User::from_row).optional()?)
}

pub async fn find_by_id(pool: &DbPool, id: i64) -> anyhow::Result<Option<User>> {
    with_conn(pool, move |conn| get_by_id(conn, id)).await
}

pub async fn find_by_email(pool: &DbPool, email: String) -> anyhow::Result<Option<User>> {
    with_conn(pool, move |conn| {
        let sql = format!("SELECT {} FROM users WHERE email = ?1", User::COLUMNS);
        Ok(conn.query_row(&sql, [email.trim()], User::from_row).optional()?)
    })
    .await
}

/// Replaces the hash and moves `password_changed_at`, which voids outstanding reset links.
pub async fn set_password(pool: &DbPool, id: i64, password_hash: String) -> anyhow::Result<()> {
    with_conn(pool, move |conn| {
        conn.execute(
            "UPDATE users SET password_hash = ?1, password_changed_at = ?2 WHERE id = ?3",
            params![password_hash, Utc::now(), id],
        )?;
        Ok(())
    })
    .await
}

/// Deactivates the account and its volunteer profile together.
pub async fn deactivate(pool: &DbPool, id: i64) -> anyhow::Result<()> {
    with_conn(pool, move |conn| {
        let tx = conn.transaction()?;
        tx.execute("UPDATE users SET is_active = 0 WHERE id = ?1", [id])?;
        tx.execute(
            "UPDATE volunteers SET is_active = 0, updated_at = ?1 WHERE user_id = ?2",
            params![Utc::now(), id],
        )?;
        tx.commit()?;
        Ok(())
    })
    .await
}

/// Creates an admin account, or promotes and re-keys an existing one with the same email.
pub async fn upsert_admin(
    pool: &DbPool,
    username: String,
    email: String,
    password_hash: String,
) -> anyhow::Result<i64> {
    with_conn(pool, move |conn| {
        let tx = conn.transaction()?;
        let existing: Option<i64> = tx
            .query_row("SELECT id FROM users WHERE email = ?1", [&email], |row| row.get(0))
            .optional()?;
        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE users SET is_staff = 1, is_superuser = 1, is_active = 1, password_hash = ?1,
                                      password_changed_at = ?2
                     WHERE id = ?3",
                    params![password_hash, Utc::now(), id],
                )?;
                id
            }
            None => {
                let username = unique_username(&tx, &username)?;
                insert(
                    &tx,
                    &NewUser {
                        username: &username,
                        email: &email,
                        password_hash: &password_hash,
                        first_name: "",
                        last_name: "",
                        is_active: true,
                        is_staff: true,
                        is_superuser: true,
                    },
                )?
            }
        };
        tx.commit()?;
        Ok(id)
    })
    .await
}
