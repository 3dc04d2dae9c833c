use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{models::AuditLog, with_conn, DbPool};

/// Writes one audit row on an existing connection or transaction.
pub fn record(
    conn: &Connection,
    user_id: Option<&str>,
    action: &str,
    table_name: &str,
    record_id: Option<&str>,
    details: Option<&str>,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO audit_logs (id, user_id, action, table_name, record_id, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            uuid::Uuid::new_v4().to_string(),
            user_id,
            action,
            table_name,
            record_id,
            details,
            Utc::now()
        ],
    )?;
    Ok(())
}

pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<String>,
    action: &'static str,
    table_name: &'static str,
    record_id: Option<String>,
    details: Option<String>,
) -> anyhow::Result<()> {
    with_conn(pool, move |conn| {
        record(conn, user_id.as_deref(), action, table_name, record_id.as_deref(), details.as_deref())
    })
    .await
}

/// Oldest first, optionally bounded below by `since`.
pub async fn list_audit_logs(pool: &DbPool, since: Option<DateTime<Utc>>) -> anyhow::Result<Vec<AuditLog>> {
    with_conn(pool, move |conn| {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, action, table_name, record_id, details, created_at
             FROM audit_logs
             WHERE ?1 IS NULL OR created_at >= ?1
             ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![since], |row| {
                Ok(AuditLog {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    action: row.get(2)?,
                    table_name: row.get(3)?,
                    record_id: row.get(4)?,
                    details: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
    .await
}
