use chrono::Utc;
use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde::Deserialize;

use super::{audit, models::ContactMessage, with_conn, DbPool};
use crate::choices::{ContactPriority, ContactStatus};
use crate::filters::{Ordering, SqlWhere};
use crate::validation::ContactDraft;

const TABLE: &str = "contact_messages";

/// Stored attachment metadata.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub key: String,
    pub file_name: String,
    pub size: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Origin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

fn get(conn: &Connection, id: i64) -> anyhow::Result<Option<ContactMessage>> {
    let sql = format!("SELECT {} FROM {TABLE} WHERE id = ?1", ContactMessage::COLUMNS);
    Ok(conn.query_row(&sql, [id], ContactMessage::from_row).optional()?)
}

pub async fn insert(
    pool: &DbPool,
    draft: ContactDraft,
    attachment: Option<Attachment>,
    origin: Origin,
) -> anyhow::Result<ContactMessage> {
    with_conn(pool, move |conn| {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO contact_messages (ad, soyad, telefon, email, sehir, kategori, konu, mesaj, dosya,
                                           dosya_adi, dosya_boyutu, kvkk_onayi, ip_adresi, user_agent,
                                           olusturulma_tarihi, son_degisiklik)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1, ?12, ?13, ?14, ?14)",
            params![
                draft.first_name,
                draft.last_name,
                draft.phone,
                draft.email,
                draft.city,
                draft.category,
                draft.subject,
                draft.message,
                attachment.as_ref().map(|a| a.key.as_str()),
                attachment.as_ref().map(|a| a.file_name.as_str()),
                attachment.as_ref().map(|a| a.size),
                origin.ip_address,
                origin.user_agent,
                now
            ],
        )?;
        let id = conn.last_insert_rowid();
        get(conn, id)?.ok_or_else(|| anyhow::anyhow!("contact message {id} vanished after insert"))
    })
    .await
}

pub async fn find(pool: &DbPool, id: i64) -> anyhow::Result<Option<ContactMessage>> {
    with_conn(pool, move |conn| get(conn, id)).await
}

pub async fn count(pool: &DbPool, filter: SqlWhere) -> anyhow::Result<u64> {
    with_conn(pool, move |conn| {
        let sql = format!("SELECT COUNT(*) FROM {TABLE}{}", filter.clause());
        let n: i64 = conn.query_row(&sql, params_from_iter(filter.params()), |row| row.get(0))?;
        Ok(n as u64)
    })
    .await
}

pub async fn list(
    pool: &DbPool,
    filter: SqlWhere,
    ordering: Ordering,
    page: Option<(i64, i64)>,
) -> anyhow::Result<Vec<ContactMessage>> {
    with_conn(pool, move |conn| {
        let mut sql = format!(
            "SELECT {} FROM {TABLE}{}{}",
            ContactMessage::COLUMNS,
            filter.clause(),
            ordering.sql(None)
        );
        if let Some((limit, offset)) = page {
            sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(filter.params()), ContactMessage::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
    .await
}

/// Admin edits. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactUpdate {
    pub durum: Option<ContactStatus>,
    pub oncelik: Option<ContactPriority>,
    pub admin_notu: Option<String>,
    pub cevaplayan_admin: Option<String>,
}

pub async fn update(
    pool: &DbPool,
    id: i64,
    changes: ContactUpdate,
    actor: String,
) -> anyhow::Result<Option<ContactMessage>> {
    with_conn(pool, move |conn| {
        let tx = conn.transaction()?;
        let Some(before) = get(&tx, id)? else {
            return Ok(None);
        };
        let status = changes.durum.unwrap_or(before.status);
        let answered_at = match (status, before.answered_at) {
            (ContactStatus::Answered, None) => Some(Utc::now()),
            (_, existing) => existing,
        };
        tx.execute(
            "UPDATE contact_messages
             SET durum = ?1, oncelik = ?2, admin_notu = ?3, cevaplayan_admin = ?4, cevap_tarihi = ?5,
                 son_degisiklik = ?6
             WHERE id = ?7",
            params![
                status,
                changes.oncelik.unwrap_or(before.priority),
                changes.admin_notu.or(before.admin_note),
                changes.cevaplayan_admin.or(before.answered_by),
                answered_at,
                Utc::now(),
                id
            ],
        )?;
        if status != before.status {
            tracing::info!(contact = id, from = %before.status, to = %status, "contact status changed");
            let details = format!("{} -> {}", before.status, status);
            audit::record(&tx, Some(&actor), "STATUS_CHANGE", TABLE, Some(&id.to_string()), Some(&details))?;
        }
        let after = get(&tx, id)?;
        tx.commit()?;
        Ok(after)
    })
    .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    MarkAsRead,
    MarkAsAnswered,
    MarkAsClosed,
    SetHighPriority,
    SetNormalPriority,
}

impl BulkAction {
    pub fn as_str(self) -> &'static str {
        match self {
            BulkAction::MarkAsRead => "mark_as_read",
            BulkAction::MarkAsAnswered => "mark_as_answered",
            BulkAction::MarkAsClosed => "mark_as_closed",
            BulkAction::SetHighPriority => "set_high_priority",
            BulkAction::SetNormalPriority => "set_normal_priority",
        }
    }
}

/// Applies one admin action to every listed message; returns how many rows changed.
pub async fn bulk(pool: &DbPool, ids: Vec<i64>, action: BulkAction, admin: String) -> anyhow::Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    with_conn(pool, move |conn| {
        let tx = conn.transaction()?;
        // Same text layout rusqlite's chrono support writes.
        let stamp = SqlValue::Text(Utc::now().format("%Y-%m-%d %H:%M:%S%.f+00:00").to_string());
        let (assignments, mut values): (&str, Vec<SqlValue>) = match action {
            BulkAction::MarkAsRead => ("durum = ?", vec![SqlValue::Text(ContactStatus::Read.as_str().into())]),
            BulkAction::MarkAsClosed => ("durum = ?", vec![SqlValue::Text(ContactStatus::Closed.as_str().into())]),
            BulkAction::MarkAsAnswered => (
                "durum = ?, cevaplayan_admin = ?, cevap_tarihi = COALESCE(cevap_tarihi, ?)",
                vec![
                    SqlValue::Text(ContactStatus::Answered.as_str().into()),
                    SqlValue::Text(admin.clone()),
                    stamp.clone(),
                ],
            ),
            BulkAction::SetHighPriority => ("oncelik = ?", vec![SqlValue::Text(ContactPriority::High.as_str().into())]),
            BulkAction::SetNormalPriority => {
                ("oncelik = ?", vec![SqlValue::Text(ContactPriority::Normal.as_str().into())])
            }
        };
        values.push(stamp);
        let marks = vec!["?"; ids.len()].join(", ");
        values.extend(ids.iter().map(|id| SqlValue::Integer(*id)));
        let sql = format!("UPDATE {TABLE} SET {assignments}, son_degisiklik = ? WHERE id IN ({marks})");
        let changed = tx.execute(&sql, params_from_iter(values.iter()))?;

        let details = format!("{} ({} kayıt)", action.as_str(), changed);
        audit::record(&tx, Some(&admin), "BULK_ACTION", TABLE, None, Some(&details))?;
        tx.commit()?;
        tracing::info!(action = action.as_str(), changed, admin = %admin, "contact bulk action applied");
        Ok(changed)
    })
    .await
}
