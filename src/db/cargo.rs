use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;

use super::{
    audit,
    models::{Cargo, CargoRecord, Volunteer},
    volunteers, with_conn, DbPool,
};
use crate::choices::CargoStatus;
use crate::codes::{next_code, CodeKind};
use crate::error::FieldErrors;
use crate::filters::{Ordering, SqlWhere};
use crate::validation::{validate_cargo, CargoDraft, CargoInput, VolunteerRef};

const TABLE: &str = "kargo";

/// Editable fields of a stored row, in the shape clients send them.
pub fn as_input(cargo: &Cargo) -> CargoInput {
    CargoInput {
        anonim_gonderici: Some(cargo.anonymous),
        gonderici_ad: cargo.sender_first_name.clone(),
        gonderici_soyad: cargo.sender_last_name.clone(),
        gonderici_telefon: cargo.sender_phone.clone(),
        gonderici_email: cargo.sender_email.clone(),
        cikis_yeri: Some(cargo.origin.clone()),
        ulasacagi_yer: Some(cargo.destination.clone()),
        agirlik: Some(cargo.weight),
        hacim: Some(cargo.volume),
        miktar: Some(cargo.quantity),
        durum: Some(cargo.status.as_str().to_string()),
        kargo_tipi: Some(cargo.kind.as_str().to_string()),
        icerik: Some(cargo.content.clone()),
        toplama_gonullusu: Some(cargo.collector_id),
        tasima_gonullusu: cargo.transporter_id,
        dagitim_gonullusu: cargo.distributor_id,
        ozel_not: cargo.note.clone(),
    }
}

/// Overlays the keys of a partial update onto the stored values.
pub fn merge_patch(cargo: &Cargo, patch: &Value) -> Result<CargoInput, FieldErrors> {
    let mut base = serde_json::to_value(as_input(cargo)).map_err(|e| payload_error(&e))?;
    if let (Some(target), Some(changes)) = (base.as_object_mut(), patch.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(base).map_err(|e| payload_error(&e))
}

pub fn parse_input(body: Value) -> Result<CargoInput, FieldErrors> {
    serde_json::from_value(body).map_err(|e| payload_error(&e))
}

fn payload_error(e: &serde_json::Error) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.add("non_field_errors", format!("Geçersiz veri: {e}"));
    errors
}

fn get(conn: &Connection, id: i64) -> anyhow::Result<Option<Cargo>> {
    let sql = format!("SELECT {} FROM {TABLE} WHERE id = ?1", Cargo::COLUMNS);
    Ok(conn.query_row(&sql, [id], Cargo::from_row).optional()?)
}

fn resolve(conn: &Connection, cargos: Vec<Cargo>) -> anyhow::Result<Vec<CargoRecord>> {
    let mut cache: HashMap<i64, Option<Volunteer>> = HashMap::new();
    let mut lookup = |id: Option<i64>| -> anyhow::Result<Option<Volunteer>> {
        let Some(id) = id else { return Ok(None) };
        if let Some(hit) = cache.get(&id) {
            return Ok(hit.clone());
        }
        let found = volunteers::get(conn, id)?;
        cache.insert(id, found.clone());
        Ok(found)
    };
    cargos
        .into_iter()
        .map(|cargo| -> anyhow::Result<CargoRecord> {
            Ok(CargoRecord {
                collector: lookup(Some(cargo.collector_id))?,
                transporter: lookup(cargo.transporter_id)?,
                distributor: lookup(cargo.distributor_id)?,
                cargo,
            })
        })
        .collect()
}

fn resolve_one(conn: &Connection, cargo: Cargo) -> anyhow::Result<CargoRecord> {
    resolve(conn, vec![cargo])?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("cargo record vanished while resolving volunteers"))
}

/// Volunteer references for every id the input mentions, fetched up front.
fn assignment_refs(conn: &Connection, input: &CargoInput) -> anyhow::Result<HashMap<i64, VolunteerRef>> {
    let mut refs = HashMap::new();
    for id in [input.toplama_gonullusu, input.tasima_gonullusu, input.dagitim_gonullusu]
        .into_iter()
        .flatten()
    {
        if let Some(found) = volunteers::assignment_ref(conn, id)? {
            refs.insert(id, found);
        }
    }
    Ok(refs)
}

fn validate_in(conn: &Connection, input: &CargoInput) -> anyhow::Result<Result<CargoDraft, FieldErrors>> {
    let refs = assignment_refs(conn, input)?;
    Ok(validate_cargo(input, |id| refs.get(&id).copied()))
}

/// Audit rows and log events for what changed between two versions of a record.
fn record_transitions(
    conn: &Connection,
    before: Option<&Cargo>,
    after: &Cargo,
    actor: Option<&str>,
) -> anyhow::Result<()> {
    let record_id = after.id.to_string();
    let Some(before) = before else {
        tracing::info!(kargo_no = %after.code, durum = %after.status, "cargo created");
        let details = format!("Yeni kargo oluşturuldu: {} - {}", after.code, after.status.label());
        return audit::record(conn, actor, "CREATE", TABLE, Some(&record_id), Some(&details));
    };

    if before.status != after.status {
        tracing::info!(
            kargo_no = %after.code,
            from = %before.status,
            to = %after.status,
            "cargo status changed"
        );
        let details = format!("{}: {} -> {}", after.code, before.status, after.status);
        audit::record(conn, actor, "STATUS_CHANGE", TABLE, Some(&record_id), Some(&details))?;
    }
    if before.anonymous != after.anonymous {
        let mode = if after.anonymous { "anonim" } else { "gönderici bilgili" };
        tracing::info!(kargo_no = %after.code, anonim = after.anonymous, "cargo sender mode changed");
        let details = format!("{}: gönderici durumu {}", after.code, mode);
        audit::record(conn, actor, "ANONYMITY_CHANGE", TABLE, Some(&record_id), Some(&details))?;
    }
    if before.status == after.status && before.anonymous == after.anonymous {
        audit::record(conn, actor, "UPDATE", TABLE, Some(&record_id), Some(&after.code))?;
    }
    Ok(())
}

/// Validates and inserts a new record under the next tracking code.
///
/// Code allocation and insert share one `BEGIN IMMEDIATE` transaction, so
/// concurrent creators queue on the write lock instead of racing.
pub async fn create(
    pool: &DbPool,
    input: CargoInput,
    actor: Option<String>,
) -> anyhow::Result<Result<CargoRecord, FieldErrors>> {
    with_conn(pool, move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let draft = match validate_in(&tx, &input)? {
            Ok(draft) => draft,
            Err(errors) => return Ok(Err(errors)),
        };

        let code = next_code(&tx, CodeKind::Cargo)?;
        let now = Utc::now();
        tx.execute(
            "INSERT INTO kargo (kargo_no, anonim_gonderici, gonderici_ad, gonderici_soyad, gonderici_telefon,
                                gonderici_email, cikis_yeri, ulasacagi_yer, agirlik, hacim, miktar, durum,
                                kargo_tipi, icerik, toplama_gonullusu_id, tasima_gonullusu_id,
                                dagitim_gonullusu_id, ozel_not, olusturulma_tarihi, son_degisiklik)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?19)",
            params![
                code,
                draft.anonymous,
                draft.sender_first_name,
                draft.sender_last_name,
                draft.sender_phone,
                draft.sender_email,
                draft.origin.code(),
                draft.destination.code(),
                draft.weight,
                draft.volume,
                draft.quantity,
                draft.status,
                draft.kind,
                draft.content,
                draft.collector_id,
                draft.transporter_id,
                draft.distributor_id,
                draft.note,
                now
            ],
        )?;
        let id = tx.last_insert_rowid();
        let cargo = get(&tx, id)?.ok_or_else(|| anyhow::anyhow!("cargo {id} vanished after insert"))?;
        record_transitions(&tx, None, &cargo, actor.as_deref())?;
        let record = resolve_one(&tx, cargo)?;
        tx.commit()?;
        Ok(Ok(record))
    })
    .await
}

pub enum Change {
    /// Every field supplied, as with `PUT`.
    Replace(Value),
    /// Only the supplied keys change, as with `PATCH`.
    Merge(Value),
}

/// Re-validates the whole record after applying `change`. `None` when the id is unknown.
pub async fn update(
    pool: &DbPool,
    id: i64,
    change: Change,
    actor: Option<String>,
) -> anyhow::Result<Option<Result<CargoRecord, FieldErrors>>> {
    with_conn(pool, move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(before) = get(&tx, id)? else {
            return Ok(None);
        };
        let input = match &change {
            Change::Replace(body) => parse_input(body.clone()),
            Change::Merge(patch) => merge_patch(&before, patch),
        };
        let input = match input {
            Ok(input) => input,
            Err(errors) => return Ok(Some(Err(errors))),
        };
        let draft = match validate_in(&tx, &input)? {
            Ok(draft) => draft,
            Err(errors) => return Ok(Some(Err(errors))),
        };

        tx.execute(
            "UPDATE kargo SET anonim_gonderici = ?1, gonderici_ad = ?2, gonderici_soyad = ?3,
                    gonderici_telefon = ?4, gonderici_email = ?5, cikis_yeri = ?6, ulasacagi_yer = ?7,
                    agirlik = ?8, hacim = ?9, miktar = ?10, durum = ?11, kargo_tipi = ?12, icerik = ?13,
                    toplama_gonullusu_id = ?14, tasima_gonullusu_id = ?15, dagitim_gonullusu_id = ?16,
                    ozel_not = ?17, son_degisiklik = ?18
             WHERE id = ?19",
            params![
                draft.anonymous,
                draft.sender_first_name,
                draft.sender_last_name,
                draft.sender_phone,
                draft.sender_email,
                draft.origin.code(),
                draft.destination.code(),
                draft.weight,
                draft.volume,
                draft.quantity,
                draft.status,
                draft.kind,
                draft.content,
                draft.collector_id,
                draft.transporter_id,
                draft.distributor_id,
                draft.note,
                Utc::now(),
                id
            ],
        )?;
        let after = get(&tx, id)?.ok_or_else(|| anyhow::anyhow!("cargo {id} vanished during update"))?;
        record_transitions(&tx, Some(&before), &after, actor.as_deref())?;
        let record = resolve_one(&tx, after)?;
        tx.commit()?;
        Ok(Some(Ok(record)))
    })
    .await
}

/// Status-only transition, checked against the same rules as a full update.
/// `None` when the id is unknown.
pub async fn set_status(
    pool: &DbPool,
    id: i64,
    status: CargoStatus,
    actor: Option<String>,
) -> anyhow::Result<Option<Result<CargoRecord, FieldErrors>>> {
    with_conn(pool, move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(before) = get(&tx, id)? else {
            return Ok(None);
        };
        let mut input = as_input(&before);
        input.durum = Some(status.as_str().to_string());
        if let Err(errors) = validate_in(&tx, &input)? {
            return Ok(Some(Err(errors)));
        }

        tx.execute(
            "UPDATE kargo SET durum = ?1, son_degisiklik = ?2 WHERE id = ?3",
            params![status, Utc::now(), id],
        )?;
        let after = get(&tx, id)?.ok_or_else(|| anyhow::anyhow!("cargo {id} vanished during update"))?;
        record_transitions(&tx, Some(&before), &after, actor.as_deref())?;
        let record = resolve_one(&tx, after)?;
        tx.commit()?;
        Ok(Some(Ok(record)))
    })
    .await
}

pub async fn find(pool: &DbPool, id: i64) -> anyhow::Result<Option<CargoRecord>> {
    with_conn(pool, move |conn| match get(conn, id)? {
        Some(cargo) => Ok(Some(resolve_one(conn, cargo)?)),
        None => Ok(None),
    })
    .await
}

pub async fn find_by_code(pool: &DbPool, code: String) -> anyhow::Result<Option<Cargo>> {
    with_conn(pool, move |conn| {
        let sql = format!("SELECT {} FROM {TABLE} WHERE kargo_no = ?1", Cargo::COLUMNS);
        Ok(conn.query_row(&sql, [code], Cargo::from_row).optional()?)
    })
    .await
}

pub async fn count(pool: &DbPool, filter: SqlWhere) -> anyhow::Result<u64> {
    with_conn(pool, move |conn| {
        let sql = format!("SELECT COUNT(*) FROM {TABLE}{}", filter.clause());
        let n: i64 = conn.query_row(&sql, params_from_iter(filter.params()), |row| row.get(0))?;
        Ok(n as u64)
    })
    .await
}

/// One page (or everything, when `page` is `None`) of filtered records.
pub async fn list(
    pool: &DbPool,
    filter: SqlWhere,
    ordering: Ordering,
    page: Option<(i64, i64)>,
) -> anyhow::Result<Vec<CargoRecord>> {
    with_conn(pool, move |conn| {
        let mut sql = format!(
            "SELECT {} FROM {TABLE}{}{}",
            Cargo::COLUMNS,
            filter.clause(),
            ordering.sql(None)
        );
        if let Some((limit, offset)) = page {
            sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        }
        let mut stmt = conn.prepare(&sql)?;
        let cargos = stmt
            .query_map(params_from_iter(filter.params()), Cargo::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        resolve(conn, cargos)
    })
    .await
}

/// Records where the volunteer holds any of the three assignments, newest first.
pub async fn by_volunteer(pool: &DbPool, volunteer_id: i64) -> anyhow::Result<Vec<CargoRecord>> {
    with_conn(pool, move |conn| {
        let sql = format!(
            "SELECT {} FROM {TABLE}
             WHERE toplama_gonullusu_id = ?1 OR tasima_gonullusu_id = ?1 OR dagitim_gonullusu_id = ?1
             ORDER BY olusturulma_tarihi DESC, id DESC",
            Cargo::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let cargos = stmt
            .query_map([volunteer_id], Cargo::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        resolve(conn, cargos)
    })
    .await
}
