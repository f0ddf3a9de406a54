//! Record and media queries. Functions take a `&Connection` so callers can
//! compose them inside one `Database::with_tx` scope.

use std::collections::HashMap;

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use uuid::Uuid;

use jiseti_types::models::{Media, Record, RecordDetail, RecordStatus, RecordType, StatusChange};

use crate::error::translate;
use crate::models::{MediaRow, RecordRow, StatusChangeRow, format_timestamp};

/// Selects a record with its owner's name and query-time vote aggregates.
const RECORD_SELECT: &str = "
    SELECT r.id, r.record_type, r.title, r.description, r.latitude, r.longitude, r.status,
           r.owner_id, r.tracking_token, r.created_at, r.updated_at, u.name,
           COALESCE(v.support, 0), COALESCE(v.oppose, 0)
    FROM records r
    LEFT JOIN normal_users u ON u.id = r.owner_id
    LEFT JOIN (
        SELECT record_id,
               SUM(vote_type = 'support') AS support,
               SUM(vote_type = 'oppose') AS oppose
        FROM votes
        GROUP BY record_id
    ) v ON v.record_id = r.id";

/// Listing scope and filters. The default selects every record.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub owner_id: Option<Uuid>,
    /// Excludes drafts.
    pub public_only: bool,
    pub status: Option<RecordStatus>,
    pub record_type: Option<RecordType>,
    /// `(limit, offset)`
    pub window: Option<(u32, u32)>,
}

impl RecordQuery {
    pub fn owned_by(owner_id: Uuid) -> Self {
        Self {
            owner_id: Some(owner_id),
            ..Self::default()
        }
    }

    pub fn public() -> Self {
        Self {
            public_only: true,
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: Option<RecordStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_type(mut self, record_type: Option<RecordType>) -> Self {
        self.record_type = record_type;
        self
    }

    /// 1-based page.
    pub fn paged(mut self, page: u32, per_page: u32) -> Self {
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        self.window = Some((per_page, offset));
        self
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(owner_id) = self.owner_id {
            values.push(Value::Text(owner_id.to_string()));
            clauses.push(format!("r.owner_id = ?{}", values.len()));
        }
        if self.public_only {
            clauses.push("r.status != 'draft'".to_string());
        }
        if let Some(status) = self.status {
            values.push(Value::Text(status.as_str().to_string()));
            clauses.push(format!("r.status = ?{}", values.len()));
        }
        if let Some(record_type) = self.record_type {
            values.push(Value::Text(record_type.as_str().to_string()));
            clauses.push(format!("r.record_type = ?{}", values.len()));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

pub fn insert_record(conn: &Connection, record: &Record) -> Result<()> {
    conn.execute(
        "INSERT INTO records (id, record_type, title, description, latitude, longitude, status,
                              is_anonymous, owner_id, tracking_token, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            record.id.to_string(),
            record.record_type.as_str(),
            record.title,
            record.description,
            record.location.map(|c| c.latitude),
            record.location.map(|c| c.longitude),
            record.status.as_str(),
            record.owner.is_anonymous(),
            record.owner.user_id().map(|id| id.to_string()),
            record.owner.tracking_token(),
            format_timestamp(record.created_at),
            format_timestamp(record.updated_at),
        ],
    )
    .map_err(translate)?;
    Ok(())
}

/// Persist the owner-editable fields. Ownership and status are untouched.
pub fn update_record(conn: &Connection, record: &Record) -> Result<()> {
    conn.execute(
        "UPDATE records
         SET record_type = ?2, title = ?3, description = ?4, latitude = ?5, longitude = ?6, updated_at = ?7
         WHERE id = ?1",
        params![
            record.id.to_string(),
            record.record_type.as_str(),
            record.title,
            record.description,
            record.location.map(|c| c.latitude),
            record.location.map(|c| c.longitude),
            format_timestamp(record.updated_at),
        ],
    )?;
    Ok(())
}

pub fn set_status(
    conn: &Connection,
    id: Uuid,
    status: RecordStatus,
    updated_at: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE records SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), status.as_str(), format_timestamp(updated_at)],
    )?;
    Ok(())
}

/// Removes the record; media and votes go with it through the cascade.
pub fn delete_record(conn: &Connection, id: Uuid) -> Result<bool> {
    let removed = conn.execute("DELETE FROM records WHERE id = ?1", [id.to_string()])?;
    Ok(removed > 0)
}

pub fn get_record(conn: &Connection, id: Uuid) -> Result<Option<Record>> {
    match select_one(conn, "r.id", &id.to_string())? {
        Some(row) => Ok(Some(row.into_parts()?.0)),
        None => Ok(None),
    }
}

pub fn get_record_detail(conn: &Connection, id: Uuid) -> Result<Option<RecordDetail>> {
    match select_one(conn, "r.id", &id.to_string())? {
        Some(row) => Ok(Some(attach_media(conn, vec![row])?.remove(0))),
        None => Ok(None),
    }
}

pub fn find_by_tracking_token(conn: &Connection, token: &str) -> Result<Option<RecordDetail>> {
    match select_one(conn, "r.tracking_token", token)? {
        Some(row) => Ok(Some(attach_media(conn, vec![row])?.remove(0))),
        None => Ok(None),
    }
}

/// Newest first; ties broken by insertion order.
pub fn list_records(conn: &Connection, query: &RecordQuery) -> Result<Vec<RecordDetail>> {
    let (where_sql, mut values) = query.where_clause();
    let mut sql = format!(
        "{}{} ORDER BY r.created_at DESC, r.rowid DESC",
        RECORD_SELECT, where_sql
    );
    if let Some((limit, offset)) = query.window {
        values.push(Value::Integer(i64::from(limit)));
        values.push(Value::Integer(i64::from(offset)));
        sql.push_str(&format!(" LIMIT ?{} OFFSET ?{}", values.len() - 1, values.len()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), map_record_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    attach_media(conn, rows)
}

pub fn count_records(conn: &Connection, query: &RecordQuery) -> Result<u64> {
    let (where_sql, values) = query.where_clause();
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM records r{}", where_sql),
        params_from_iter(values),
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

// -- Media --

pub fn insert_media(conn: &Connection, media: &Media) -> Result<()> {
    conn.execute(
        "INSERT INTO media (id, record_id, kind, url, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            media.id.to_string(),
            media.record_id.to_string(),
            media.kind.as_str(),
            media.url,
            format_timestamp(media.created_at),
        ],
    )
    .map_err(translate)?;
    Ok(())
}

/// Bound on host parameters per media lookup; SQLite refuses more than 32766.
const MEDIA_BATCH: usize = 500;

/// Batch-fetch media for a set of record IDs, ordered by creation.
pub fn media_for_records(conn: &Connection, record_ids: &[String]) -> Result<HashMap<String, Vec<Media>>> {
    let mut grouped: HashMap<String, Vec<Media>> = HashMap::new();

    for batch in record_ids.chunks(MEDIA_BATCH) {
        let placeholders: Vec<String> = (1..=batch.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT id, record_id, kind, url, created_at FROM media
             WHERE record_id IN ({})
             ORDER BY created_at, rowid",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(batch), |row| {
                Ok(MediaRow {
                    id: row.get(0)?,
                    record_id: row.get(1)?,
                    kind: row.get(2)?,
                    url: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for row in rows {
            let key = row.record_id.clone();
            grouped.entry(key).or_default().push(row.try_into()?);
        }
    }
    Ok(grouped)
}

// -- Status history --

pub fn insert_status_change(conn: &Connection, change: &StatusChange) -> Result<()> {
    conn.execute(
        "INSERT INTO status_history (record_id, from_status, to_status, changed_by, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            change.record_id.to_string(),
            change.from.map(|s| s.as_str()),
            change.to.as_str(),
            change.changed_by.map(|id| id.to_string()),
            change.reason,
            format_timestamp(change.changed_at),
        ],
    )?;
    Ok(())
}

/// Oldest first.
pub fn status_history(conn: &Connection, record_id: Uuid) -> Result<Vec<StatusChange>> {
    let mut stmt = conn.prepare(
        "SELECT record_id, from_status, to_status, changed_by, reason, created_at
         FROM status_history
         WHERE record_id = ?1
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map([record_id.to_string()], |row| {
            Ok(StatusChangeRow {
                record_id: row.get(0)?,
                from_status: row.get(1)?,
                to_status: row.get(2)?,
                changed_by: row.get(3)?,
                reason: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(StatusChange::try_from).collect()
}

// -- Stats --

pub struct StoreStats {
    pub total_records: u64,
    pub total_users: u64,
    pub total_admins: u64,
    pub by_status: Vec<(RecordStatus, u64)>,
    pub by_type: Vec<(RecordType, u64)>,
}

/// Every status and type is present, zero-filled.
pub fn store_stats(conn: &Connection) -> Result<StoreStats> {
    let scalar = |sql: &str| -> Result<u64> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    };

    let total_records = scalar("SELECT COUNT(*) FROM records")?;
    let total_users = scalar("SELECT COUNT(*) FROM normal_users")?;
    let total_admins = scalar("SELECT COUNT(*) FROM administrators")?;

    let grouped = |column: &str| -> Result<HashMap<String, u64>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {col}, COUNT(*) FROM records GROUP BY {col}",
            col = column
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(|(k, n)| (k, n.max(0) as u64)).collect())
    };

    let statuses = grouped("status")?;
    let types = grouped("record_type")?;

    Ok(StoreStats {
        total_records,
        total_users,
        total_admins,
        by_status: RecordStatus::ALL
            .iter()
            .map(|s| (*s, statuses.get(s.as_str()).copied().unwrap_or(0)))
            .collect(),
        by_type: RecordType::ALL
            .iter()
            .map(|t| (*t, types.get(t.as_str()).copied().unwrap_or(0)))
            .collect(),
    })
}

fn select_one(conn: &Connection, column: &str, value: &str) -> Result<Option<RecordRow>> {
    let mut stmt = conn.prepare(&format!("{} WHERE {} = ?1", RECORD_SELECT, column))?;
    Ok(stmt.query_row([value], map_record_row).optional()?)
}

fn map_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        record_type: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        status: row.get(6)?,
        owner_id: row.get(7)?,
        tracking_token: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        creator_name: row.get(11)?,
        support: row.get(12)?,
        oppose: row.get(13)?,
    })
}

fn attach_media(conn: &Connection, rows: Vec<RecordRow>) -> Result<Vec<RecordDetail>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut media = media_for_records(conn, &ids)?;

    rows.into_iter()
        .map(|row| {
            let media = media.remove(&row.id).unwrap_or_default();
            let (record, creator_name, tally) = row.into_parts()?;
            Ok(RecordDetail {
                record,
                creator_name,
                media,
                tally,
            })
        })
        .collect()
}
