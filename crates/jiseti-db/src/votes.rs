use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use jiseti_types::models::{VoteTally, VoteType};

use crate::error::translate;
use crate::models::format_timestamp;

/// Insert or overwrite the caller's vote. One row per (record, user).
pub fn upsert_vote(
    conn: &Connection,
    record_id: Uuid,
    user_id: Uuid,
    vote_type: VoteType,
    at: DateTime<Utc>,
) -> Result<()> {
    let at = format_timestamp(at);
    conn.execute(
        "INSERT INTO votes (record_id, user_id, vote_type, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(record_id, user_id)
         DO UPDATE SET vote_type = excluded.vote_type, updated_at = excluded.updated_at",
        params![record_id.to_string(), user_id.to_string(), vote_type.as_str(), at],
    )
    .map_err(translate)?;
    Ok(())
}

pub fn delete_vote(conn: &Connection, record_id: Uuid, user_id: Uuid) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM votes WHERE record_id = ?1 AND user_id = ?2",
        params![record_id.to_string(), user_id.to_string()],
    )?;
    Ok(removed > 0)
}

pub fn user_vote(conn: &Connection, record_id: Uuid, user_id: Uuid) -> Result<Option<VoteType>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT vote_type FROM votes WHERE record_id = ?1 AND user_id = ?2",
            params![record_id.to_string(), user_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    Ok(raw.map(|v| v.parse::<VoteType>()).transpose()?)
}

/// Counted from the vote rows on every call; there is no cached total.
pub fn tally(conn: &Connection, record_id: Uuid) -> Result<VoteTally> {
    let (support, oppose): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(vote_type = 'support'), 0), COALESCE(SUM(vote_type = 'oppose'), 0)
         FROM votes WHERE record_id = ?1",
        [record_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(VoteTally {
        support: support.max(0) as u64,
        oppose: oppose.max(0) as u64,
    })
}
