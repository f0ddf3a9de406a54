//! Database row types. These map directly to SQLite rows and are converted
//! into `jiseti-types` models at the crate boundary.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use uuid::Uuid;

use jiseti_types::models::{
    Administrator, Coordinates, Media, NormalUser, Owner, Record, StatusChange, VoteTally,
};

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct AdminRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub admin_number: String,
    pub password: String,
    pub created_at: String,
}

pub struct RecordRow {
    pub id: String,
    pub record_type: String,
    pub title: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: String,
    pub owner_id: Option<String>,
    pub tracking_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub creator_name: Option<String>,
    pub support: i64,
    pub oppose: i64,
}

pub struct MediaRow {
    pub id: String,
    pub record_id: String,
    pub kind: String,
    pub url: String,
    pub created_at: String,
}

pub struct StatusChangeRow {
    pub record_id: String,
    pub from_status: Option<String>,
    pub to_status: String,
    pub changed_by: Option<String>,
    pub reason: Option<String>,
    pub created_at: String,
}

/// Timestamps are written as RFC 3339 with microseconds so they sort
/// lexically in creation order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone; treat it as UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("corrupt id '{}'", raw))
}

impl TryFrom<UserRow> for NormalUser {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: parse_id(&row.id)?,
            name: row.name,
            email: row.email,
            password_hash: row.password,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<AdminRow> for Administrator {
    type Error = anyhow::Error;

    fn try_from(row: AdminRow) -> Result<Self> {
        Ok(Self {
            id: parse_id(&row.id)?,
            name: row.name,
            email: row.email,
            admin_number: row.admin_number,
            password_hash: row.password,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl RecordRow {
    /// Split into the domain record, the owner's display name and the vote
    /// tally.
    pub fn into_parts(self) -> Result<(Record, Option<String>, VoteTally)> {
        let owner = match (self.owner_id, self.tracking_token) {
            (Some(owner_id), None) => Owner::Identified(parse_id(&owner_id)?),
            (None, Some(tracking_token)) => Owner::Anonymous { tracking_token },
            _ => bail!("record {} has inconsistent ownership", self.id),
        };

        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };

        let record = Record {
            id: parse_id(&self.id)?,
            record_type: self.record_type.parse()?,
            title: self.title,
            description: self.description,
            location,
            status: self.status.parse()?,
            owner,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        };

        let tally = VoteTally {
            support: self.support.max(0) as u64,
            oppose: self.oppose.max(0) as u64,
        };

        Ok((record, self.creator_name, tally))
    }
}

impl TryFrom<MediaRow> for Media {
    type Error = anyhow::Error;

    fn try_from(row: MediaRow) -> Result<Self> {
        Ok(Self {
            id: parse_id(&row.id)?,
            record_id: parse_id(&row.record_id)?,
            kind: row.kind.parse()?,
            url: row.url,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<StatusChangeRow> for StatusChange {
    type Error = anyhow::Error;

    fn try_from(row: StatusChangeRow) -> Result<Self> {
        Ok(Self {
            record_id: parse_id(&row.record_id)?,
            from: row.from_status.map(|s| s.parse()).transpose()?,
            to: row.to_status.parse()?,
            changed_by: row.changed_by.as_deref().map(parse_id).transpose()?,
            reason: row.reason,
            changed_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_accept_both_formats() {
        let now = Utc::now();
        let parsed = parse_timestamp(&format_timestamp(now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());

        let legacy = parse_timestamp("2024-05-01 10:20:30").unwrap();
        assert_eq!(legacy.to_rfc3339(), "2024-05-01T10:20:30+00:00");

        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn ownership_must_be_exactly_one_of_owner_or_token() {
        let row = RecordRow {
            id: Uuid::new_v4().to_string(),
            record_type: "red-flag".into(),
            title: "t".into(),
            description: "d".into(),
            latitude: None,
            longitude: None,
            status: "draft".into(),
            owner_id: Some(Uuid::new_v4().to_string()),
            tracking_token: Some("tok".into()),
            created_at: format_timestamp(Utc::now()),
            updated_at: format_timestamp(Utc::now()),
            creator_name: None,
            support: 0,
            oppose: 0,
        };
        assert!(row.into_parts().is_err());
    }
}
