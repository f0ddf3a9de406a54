use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a stored or submitted string names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// -- Roles --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Capability view shared by every authenticated party, whether it comes from
/// a stored account or from a verified token.
pub trait Actor {
    fn id(&self) -> Uuid;
    fn role(&self) -> Role;
    fn email(&self) -> &str;

    fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Administrator {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub admin_number: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Actor for NormalUser {
    fn id(&self) -> Uuid {
        self.id
    }
    fn role(&self) -> Role {
        Role::User
    }
    fn email(&self) -> &str {
        &self.email
    }
}

impl Actor for Administrator {
    fn id(&self) -> Uuid {
        self.id
    }
    fn role(&self) -> Role {
        Role::Admin
    }
    fn email(&self) -> &str {
        &self.email
    }
}

// -- Records --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    #[serde(rename = "red-flag")]
    RedFlag,
    #[serde(rename = "intervention", alias = "incident")]
    Intervention,
}

impl RecordType {
    pub const ALL: [RecordType; 2] = [RecordType::RedFlag, RecordType::Intervention];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RedFlag => "red-flag",
            Self::Intervention => "intervention",
        }
    }
}

impl FromStr for RecordType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red-flag" | "redflag" | "red flag" => Ok(Self::RedFlag),
            "intervention" | "incident" => Ok(Self::Intervention),
            _ => Err(UnknownVariant::new("record type", s)),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle: `draft -> under-investigation -> {resolved, rejected}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    #[serde(rename = "draft")]
    Draft,
    #[serde(rename = "under-investigation", alias = "under investigation")]
    UnderInvestigation,
    #[serde(rename = "resolved")]
    Resolved,
    #[serde(rename = "rejected")]
    Rejected,
}

impl RecordStatus {
    pub const ALL: [RecordStatus; 4] = [
        RecordStatus::Draft,
        RecordStatus::UnderInvestigation,
        RecordStatus::Resolved,
        RecordStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::UnderInvestigation => "under-investigation",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }

    /// Everything past draft is visible to the public and open to votes.
    pub fn is_public(&self) -> bool {
        !matches!(self, Self::Draft)
    }
}

impl FromStr for RecordStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "under-investigation" | "under investigation" | "under_investigation" => {
                Ok(Self::UnderInvestigation)
            }
            "resolved" => Ok(Self::Resolved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(UnknownVariant::new("status", s)),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a record belongs to. Anonymous records carry a tracking token instead
/// of an owner and never acquire one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Identified(Uuid),
    Anonymous { tracking_token: String },
}

impl Owner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Identified(id) => Some(*id),
            Self::Anonymous { .. } => None,
        }
    }

    pub fn tracking_token(&self) -> Option<&str> {
        match self {
            Self::Identified(_) => None,
            Self::Anonymous { tracking_token } => Some(tracking_token),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous { .. })
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id() == Some(user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub id: Uuid,
    pub record_type: RecordType,
    pub title: String,
    pub description: String,
    pub location: Option<Coordinates>,
    pub status: RecordStatus,
    pub owner: Owner,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl FromStr for MediaKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            _ => Err(UnknownVariant::new("media kind", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: Uuid,
    pub record_id: Uuid,
    pub kind: MediaKind,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// One step in a record's status trail. `from` is empty for the entry
/// written when the record is created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub record_id: Uuid,
    #[serde(rename = "from_status")]
    pub from: Option<RecordStatus>,
    #[serde(rename = "to_status")]
    pub to: RecordStatus,
    pub changed_by: Option<Uuid>,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

// -- Votes --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Support,
    Oppose,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::Oppose => "oppose",
        }
    }
}

impl FromStr for VoteType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "support" => Ok(Self::Support),
            "oppose" => Ok(Self::Oppose),
            _ => Err(UnknownVariant::new("vote type", s)),
        }
    }
}

/// Aggregate computed from vote rows at query time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub support: u64,
    pub oppose: u64,
}

/// A record together with everything a reader sees alongside it.
#[derive(Debug, Clone)]
pub struct RecordDetail {
    pub record: Record,
    pub creator_name: Option<String>,
    pub media: Vec<Media>,
    pub tally: VoteTally,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_spaced_alias() {
        assert_eq!(
            "under investigation".parse::<RecordStatus>(),
            Ok(RecordStatus::UnderInvestigation)
        );
        assert_eq!(
            serde_json::from_str::<RecordStatus>("\"under investigation\"").unwrap(),
            RecordStatus::UnderInvestigation
        );
        assert_eq!(
            serde_json::to_string(&RecordStatus::UnderInvestigation).unwrap(),
            "\"under-investigation\""
        );
    }

    #[test]
    fn terminal_statuses() {
        let terminal: Vec<_> = RecordStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&RecordStatus::Resolved, &RecordStatus::Rejected]);
        assert!(!RecordStatus::Draft.is_public());
        assert!(RecordStatus::Rejected.is_public());
    }

    #[test]
    fn incident_is_an_intervention() {
        assert_eq!("incident".parse::<RecordType>(), Ok(RecordType::Intervention));
        assert!("complaint".parse::<RecordType>().is_err());
    }

    #[test]
    fn anonymous_owner_has_no_user() {
        let owner = Owner::Anonymous {
            tracking_token: "abc".into(),
        };
        assert!(owner.is_anonymous());
        assert_eq!(owner.user_id(), None);
        assert_eq!(owner.tracking_token(), Some("abc"));
        assert!(!owner.is_owned_by(Uuid::new_v4()));
    }
}
