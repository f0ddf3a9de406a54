use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Actor, Administrator, Media, MediaKind, NormalUser, RecordDetail, RecordStatus, RecordType,
    Role, StatusChange, VoteType,
};

// -- JWT Claims --

/// Claims carried by every access token. The role is trusted from the token,
/// so authorization never needs a lookup to learn who the caller is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub email: String,
    pub exp: usize,
}

impl Actor for Claims {
    fn id(&self) -> Uuid {
        self.sub
    }
    fn role(&self) -> Role {
        self.role
    }
    fn email(&self) -> &str {
        &self.email
    }
}

// -- Auth --

/// Raw signup fields. Everything is optional here so the validation gate can
/// name the missing field instead of failing deserialization.
#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Administrators only; generated when absent.
    #[serde(default)]
    pub admin_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&NormalUser> for UserProfile {
    fn from(user: &NormalUser) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: Role::User,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub admin_number: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&Administrator> for AdminProfile {
    fn from(admin: &Administrator) -> Self {
        Self {
            id: admin.id,
            name: admin.name.clone(),
            email: admin.email.clone(),
            admin_number: admin.admin_number.clone(),
            role: Role::Admin,
            created_at: admin.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserAuthResponse {
    pub access_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct AdminAuthResponse {
    pub access_token: String,
    pub admin: AdminProfile,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ProfileResponse {
    User { user: UserProfile },
    Admin { admin: AdminProfile },
}

// -- Records --

#[derive(Debug, Default, Deserialize)]
pub struct CreateRecordRequest {
    #[serde(default, rename = "type")]
    pub record_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRecordRequest {
    #[serde(default, rename = "type")]
    pub record_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddMediaRequest {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub title: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: RecordStatus,
    pub is_anonymous: bool,
    pub owner_id: Option<Uuid>,
    pub creator_name: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub media: Vec<Media>,
    pub vote_count: u64,
    pub oppose_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RecordDetail> for RecordResponse {
    fn from(detail: RecordDetail) -> Self {
        let RecordDetail {
            record,
            creator_name,
            media,
            tally,
        } = detail;

        let first_of = |kind: MediaKind| {
            media
                .iter()
                .find(|m| m.kind == kind)
                .map(|m| m.url.clone())
        };

        Self {
            id: record.id,
            record_type: record.record_type,
            title: record.title,
            description: record.description,
            latitude: record.location.map(|c| c.latitude),
            longitude: record.location.map(|c| c.longitude),
            status: record.status,
            is_anonymous: record.owner.is_anonymous(),
            owner_id: record.owner.user_id(),
            creator_name: creator_name.unwrap_or_else(|| "Anonymous".to_string()),
            image_url: first_of(MediaKind::Image),
            video_url: first_of(MediaKind::Video),
            media,
            vote_count: tally.support,
            oppose_count: tally.oppose,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordEnvelope {
    pub message: String,
    pub record: RecordResponse,
}

#[derive(Debug, Serialize)]
pub struct AnonymousReportResponse {
    pub message: String,
    pub tracking_token: String,
    pub record: RecordResponse,
}

#[derive(Debug, Serialize)]
pub struct MediaEnvelope {
    pub message: String,
    pub media: Vec<Media>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Oldest entry first.
#[derive(Debug, Serialize)]
pub struct StatusHistory {
    pub record_id: Uuid,
    pub history: Vec<StatusChange>,
}

// -- Listing --

/// Optional filters shared by the listing endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct RecordFilterQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub record_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordPageQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub record_type: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RecordList {
    pub records: Vec<RecordResponse>,
}

#[derive(Debug, Serialize)]
pub struct RecordPage {
    pub records: Vec<RecordResponse>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub pages: u32,
}

// -- Votes --

#[derive(Debug, Default, Deserialize)]
pub struct VoteRequest {
    #[serde(default)]
    pub vote_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub vote_count: u64,
    pub oppose_count: u64,
    pub user_vote: Option<VoteType>,
}

// -- Admin --

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_records: u64,
    pub total_users: u64,
    pub total_admins: u64,
    pub status_distribution: BTreeMap<String, u64>,
    pub type_distribution: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub record_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<UserSummary>,
}
