//! The record state machine: who may create, change, transition, view or
//! vote on a record, given its status, the caller's role and ownership.
//!
//! ```text
//! draft --admin--> under-investigation --admin--> resolved | rejected
//!                  ^ anonymous reports start here
//! ```
//!
//! Checks never touch the store; handlers load the record, ask here, then
//! write inside the same transaction.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use jiseti_types::models::{Actor, Media, MediaKind, Owner, Record, RecordStatus, StatusChange};

use crate::error::ApiError;
use crate::validation::{self, NewRecord, RecordPatch};

/// Owner-only changes, all of which require a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Edit,
    Delete,
    AddMedia,
}

impl Mutation {
    fn verb(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::AddMedia => "add media to",
        }
    }
}

pub fn initial_status(owner: &Owner) -> RecordStatus {
    match owner {
        Owner::Identified(_) => RecordStatus::Draft,
        Owner::Anonymous { .. } => RecordStatus::UnderInvestigation,
    }
}

pub fn require_admin(actor: &dyn Actor, message: &'static str) -> Result<(), ApiError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ApiError::RoleForbidden(message))
    }
}

pub fn require_user(actor: &dyn Actor, message: &'static str) -> Result<(), ApiError> {
    if actor.is_admin() {
        Err(ApiError::RoleForbidden(message))
    } else {
        Ok(())
    }
}

/// Build a new record and its initial media. The status follows from the
/// owner: drafts for account holders, straight to review for anonymous.
pub fn create(fields: &NewRecord, owner: Owner, now: DateTime<Utc>) -> (Record, Vec<Media>) {
    let record = Record {
        id: Uuid::new_v4(),
        record_type: fields.record_type,
        title: fields.title.clone(),
        description: fields.description.clone(),
        location: fields.location,
        status: initial_status(&owner),
        owner,
        created_at: now,
        updated_at: now,
    };
    let media = attach(&record, &fields.media, now);
    (record, media)
}

/// Opening entry of the status trail, written alongside the record.
pub fn opened(record: &Record) -> StatusChange {
    StatusChange {
        record_id: record.id,
        from: None,
        to: record.status,
        changed_by: record.owner.user_id(),
        reason: None,
        changed_at: record.created_at,
    }
}

pub fn attach(record: &Record, urls: &[(MediaKind, String)], now: DateTime<Utc>) -> Vec<Media> {
    urls.iter()
        .map(|(kind, url)| Media {
            id: Uuid::new_v4(),
            record_id: record.id,
            kind: *kind,
            url: url.clone(),
            created_at: now,
        })
        .collect()
}

/// Only the owning user, and only while the record is a draft.
pub fn authorize_mutation(
    record: &Record,
    actor: &dyn Actor,
    mutation: Mutation,
) -> Result<(), ApiError> {
    if actor.is_admin() || !record.owner.is_owned_by(actor.id()) {
        return Err(ApiError::Forbidden);
    }
    if record.status != RecordStatus::Draft {
        return Err(ApiError::FinalizedRecord(mutation.verb()));
    }
    Ok(())
}

/// Apply an owner's edit. The merged coordinate pair must still be valid.
pub fn edit(record: &mut Record, patch: RecordPatch, now: DateTime<Utc>) -> Result<(), ApiError> {
    let latitude = patch
        .latitude
        .or(record.location.map(|c| c.latitude));
    let longitude = patch
        .longitude
        .or(record.location.map(|c| c.longitude));
    let location = validation::coordinates(latitude, longitude)?;

    if let Some(record_type) = patch.record_type {
        record.record_type = record_type;
    }
    if let Some(title) = patch.title {
        record.title = title;
    }
    if let Some(description) = patch.description {
        record.description = description;
    }
    record.location = location;
    record.updated_at = now;
    Ok(())
}

/// Administrators move a record forward. Re-setting the current status is
/// allowed and counts as a change; nothing leaves a terminal status.
/// Returns the status being replaced.
pub fn transition(
    record: &Record,
    actor: &dyn Actor,
    target: RecordStatus,
) -> Result<RecordStatus, ApiError> {
    require_admin(actor, "Only admins can change record status")?;
    if target == RecordStatus::Draft {
        return Err(ApiError::InvalidStatus(target.to_string()));
    }
    if record.status.is_terminal() {
        return Err(ApiError::RecordClosed(record.status));
    }
    Ok(record.status)
}

/// Owners and administrators see everything; everyone else sees only
/// records past draft.
pub fn can_view(record: &Record, actor: Option<&dyn Actor>) -> bool {
    if record.status.is_public() {
        return true;
    }
    match actor {
        Some(a) => a.is_admin() || record.owner.is_owned_by(a.id()),
        None => false,
    }
}

pub fn authorize_view(record: &Record, actor: Option<&dyn Actor>) -> Result<(), ApiError> {
    if can_view(record, actor) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

pub fn authorize_vote(record: &Record, actor: &dyn Actor) -> Result<(), ApiError> {
    require_user(actor, "Only users can vote on records")?;
    if !record.status.is_public() {
        return Err(ApiError::RecordNotVotable);
    }
    Ok(())
}
