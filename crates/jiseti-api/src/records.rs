use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use jiseti_db::records::{
    RecordQuery, delete_record, get_record, get_record_detail, insert_media, insert_record,
    insert_status_change, list_records, set_status, status_history, update_record,
};
use jiseti_db::{Connection, queries::find_user};
use jiseti_types::api::{
    AddMediaRequest, Claims, CreateRecordRequest, MediaEnvelope, MessageResponse, RecordEnvelope,
    RecordFilterQuery, RecordList, RecordResponse, StatusHistory, StatusUpdateRequest,
    UpdateRecordRequest,
};
use jiseti_types::events::{Recipient, StatusChanged};
use jiseti_types::models::{Owner, Record, RecordDetail, StatusChange};

use crate::error::ApiError;
use crate::lifecycle::{self, Mutation};
use crate::state::{AppState, blocking};
use crate::validation;

pub(crate) fn load(conn: &Connection, id: Uuid) -> Result<Record, ApiError> {
    get_record(conn, id)?.ok_or(ApiError::NotFound("Record"))
}

pub(crate) fn load_detail(conn: &Connection, id: Uuid) -> Result<RecordDetail, ApiError> {
    get_record_detail(conn, id)?.ok_or(ApiError::NotFound("Record"))
}

pub async fn create_record(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateRecordRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    lifecycle::require_user(&claims, "Only users can create records")?;
    let fields = validation::new_record(&req)?;

    let detail = blocking(move || {
        state.db.with_tx(|tx| -> Result<_, ApiError> {
            let (record, media) = lifecycle::create(&fields, Owner::Identified(claims.sub), Utc::now());
            insert_record(tx, &record)?;
            insert_status_change(tx, &lifecycle::opened(&record))?;
            for m in &media {
                insert_media(tx, m)?;
            }
            info!("Record {} created by {}", record.id, claims.email);
            load_detail(tx, record.id)
        })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RecordEnvelope {
            message: "Record created successfully".into(),
            record: detail.into(),
        }),
    ))
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<RecordResponse>, ApiError> {
    let detail = blocking(move || {
        state.db.with_conn(|conn| -> Result<_, ApiError> {
            let detail = load_detail(conn, id)?;
            lifecycle::authorize_view(&detail.record, Some(&claims))?;
            Ok(detail)
        })
    })
    .await?;

    Ok(Json(detail.into()))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateRecordRequest>, ApiError>,
) -> Result<Json<RecordEnvelope>, ApiError> {
    let patch = validation::record_patch(&req)?;

    let detail = blocking(move || {
        state.db.with_tx(|tx| -> Result<_, ApiError> {
            let mut record = load(tx, id)?;
            lifecycle::authorize_mutation(&record, &claims, Mutation::Edit)?;
            lifecycle::edit(&mut record, patch, Utc::now())?;
            update_record(tx, &record)?;
            load_detail(tx, id)
        })
    })
    .await?;

    Ok(Json(RecordEnvelope {
        message: "Record updated successfully".into(),
        record: detail.into(),
    }))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<MessageResponse>, ApiError> {
    blocking(move || {
        state.db.with_tx(|tx| -> Result<_, ApiError> {
            let record = load(tx, id)?;
            lifecycle::authorize_mutation(&record, &claims, Mutation::Delete)?;
            delete_record(tx, id)?;
            info!("Record {} deleted by {}", id, claims.email);
            Ok(())
        })
    })
    .await?;

    Ok(Json(MessageResponse {
        message: "Record deleted successfully".into(),
    }))
}

pub async fn add_media(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<AddMediaRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let urls = validation::media(&req)?;

    let media = blocking(move || {
        state.db.with_tx(|tx| -> Result<_, ApiError> {
            let record = load(tx, id)?;
            lifecycle::authorize_mutation(&record, &claims, Mutation::AddMedia)?;
            let media = lifecycle::attach(&record, &urls, Utc::now());
            for m in &media {
                insert_media(tx, m)?;
            }
            Ok(media)
        })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(MediaEnvelope {
            message: "Media added successfully".into(),
            media,
        }),
    ))
}

/// The caller's own records, any status, newest first.
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(query), _): WithRejection<Query<RecordFilterQuery>, ApiError>,
) -> Result<Json<RecordList>, ApiError> {
    let (status, record_type) = validation::record_filters(&query)?;
    let query = RecordQuery::owned_by(claims.sub)
        .with_status(status)
        .with_type(record_type);

    let records = blocking(move || Ok(state.db.with_conn(|conn| list_records(conn, &query))?)).await?;

    Ok(Json(RecordList {
        records: records.into_iter().map(RecordResponse::from).collect(),
    }))
}

/// Status trail of a record the caller may view, oldest first.
pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<StatusHistory>, ApiError> {
    let history = blocking(move || {
        state.db.with_conn(|conn| -> Result<_, ApiError> {
            let record = load(conn, id)?;
            lifecycle::authorize_view(&record, Some(&claims))?;
            Ok(status_history(conn, id)?)
        })
    })
    .await?;

    Ok(Json(StatusHistory {
        record_id: id,
        history,
    }))
}

/// Administrator transition. The owner is told after the commit; the
/// outcome of that delivery never reaches this response.
pub async fn change_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<StatusUpdateRequest>, ApiError>,
) -> Result<Json<RecordEnvelope>, ApiError> {
    lifecycle::require_admin(&claims, "Only admins can change record status")?;
    let target = validation::status(&validation::required(req.status.as_deref(), "status")?)?;
    let reason = req.reason.filter(|r| !r.trim().is_empty());

    let db_state = state.clone();
    let (detail, event) = blocking(move || {
        db_state.db.with_tx(|tx| -> Result<_, ApiError> {
            let record = load(tx, id)?;
            let from = lifecycle::transition(&record, &claims, target)?;
            let now = Utc::now();
            set_status(tx, id, target, now)?;
            insert_status_change(
                tx,
                &StatusChange {
                    record_id: id,
                    from: Some(from),
                    to: target,
                    changed_by: Some(claims.sub),
                    reason: reason.clone(),
                    changed_at: now,
                },
            )?;

            let recipient = match record.owner.user_id() {
                Some(owner_id) => find_user(tx, owner_id)?.map(|u| Recipient {
                    name: u.name,
                    email: u.email,
                }),
                None => None,
            };

            info!("Record {} moved {} -> {} by {}", id, from, target, claims.email);
            let event = StatusChanged {
                record_id: id,
                title: record.title,
                from,
                to: target,
                reason,
                recipient,
            };
            Ok((load_detail(tx, id)?, event))
        })
    })
    .await?;

    // Committed; delivery runs detached.
    let _ = state.notifier.status_changed(event);

    Ok(Json(RecordEnvelope {
        message: format!("Record status updated to {}", target),
        record: detail.into(),
    }))
}
