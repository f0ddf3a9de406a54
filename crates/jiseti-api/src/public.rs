//! Endpoints that need no account: the public feed, anonymous submission,
//! and tracking-token lookup.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use jiseti_db::records::{
    RecordQuery, find_by_tracking_token, insert_media, insert_record, insert_status_change,
    list_records,
};
use jiseti_types::api::{
    AnonymousReportResponse, CreateRecordRequest, RecordFilterQuery, RecordList, RecordResponse,
};
use jiseti_types::models::Owner;

use crate::error::{ApiError, is_violation_on};
use crate::lifecycle;
use crate::records::load_detail;
use crate::state::{AppState, blocking};
use crate::validation;

const TOKEN_BYTES: usize = 24;
const TOKEN_ATTEMPTS: usize = 5;

fn generate_tracking_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Everything past draft, newest first. Filtering on `draft` is allowed and
/// simply matches nothing.
pub async fn list_public(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<RecordFilterQuery>, ApiError>,
) -> Result<Json<RecordList>, ApiError> {
    let (status, record_type) = validation::record_filters(&query)?;
    let query = RecordQuery::public().with_status(status).with_type(record_type);

    let records = blocking(move || Ok(state.db.with_conn(|conn| list_records(conn, &query))?)).await?;

    Ok(Json(RecordList {
        records: records.into_iter().map(RecordResponse::from).collect(),
    }))
}

/// A draft is reported as missing rather than forbidden so its existence
/// is not revealed.
pub async fn get_public(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<RecordResponse>, ApiError> {
    let detail = blocking(move || {
        state.db.with_conn(|conn| -> Result<_, ApiError> {
            let detail = load_detail(conn, id)?;
            if !lifecycle::can_view(&detail.record, None) {
                return Err(ApiError::NotFound("Record"));
            }
            Ok(detail)
        })
    })
    .await?;

    Ok(Json(detail.into()))
}

pub async fn submit_report(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CreateRecordRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = validation::new_record(&req)?;

    let (token, detail) = blocking(move || {
        state.db.with_tx(|tx| -> Result<_, ApiError> {
            let mut attempt = 1;
            let record = loop {
                let owner = Owner::Anonymous {
                    tracking_token: generate_tracking_token(),
                };
                let (record, media) = lifecycle::create(&fields, owner, Utc::now());
                match insert_record(tx, &record) {
                    Ok(()) => {
                        insert_status_change(tx, &lifecycle::opened(&record))?;
                        for m in &media {
                            insert_media(tx, m)?;
                        }
                        break record;
                    }
                    Err(e)
                        if attempt < TOKEN_ATTEMPTS
                            && is_violation_on(&e, "records.tracking_token") =>
                    {
                        attempt += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            };

            info!("Anonymous report {} submitted", record.id);
            let token = record.owner.tracking_token().unwrap_or_default().to_string();
            Ok((token, load_detail(tx, record.id)?))
        })
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AnonymousReportResponse {
            message: "Report submitted anonymously. Keep your tracking token to follow its progress."
                .into(),
            tracking_token: token,
            record: detail.into(),
        }),
    ))
}

pub async fn track(
    State(state): State<AppState>,
    WithRejection(Path(token), _): WithRejection<Path<String>, ApiError>,
) -> Result<Json<RecordResponse>, ApiError> {
    let detail = blocking(move || {
        state
            .db
            .with_conn(|conn| find_by_tracking_token(conn, token.trim()))?
            .ok_or(ApiError::NotFound("Record"))
    })
    .await?;

    Ok(Json(detail.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_tokens_are_url_safe_and_distinct() {
        let a = generate_tracking_token();
        let b = generate_tracking_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
