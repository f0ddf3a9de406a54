use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use jiseti_db::votes::{delete_vote, tally, upsert_vote, user_vote};
use jiseti_types::api::{Claims, VoteRequest, VoteResponse};

use crate::error::ApiError;
use crate::lifecycle;
use crate::records::load;
use crate::state::{AppState, blocking};
use crate::validation;

/// Cast or overwrite the caller's vote. The counts come back from the vote
/// rows as they stand after the write.
pub async fn cast_vote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<VoteRequest>, ApiError>,
) -> Result<Json<VoteResponse>, ApiError> {
    let vote_type = validation::vote_type(req.vote_type.as_deref())?;

    let response = blocking(move || {
        state.db.with_tx(|tx| -> Result<_, ApiError> {
            let record = load(tx, id)?;
            lifecycle::authorize_vote(&record, &claims)?;
            upsert_vote(tx, id, claims.sub, vote_type, Utc::now())?;
            debug!("{} voted {} on {}", claims.email, vote_type.as_str(), id);

            let counts = tally(tx, id)?;
            Ok(VoteResponse {
                vote_count: counts.support,
                oppose_count: counts.oppose,
                user_vote: user_vote(tx, id, claims.sub)?,
            })
        })
    })
    .await?;

    Ok(Json(response))
}

/// Retract the caller's vote. Retracting a vote that was never cast is a no-op.
pub async fn remove_vote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<VoteResponse>, ApiError> {
    lifecycle::require_user(&claims, "Only users can vote on records")?;

    let response = blocking(move || {
        state.db.with_tx(|tx| -> Result<_, ApiError> {
            load(tx, id)?;
            delete_vote(tx, id, claims.sub)?;

            let counts = tally(tx, id)?;
            Ok(VoteResponse {
                vote_count: counts.support,
                oppose_count: counts.oppose,
                user_vote: None,
            })
        })
    })
    .await?;

    Ok(Json(response))
}
