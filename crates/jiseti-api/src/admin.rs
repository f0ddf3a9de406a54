use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use axum_extra::extract::WithRejection;

use jiseti_db::records::{RecordQuery, count_records, list_records, store_stats};
use jiseti_types::api::{
    Claims, RecordPage, RecordPageQuery, RecordResponse, StatsResponse, UserList, UserSummary,
};

use crate::error::ApiError;
use crate::lifecycle::require_admin;
use crate::state::{AppState, blocking};
use crate::validation;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

const ADMIN_ONLY: &str = "Admin access required";

/// Clamp raw paging input: pages start at 1, `per_page` within 1..=100.
fn page_window(page: Option<u32>, per_page: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    (page, per_page)
}

fn page_count(total: u64, per_page: u32) -> u32 {
    total.div_ceil(u64::from(per_page)) as u32
}

/// Every record, filtered and paged. Count and slice come from one
/// transaction so they agree with each other.
pub async fn list_records_page(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(query), _): WithRejection<Query<RecordPageQuery>, ApiError>,
) -> Result<Json<RecordPage>, ApiError> {
    require_admin(&claims, ADMIN_ONLY)?;
    let (status, record_type) =
        validation::filters(query.status.as_deref(), query.record_type.as_deref())?;
    let (page, per_page) = page_window(query.page, query.per_page);

    let filter = RecordQuery::default()
        .with_status(status)
        .with_type(record_type);

    let (total, records) = blocking(move || {
        state.db.with_tx(|tx| -> Result<_, ApiError> {
            let total = count_records(tx, &filter)?;
            let records = list_records(tx, &filter.paged(page, per_page))?;
            Ok((total, records))
        })
    })
    .await?;

    Ok(Json(RecordPage {
        records: records.into_iter().map(RecordResponse::from).collect(),
        total,
        page,
        per_page,
        pages: page_count(total, per_page),
    }))
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<StatsResponse>, ApiError> {
    require_admin(&claims, ADMIN_ONLY)?;

    let stats = blocking(move || Ok(state.db.with_tx(|tx| store_stats(tx))?)).await?;

    let status_distribution: BTreeMap<String, u64> = stats
        .by_status
        .into_iter()
        .map(|(status, n)| (status.as_str().to_string(), n))
        .collect();
    let type_distribution: BTreeMap<String, u64> = stats
        .by_type
        .into_iter()
        .map(|(record_type, n)| (record_type.as_str().to_string(), n))
        .collect();

    Ok(Json(StatsResponse {
        total_records: stats.total_records,
        total_users: stats.total_users,
        total_admins: stats.total_admins,
        status_distribution,
        type_distribution,
    }))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserList>, ApiError> {
    require_admin(&claims, ADMIN_ONLY)?;

    let users = blocking(move || Ok(state.db.list_users()?)).await?;

    Ok(Json(UserList {
        users: users
            .into_iter()
            .map(|u| UserSummary {
                id: u.user.id,
                name: u.user.name,
                email: u.user.email,
                record_count: u.record_count,
                created_at: u.user.created_at,
            })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults_and_caps() {
        assert_eq!(page_window(None, None), (1, 20));
        assert_eq!(page_window(Some(0), Some(0)), (1, 1));
        assert_eq!(page_window(Some(3), Some(500)), (3, 100));
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(25, 10), 3);
        assert_eq!(page_count(20, 10), 2);
        assert_eq!(page_count(0, 10), 0);
    }
}
