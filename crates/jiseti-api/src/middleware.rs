use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::auth::verify_token;
use crate::error::ApiError;
use crate::state::AppState;

/// Extract and validate the bearer token, then hand the claims to the
/// handler through request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthenticated)?;

    let claims =
        verify_token(&state.settings.jwt_secret, bearer.token()).ok_or(ApiError::Unauthenticated)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
