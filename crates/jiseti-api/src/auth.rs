use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use tracing::{error, info, warn};
use uuid::Uuid;

use jiseti_types::api::{
    AdminAuthResponse, AdminProfile, Claims, LoginRequest, ProfileResponse, SignupRequest,
    UpdateProfileRequest, UserAuthResponse, UserProfile,
};
use jiseti_types::models::{Actor, Administrator, NormalUser, Role};

use crate::error::{ApiError, is_violation_on};
use crate::state::{AppState, Settings, blocking};
use crate::validation;

const ADMIN_NUMBER_ATTEMPTS: usize = 5;

// Verified against when the email is unknown so both branches cost the same.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    hash_password("jiseti-timing-equalizer").unwrap_or_else(|e| {
        // An empty hash fails to parse, so unknown emails would answer faster.
        error!("Timing-equalizer hash unavailable, login timing now leaks account existence: {:#}", e);
        String::new()
    })
});

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn issue_token(settings: &Settings, actor: &dyn Actor) -> anyhow::Result<String> {
    let claims = Claims {
        sub: actor.id(),
        role: actor.role(),
        email: actor.email().to_string(),
        exp: (Utc::now() + settings.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

/// Signature and expiry check. Any failure is just "not authenticated".
pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

fn generate_admin_number() -> String {
    format!("ADM{:06}", rand::rng().random_range(0..1_000_000))
}

pub async fn user_signup(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<SignupRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let account = validation::signup(&req, state.settings.email_domain.as_deref())?;

    let response = blocking(move || {
        let user = NormalUser {
            id: Uuid::new_v4(),
            name: account.name,
            email: account.email,
            password_hash: hash_password(&account.password)?,
            created_at: Utc::now(),
        };
        state.db.create_user(&user)?;

        info!("User registered: {}", user.email);
        Ok(UserAuthResponse {
            access_token: issue_token(&state.settings, &user)?,
            user: UserProfile::from(&user),
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn admin_signup(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<SignupRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let account = validation::signup(&req, state.settings.email_domain.as_deref())?;
    let requested = req
        .admin_number
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    let response = blocking(move || {
        let mut admin = Administrator {
            id: Uuid::new_v4(),
            name: account.name,
            email: account.email,
            admin_number: requested.clone().unwrap_or_else(generate_admin_number),
            password_hash: hash_password(&account.password)?,
            created_at: Utc::now(),
        };

        let mut attempt = 1;
        loop {
            match state.db.create_admin(&admin) {
                Ok(()) => break,
                // Generated numbers may collide; a caller-chosen one may not.
                Err(e)
                    if requested.is_none()
                        && attempt < ADMIN_NUMBER_ATTEMPTS
                        && is_violation_on(&e, "administrators.admin_number") =>
                {
                    attempt += 1;
                    admin.admin_number = generate_admin_number();
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!("Administrator registered: {} ({})", admin.email, admin.admin_number);
        Ok(AdminAuthResponse {
            access_token: issue_token(&state.settings, &admin)?,
            admin: AdminProfile::from(&admin),
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn user_login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<Json<UserAuthResponse>, ApiError> {
    let creds = validation::login(&req)?;

    let response = blocking(move || {
        let user = state.db.get_user_by_email(&creds.email)?;
        let hash = user.as_ref().map_or(DUMMY_HASH.as_str(), |u| u.password_hash.as_str());
        let verified = verify_password(&creds.password, hash);

        let Some(user) = user.filter(|_| verified) else {
            warn!("Failed user login for {}", creds.email);
            return Err(ApiError::InvalidCredentials);
        };

        Ok(UserAuthResponse {
            access_token: issue_token(&state.settings, &user)?,
            user: UserProfile::from(&user),
        })
    })
    .await?;

    Ok(Json(response))
}

pub async fn admin_login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<Json<AdminAuthResponse>, ApiError> {
    let creds = validation::login(&req)?;

    let response = blocking(move || {
        let admin = state.db.get_admin_by_email(&creds.email)?;
        let hash = admin.as_ref().map_or(DUMMY_HASH.as_str(), |a| a.password_hash.as_str());
        let verified = verify_password(&creds.password, hash);

        let Some(admin) = admin.filter(|_| verified) else {
            warn!("Failed admin login for {}", creds.email);
            return Err(ApiError::InvalidCredentials);
        };

        Ok(AdminAuthResponse {
            access_token: issue_token(&state.settings, &admin)?,
            admin: AdminProfile::from(&admin),
        })
    })
    .await?;

    Ok(Json(response))
}

/// The caller's own account, looked up from the token subject.
pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let response = blocking(move || match claims.role {
        Role::User => {
            let user = state
                .db
                .get_user_by_id(claims.sub)?
                .ok_or(ApiError::NotFound("User"))?;
            Ok(ProfileResponse::User {
                user: UserProfile::from(&user),
            })
        }
        Role::Admin => {
            let admin = state
                .db
                .get_admin_by_id(claims.sub)?
                .ok_or(ApiError::NotFound("Administrator"))?;
            Ok(ProfileResponse::Admin {
                admin: AdminProfile::from(&admin),
            })
        }
    })
    .await?;

    Ok(Json(response))
}

/// Only the display name is editable; email and admin number stay fixed.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let name = validation::required(req.name.as_deref(), "name")?;

    let response = blocking(move || match claims.role {
        Role::User => {
            let user = state
                .db
                .rename_user(claims.sub, &name)?
                .ok_or(ApiError::NotFound("User"))?;
            info!("User {} renamed", user.email);
            Ok(ProfileResponse::User {
                user: UserProfile::from(&user),
            })
        }
        Role::Admin => {
            let admin = state
                .db
                .rename_admin(claims.sub, &name)?
                .ok_or(ApiError::NotFound("Administrator"))?;
            info!("Administrator {} renamed", admin.email);
            Ok(ProfileResponse::Admin {
                admin: AdminProfile::from(&admin),
            })
        }
    })
    .await?;

    Ok(Json(response))
}
