use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, GoogleAuthRequest, LoginRequest, MessageResponse, RefreshResponse,
            RefreshTokenBody, RegisterRequest, UserSummary,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    error::ApiError,
    state::AppState,
    store::types::User,
    store::{RefreshTokenStore, UserStore},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/auth/google", post(google_auth))
}

/// Signs the access/refresh pair and tracks the refresh credential.
async fn issue_tokens(state: &AppState, user: &User) -> Result<(String, String), ApiError> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user)?;
    let (refresh_token, expires_at) = keys.sign_refresh(user.id)?;
    state
        .tokens
        .insert(refresh_token.clone(), user.id, expires_at)
        .await;
    Ok((access_token, refresh_token))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("Name is required".into()));
    }

    let mut user = User::new(name, payload.email, payload.role.unwrap_or_default());
    user.password_hash = Some(hash_password(&payload.password)?);

    // The store enforces email uniqueness atomically; a lost race surfaces
    // as the same conflict a pre-check would have caught.
    state.users.insert(user.clone()).await.map_err(|_| {
        warn!(email = %user.email, "email already registered");
        ApiError::Validation("User already exists".into())
    })?;

    let (access_token, refresh_token) = issue_tokens(&state, &user).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            user: UserSummary::from(&user),
            access_token,
            refresh_token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = state
        .users
        .find_by_email(&payload.email)
        .await
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::Validation("Invalid credentials".into())
        })?;

    // OAuth-only accounts carry no password hash.
    let Some(hash) = user.password_hash.as_deref() else {
        warn!(user_id = %user.id, "password login for oauth-only account");
        return Err(ApiError::Validation("Invalid credentials".into()));
    };

    if !verify_password(&payload.password, hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Validation("Invalid credentials".into()));
    }

    let (access_token, refresh_token) = issue_tokens(&state, &user).await?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        success: true,
        user: UserSummary::from(&user),
        access_token,
        refresh_token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn google_auth(
    State(state): State<AppState>,
    Json(mut payload): Json<GoogleAuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let user = match state.users.find_by_email(&payload.email).await {
        Some(user) => user,
        None => {
            let mut user = User::new(payload.name, payload.email, Default::default());
            user.google_id = Some(payload.google_id);
            state.users.insert(user.clone()).await?;
            info!(user_id = %user.id, "user created via google oauth");
            user
        }
    };

    let (access_token, refresh_token) = issue_tokens(&state, &user).await?;

    Ok(Json(AuthResponse {
        success: true,
        user: UserSummary::from(&user),
        access_token,
        refresh_token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenBody>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let invalid = || ApiError::Forbidden("Refresh token is invalid".into());

    // The credential must be tracked, still within its expiry, and carry a
    // valid signature; failing entries are dropped from the store.
    let record = state
        .tokens
        .get(&payload.refresh_token)
        .await
        .ok_or_else(invalid)?;

    if record.expires_at <= OffsetDateTime::now_utc() {
        state.tokens.remove(&payload.refresh_token).await;
        return Err(invalid());
    }

    let keys = JwtKeys::from_ref(&state);
    let claims = match keys.verify_refresh(&payload.refresh_token) {
        Ok(claims) => claims,
        Err(_) => {
            state.tokens.remove(&payload.refresh_token).await;
            return Err(invalid());
        }
    };

    let user = state.users.get(claims.sub).await.ok_or_else(invalid)?;
    let access_token = keys.sign_access(&user)?;

    Ok(Json(RefreshResponse {
        success: true,
        access_token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<RefreshTokenBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.tokens.remove(&payload.refresh_token).await;
    info!(user_id = %caller.id, "user logged out");
    Ok(Json(MessageResponse {
        success: true,
        message: "Logged out successfully".into(),
    }))
}
