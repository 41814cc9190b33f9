use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::dto::MessageResponse,
    auth::extractors::AuthUser,
    auth::handlers::is_valid_email,
    error::ApiError,
    state::AppState,
    store::types::{GeoPoint, Role, UserUpdate},
    store::{RefreshTokenStore, UserStore},
    users::dto::{
        DriverModeRequest, DriverModeResponse, LocationResponse, ProfileResponse,
        UpdateLocationRequest, UpdateProfileRequest, UserView,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/profile",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/users/location", put(update_location))
        .route("/users/driver-mode", put(set_driver_mode))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .users
        .get(caller.id)
        .await
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(ProfileResponse {
        success: true,
        user: UserView::from(user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let email = match payload.email {
        Some(email) => {
            let email = email.trim().to_lowercase();
            if !is_valid_email(&email) {
                return Err(ApiError::Validation("Invalid email".into()));
            }
            Some(email)
        }
        None => None,
    };

    let user = state
        .users
        .update(
            caller.id,
            UserUpdate {
                name: payload.name,
                email,
                phone_number: payload.phone_number,
                profile_img: payload.profile_img,
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(ProfileResponse {
        success: true,
        user: UserView::from(user),
    }))
}

#[instrument(skip(state))]
pub async fn delete_profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.users.remove(caller.id).await {
        return Err(ApiError::NotFound("User not found".into()));
    }
    state.tokens.remove_for_user(caller.id).await;
    info!(user_id = %caller.id, "user profile deleted");
    Ok(Json(MessageResponse {
        success: true,
        message: "User deleted successfully".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_location(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<LocationResponse>, ApiError> {
    let (Some(latitude), Some(longitude)) = (payload.latitude, payload.longitude) else {
        return Err(ApiError::Validation("Invalid location data".into()));
    };
    let location = GeoPoint {
        latitude,
        longitude,
    };
    if !location.is_valid() {
        return Err(ApiError::Validation("Invalid location data".into()));
    }

    state
        .users
        .update(
            caller.id,
            UserUpdate {
                location: Some(location),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(LocationResponse {
        success: true,
        message: "Location updated successfully".into(),
        location,
    }))
}

#[instrument(skip(state, payload))]
pub async fn set_driver_mode(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<DriverModeRequest>,
) -> Result<Json<DriverModeResponse>, ApiError> {
    if caller.role != Role::Driver {
        return Err(ApiError::Forbidden(
            "Only drivers can toggle driver mode".into(),
        ));
    }

    let user = state
        .users
        .update(
            caller.id,
            UserUpdate {
                is_driver_mode: Some(payload.is_driver_mode),
                ..Default::default()
            },
        )
        .await?;

    let message = if user.is_driver_mode {
        "Driver mode enabled"
    } else {
        "Driver mode disabled"
    };
    Ok(Json(DriverModeResponse {
        success: true,
        message: message.into(),
        is_driver_mode: user.is_driver_mode,
    }))
}
