use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::ApiError,
    realtime::events::ServerEvent,
    realtime::hub::Topic,
    rides::dto::{
        AvailableQuery, CancelRideRequest, CompleteRideRequest, HistoryQuery, RateRideRequest,
        RequestRideRequest, RideListResponse, RideLocationRequest, RideResponse,
    },
    rides::geo::haversine_km,
    rides::lifecycle::{RideCommand, RideEvent},
    state::AppState,
    store::types::{GeoPoint, Ride, RideRole, RideStatus, Role},
    store::RideStore,
};

const DEFAULT_SEARCH_RADIUS_KM: f64 = 5.0;

pub fn ride_routes() -> Router<AppState> {
    Router::new()
        .route("/rides/request", post(request_ride))
        .route("/rides/user/history", get(ride_history))
        .route("/rides/available/requests", get(available_rides))
        .route("/rides/:id", get(get_ride))
        .route("/rides/:id/accept", put(accept_ride))
        .route("/rides/:id/cancel", put(cancel_ride))
        .route("/rides/:id/complete", put(complete_ride))
        .route("/rides/:id/rate", post(rate_ride))
        .route("/rides/:id/location", put(update_ride_location))
}

/// Maps lifecycle events onto topic publications.
fn publish_ride_events(state: &AppState, ride: &Ride, events: &[RideEvent]) {
    for event in events {
        match event {
            RideEvent::Accepted => {
                let accepted = ServerEvent::RideAccepted { ride: ride.clone() };
                state.hub.publish(&Topic::Ride(ride.id), &accepted);
                state.hub.publish(&Topic::User(ride.rider_id), &accepted);
            }
            RideEvent::Canceled => {
                state
                    .hub
                    .publish(&Topic::Ride(ride.id), &ServerEvent::RideCanceled {
                        ride: ride.clone(),
                    });
            }
            RideEvent::Completed => {
                state
                    .hub
                    .publish(&Topic::Ride(ride.id), &ServerEvent::RideCompleted {
                        ride: ride.clone(),
                    });
            }
            RideEvent::LocationUpdated => {
                if let Some(location) = ride.current_location {
                    state
                        .hub
                        .publish(&Topic::Ride(ride.id), &ServerEvent::LocationUpdate {
                            ride_id: ride.id,
                            location,
                        });
                }
            }
            RideEvent::Started | RideEvent::Rated => {}
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn request_ride(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<RequestRideRequest>,
) -> Result<(StatusCode, Json<RideResponse>), ApiError> {
    if caller.role != Role::Rider {
        return Err(ApiError::Forbidden("Only riders can request rides".into()));
    }
    let (Some(pickup_location), Some(dropoff_location)) =
        (payload.pickup_location, payload.dropoff_location)
    else {
        return Err(ApiError::Validation(
            "Pickup and dropoff locations are required".into(),
        ));
    };
    if !pickup_location.is_valid() || !dropoff_location.is_valid() {
        return Err(ApiError::Validation("Invalid location data".into()));
    }

    let now = OffsetDateTime::now_utc();
    let ride = Ride {
        id: Uuid::new_v4(),
        rider_id: caller.id,
        driver_id: None,
        status: RideStatus::Pending,
        pickup_location,
        dropoff_location,
        current_location: None,
        ride_type: payload.ride_type.unwrap_or_default(),
        estimated_price: payload.estimated_price,
        estimated_distance: payload.estimated_distance,
        estimated_duration: payload.estimated_duration,
        actual_price: None,
        start_time: None,
        end_time: None,
        cancel_reason: None,
        canceled_by: None,
        driver_rating: None,
        driver_comment: None,
        rider_rating: None,
        rider_comment: None,
        version: 0,
        created_at: now,
        updated_at: now,
    };
    state.rides.insert(ride.clone()).await;

    state
        .hub
        .publish(&Topic::Drivers, &ServerEvent::NewRideRequest {
            ride: ride.clone(),
        });

    info!(ride_id = %ride.id, rider_id = %caller.id, "ride requested");
    Ok((StatusCode::CREATED, Json(RideResponse::new(ride))))
}

#[instrument(skip(state))]
pub async fn accept_ride(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    let (ride, events) = state.rides.apply(id, &caller, RideCommand::Accept).await?;
    publish_ride_events(&state, &ride, &events);
    info!(ride_id = %id, driver_id = %caller.id, "ride accepted");
    Ok(Json(RideResponse::new(ride)))
}

#[instrument(skip(state))]
pub async fn get_ride(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RideResponse>, ApiError> {
    let ride = state
        .rides
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound("Ride not found".into()))?;
    if ride.rider_id != caller.id && ride.driver_id != Some(caller.id) {
        return Err(ApiError::Forbidden(
            "Unauthorized to access this ride".into(),
        ));
    }
    Ok(Json(RideResponse::new(ride)))
}

#[instrument(skip(state))]
pub async fn ride_history(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<RideListResponse>, ApiError> {
    let role = match query.role.as_deref() {
        None => None,
        Some("rider") => Some(RideRole::Rider),
        Some("driver") => Some(RideRole::Driver),
        Some(_) => return Err(ApiError::Validation("Invalid role filter".into())),
    };
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(
            s.parse::<RideStatus>()
                .map_err(|_| ApiError::Validation("Invalid status filter".into()))?,
        ),
    };

    let rides = state.rides.for_user(caller.id, role, status).await;
    Ok(Json(RideListResponse {
        success: true,
        count: rides.len(),
        rides,
    }))
}

#[instrument(skip(state, payload))]
pub async fn cancel_ride(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRideRequest>,
) -> Result<Json<RideResponse>, ApiError> {
    let (ride, events) = state
        .rides
        .apply(
            id,
            &caller,
            RideCommand::Cancel {
                reason: payload.reason,
            },
        )
        .await?;
    publish_ride_events(&state, &ride, &events);
    info!(ride_id = %id, user_id = %caller.id, "ride canceled");
    Ok(Json(RideResponse::with_message(
        ride,
        "Ride canceled successfully",
    )))
}

#[instrument(skip(state, payload))]
pub async fn complete_ride(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteRideRequest>,
) -> Result<Json<RideResponse>, ApiError> {
    let (ride, events) = state
        .rides
        .apply(
            id,
            &caller,
            RideCommand::Complete {
                actual_price: payload.actual_price,
            },
        )
        .await?;
    publish_ride_events(&state, &ride, &events);
    info!(ride_id = %id, driver_id = %caller.id, "ride completed");
    Ok(Json(RideResponse::with_message(
        ride,
        "Ride completed successfully",
    )))
}

#[instrument(skip(state, payload))]
pub async fn rate_ride(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RateRideRequest>,
) -> Result<Json<RideResponse>, ApiError> {
    // Fails on a bad score before the ride is even looked up.
    if !(1..=5).contains(&payload.rating) {
        return Err(ApiError::Validation(
            "Rating must be between 1 and 5".into(),
        ));
    }
    let (ride, _) = state
        .rides
        .apply(
            id,
            &caller,
            RideCommand::Rate {
                score: payload.rating,
                comment: payload.comment,
            },
        )
        .await?;
    info!(ride_id = %id, user_id = %caller.id, "ride rated");
    Ok(Json(RideResponse::with_message(
        ride,
        "Rating submitted successfully",
    )))
}

#[instrument(skip(state))]
pub async fn available_rides(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(query): Query<AvailableQuery>,
) -> Result<Json<RideListResponse>, ApiError> {
    if caller.role != Role::Driver {
        return Err(ApiError::Forbidden(
            "Only drivers can view available rides".into(),
        ));
    }

    let mut rides = state.rides.pending().await;
    if let (Some(latitude), Some(longitude)) = (query.latitude, query.longitude) {
        let origin = GeoPoint {
            latitude,
            longitude,
        };
        if !origin.is_valid() {
            return Err(ApiError::Validation("Invalid location data".into()));
        }
        let radius = query.radius.unwrap_or(DEFAULT_SEARCH_RADIUS_KM);
        rides.retain(|ride| haversine_km(&origin, &ride.pickup_location) <= radius);
    }

    Ok(Json(RideListResponse {
        success: true,
        count: rides.len(),
        rides,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_ride_location(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RideLocationRequest>,
) -> Result<Json<RideResponse>, ApiError> {
    if let Some(location) = &payload.current_location {
        if !location.is_valid() {
            return Err(ApiError::Validation("Invalid location data".into()));
        }
    }
    let (ride, events) = state
        .rides
        .apply(
            id,
            &caller,
            RideCommand::DriverUpdate {
                location: payload.current_location,
                status: payload.status,
            },
        )
        .await?;
    publish_ride_events(&state, &ride, &events);
    Ok(Json(RideResponse::with_message(
        ride,
        "Ride updated successfully",
    )))
}
