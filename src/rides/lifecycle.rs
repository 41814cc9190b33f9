//! The single authority for ride status transitions.
//!
//! Every entry point that mutates a ride — the dedicated accept / cancel /
//! complete / rate endpoints and the driver location-update endpoint — builds
//! a [`RideCommand`] and runs it through [`apply`]. The store executes
//! [`apply`] under the record's exclusive lock, so concurrent commands on one
//! ride serialize and "first accept wins" holds.

use time::OffsetDateTime;

use crate::auth::claims::Caller;
use crate::error::ApiError;
use crate::store::types::{GeoPoint, Ride, RideStatus, Role};

/// A lifecycle mutation requested by a caller.
#[derive(Debug, Clone)]
pub enum RideCommand {
    Accept,
    Cancel { reason: Option<String> },
    Complete { actual_price: Option<f64> },
    Rate { score: u8, comment: Option<String> },
    /// Driver-reported location and/or status change; the status change goes
    /// through the same transition table as the dedicated endpoints.
    DriverUpdate {
        location: Option<GeoPoint>,
        status: Option<RideStatus>,
    },
}

/// What a successful command did; drives realtime publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideEvent {
    Accepted,
    Started,
    Completed,
    Canceled,
    Rated,
    LocationUpdated,
}

/// The transition table. `canceled` is reachable from `pending` and
/// `accepted` only, on every path.
pub fn transition_allowed(from: RideStatus, to: RideStatus) -> bool {
    use RideStatus::*;
    matches!(
        (from, to),
        (Pending, Accepted)
            | (Pending, Canceled)
            | (Accepted, InProgress)
            | (Accepted, Canceled)
            | (InProgress, Completed)
    )
}

fn is_party(ride: &Ride, caller: &Caller) -> bool {
    ride.rider_id == caller.id || ride.driver_id == Some(caller.id)
}

/// Validates and applies `cmd` to `ride`. On success bumps the record
/// version and `updated_at`; on failure the ride is untouched.
pub fn apply(
    ride: &mut Ride,
    caller: &Caller,
    cmd: RideCommand,
    now: OffsetDateTime,
) -> Result<Vec<RideEvent>, ApiError> {
    let events = match cmd {
        RideCommand::Accept => accept(ride, caller)?,
        RideCommand::Cancel { reason } => cancel(ride, caller, reason)?,
        RideCommand::Complete { actual_price } => complete(ride, caller, actual_price, now)?,
        RideCommand::Rate { score, comment } => rate(ride, caller, score, comment)?,
        RideCommand::DriverUpdate { location, status } => {
            driver_update(ride, caller, location, status, now)?
        }
    };
    ride.version += 1;
    ride.updated_at = now;
    Ok(events)
}

fn accept(ride: &mut Ride, caller: &Caller) -> Result<Vec<RideEvent>, ApiError> {
    if caller.role != Role::Driver {
        return Err(ApiError::Forbidden(
            "Only drivers can accept rides".into(),
        ));
    }
    if !transition_allowed(ride.status, RideStatus::Accepted) {
        return Err(ApiError::Conflict(format!(
            "Ride cannot be accepted. Current status: {}",
            ride.status
        )));
    }
    ride.driver_id = Some(caller.id);
    ride.status = RideStatus::Accepted;
    Ok(vec![RideEvent::Accepted])
}

fn cancel(
    ride: &mut Ride,
    caller: &Caller,
    reason: Option<String>,
) -> Result<Vec<RideEvent>, ApiError> {
    if !is_party(ride, caller) {
        return Err(ApiError::Forbidden("Unauthorized to cancel this ride".into()));
    }
    if !transition_allowed(ride.status, RideStatus::Canceled) {
        return Err(ApiError::Conflict(format!(
            "Ride cannot be canceled. Current status: {}",
            ride.status
        )));
    }
    ride.status = RideStatus::Canceled;
    ride.cancel_reason = reason;
    ride.canceled_by = Some(caller.id);
    Ok(vec![RideEvent::Canceled])
}

fn complete(
    ride: &mut Ride,
    caller: &Caller,
    actual_price: Option<f64>,
    now: OffsetDateTime,
) -> Result<Vec<RideEvent>, ApiError> {
    if ride.driver_id != Some(caller.id) {
        return Err(ApiError::Forbidden(
            "Only the assigned driver can complete this ride".into(),
        ));
    }
    if !transition_allowed(ride.status, RideStatus::Completed) {
        return Err(ApiError::Conflict(format!(
            "Ride cannot be completed. Current status: {}",
            ride.status
        )));
    }
    finish(ride, actual_price, now);
    Ok(vec![RideEvent::Completed])
}

fn rate(
    ride: &mut Ride,
    caller: &Caller,
    score: u8,
    comment: Option<String>,
) -> Result<Vec<RideEvent>, ApiError> {
    if !(1..=5).contains(&score) {
        return Err(ApiError::Validation(
            "Rating must be between 1 and 5".into(),
        ));
    }
    if !is_party(ride, caller) {
        return Err(ApiError::Forbidden("Unauthorized to rate this ride".into()));
    }
    if ride.status != RideStatus::Completed {
        return Err(ApiError::Conflict(
            "Only completed rides can be rated".into(),
        ));
    }
    // Rider rates the driver and vice versa; one rating per direction.
    if ride.rider_id == caller.id {
        if ride.driver_rating.is_some() {
            return Err(ApiError::Conflict("Ride already rated".into()));
        }
        ride.driver_rating = Some(score);
        ride.driver_comment = comment;
    } else {
        if ride.rider_rating.is_some() {
            return Err(ApiError::Conflict("Ride already rated".into()));
        }
        ride.rider_rating = Some(score);
        ride.rider_comment = comment;
    }
    Ok(vec![RideEvent::Rated])
}

fn driver_update(
    ride: &mut Ride,
    caller: &Caller,
    location: Option<GeoPoint>,
    status: Option<RideStatus>,
    now: OffsetDateTime,
) -> Result<Vec<RideEvent>, ApiError> {
    if ride.driver_id != Some(caller.id) {
        return Err(ApiError::Forbidden(
            "Only the assigned driver can update this ride".into(),
        ));
    }
    // Validate before mutating anything; the record must stay untouched on
    // failure.
    if let Some(to) = status {
        if !transition_allowed(ride.status, to) {
            return Err(ApiError::Conflict(format!(
                "Cannot update status from {} to {}",
                ride.status, to
            )));
        }
    }

    let mut events = Vec::new();
    if let Some(point) = location {
        ride.current_location = Some(point);
        events.push(RideEvent::LocationUpdated);
    }
    match status {
        Some(RideStatus::InProgress) => {
            ride.status = RideStatus::InProgress;
            if ride.start_time.is_none() {
                ride.start_time = Some(now);
            }
            events.push(RideEvent::Started);
        }
        Some(RideStatus::Completed) => {
            finish(ride, None, now);
            events.push(RideEvent::Completed);
        }
        Some(RideStatus::Canceled) => {
            ride.status = RideStatus::Canceled;
            ride.canceled_by = Some(caller.id);
            events.push(RideEvent::Canceled);
        }
        Some(RideStatus::Pending) | Some(RideStatus::Accepted) | None => {}
    }
    Ok(events)
}

fn finish(ride: &mut Ride, actual_price: Option<f64>, now: OffsetDateTime) {
    ride.status = RideStatus::Completed;
    ride.actual_price = Some(actual_price.unwrap_or(ride.estimated_price));
    ride.end_time = Some(now);
}
