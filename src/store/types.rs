use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Rider,
    Driver,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::Rider
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// User record in the store.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Argon2 hash; None for OAuth-only accounts.
    pub password_hash: Option<String>,
    pub role: Role,
    pub phone_number: Option<String>,
    pub profile_img: Option<String>,
    pub google_id: Option<String>,
    pub is_online: bool,
    /// Meaningful only when role is driver.
    pub is_driver_mode: bool,
    pub location: Option<GeoPoint>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn new(name: String, email: String, role: Role) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash: None,
            role,
            phone_number: None,
            profile_img: None,
            google_id: None,
            is_online: false,
            is_driver_mode: false,
            location: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial profile mutation applied under the record's entry lock.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub profile_img: Option<String>,
    pub location: Option<GeoPoint>,
    pub is_driver_mode: Option<bool>,
    pub is_online: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Canceled,
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RideStatus::Pending => "pending",
            RideStatus::Accepted => "accepted",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

impl FromStr for RideStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RideStatus::Pending),
            "accepted" => Ok(RideStatus::Accepted),
            "in_progress" => Ok(RideStatus::InProgress),
            "completed" => Ok(RideStatus::Completed),
            "canceled" => Ok(RideStatus::Canceled),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideType {
    Standard,
    Premium,
    Shared,
}

impl Default for RideType {
    fn default() -> Self {
        RideType::Standard
    }
}

/// Ownership side used when filtering ride history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideRole {
    Rider,
    Driver,
}

/// A single trip record moving through its status lifecycle.
///
/// Never deleted once created. `driver_id` is assigned exactly when the ride
/// leaves `pending` via accept; `actual_price` and `end_time` are set exactly
/// when the ride completes. `version` is bumped on every successful mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub status: RideStatus,
    pub pickup_location: GeoPoint,
    pub dropoff_location: GeoPoint,
    pub current_location: Option<GeoPoint>,
    pub ride_type: RideType,
    pub estimated_price: f64,
    /// Kilometers.
    pub estimated_distance: f64,
    /// Minutes.
    pub estimated_duration: f64,
    pub actual_price: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    pub cancel_reason: Option<String>,
    pub canceled_by: Option<Uuid>,
    /// Rating of the driver, given by the rider.
    pub driver_rating: Option<u8>,
    pub driver_comment: Option<String>,
    /// Rating of the rider, given by the driver.
    pub rider_rating: Option<u8>,
    pub rider_comment: Option<String>,
    #[serde(skip_serializing)]
    pub version: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Tracked refresh credential: token string maps to this record.
#[derive(Debug, Clone)]
pub struct RefreshRecord {
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}
