use serde::{Deserialize, Serialize};

use crate::store::types::{GeoPoint, Ride, RideStatus, RideType};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRideRequest {
    #[serde(default)]
    pub pickup_location: Option<GeoPoint>,
    #[serde(default)]
    pub dropoff_location: Option<GeoPoint>,
    #[serde(default)]
    pub ride_type: Option<RideType>,
    pub estimated_price: f64,
    pub estimated_distance: f64,
    pub estimated_duration: f64,
}

#[derive(Debug, Serialize)]
pub struct RideResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub ride: Ride,
}

impl RideResponse {
    pub fn new(ride: Ride) -> Self {
        Self {
            success: true,
            message: None,
            ride,
        }
    }

    pub fn with_message(ride: Ride, message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ride,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RideListResponse {
    pub success: bool,
    pub count: usize,
    pub rides: Vec<Ride>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub status: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Kilometers.
    pub radius: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRideRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRideRequest {
    #[serde(default)]
    pub actual_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RateRideRequest {
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideLocationRequest {
    #[serde(default)]
    pub current_location: Option<GeoPoint>,
    #[serde(default)]
    pub status: Option<RideStatus>,
}
