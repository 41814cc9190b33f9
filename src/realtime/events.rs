use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::types::{GeoPoint, Ride};

/// Events pushed to subscribed clients. The `type` tag carries the event
/// name on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    NewRideRequest { ride: Ride },
    RideAccepted { ride: Ride },
    RideCanceled { ride: Ride },
    RideCompleted { ride: Ride },
    LocationUpdate { ride_id: Uuid, location: GeoPoint },
    Subscribed { topic: String },
    Unsubscribed { topic: String },
    Error { message: String },
}

/// Messages a connected client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    /// Live relay of the driver's position; not persisted. The REST
    /// endpoint is the durable path.
    LocationUpdate { ride_id: Uuid, location: GeoPoint },
}
