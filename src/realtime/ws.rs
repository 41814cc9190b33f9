//! Per-connection WebSocket session.
//!
//! The connection authenticates with an access token in the query string
//! (browsers cannot set headers on WebSocket requests), then subscribes to
//! the topics it is entitled to. The server pings every 30s and drops a
//! connection idle past 60s.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRef, Query, State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::claims::Caller,
    auth::jwt::JwtKeys,
    error::ApiError,
    realtime::events::{ClientMessage, ServerEvent},
    realtime::hub::{ConnId, Topic},
    state::AppState,
    store::types::{Role, UserUpdate},
    store::{RideStore, UserStore},
};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_access(&query.token)
        .map_err(|_| ApiError::Unauthorized("Token is not valid".into()))?;
    let caller = Caller::from(claims);
    Ok(ws.on_upgrade(move |socket| session(state, caller, socket)))
}

async fn session(state: AppState, caller: Caller, socket: WebSocket) {
    let conn_id: ConnId = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (mut sink, mut stream) = socket.split();
    let mut topics: HashSet<Topic> = HashSet::new();

    // Best-effort presence; the record may be gone if the profile was
    // deleted while a token was still valid.
    let _ = state
        .users
        .update(
            caller.id,
            UserUpdate {
                is_online: Some(true),
                ..Default::default()
            },
        )
        .await;
    debug!(user_id = %caller.id, %conn_id, "websocket session opened");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > CLIENT_TIMEOUT {
                    debug!(user_id = %caller.id, %conn_id, "websocket client timed out");
                    break;
                }
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                if !forward(&mut sink, &event).await {
                    break;
                }
            }
            message = stream.next() => {
                let Some(Ok(message)) = message else { break };
                last_seen = Instant::now();
                match message {
                    Message::Text(text) => {
                        handle_client_message(&state, &caller, conn_id, &tx, &mut topics, &text)
                            .await;
                    }
                    Message::Close(_) => break,
                    // Pings are answered by the protocol layer; pongs only
                    // refresh last_seen.
                    _ => {}
                }
            }
        }
    }

    for topic in &topics {
        state.hub.unsubscribe(topic, conn_id);
    }
    let _ = state
        .users
        .update(
            caller.id,
            UserUpdate {
                is_online: Some(false),
                ..Default::default()
            },
        )
        .await;
    debug!(user_id = %caller.id, %conn_id, "websocket session closed");
}

async fn forward(sink: &mut SplitSink<WebSocket, Message>, event: &ServerEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(text) => sink.send(Message::Text(text)).await.is_ok(),
        Err(error) => {
            warn!(%error, "failed to encode server event");
            true
        }
    }
}

async fn handle_client_message(
    state: &AppState,
    caller: &Caller,
    conn_id: ConnId,
    tx: &UnboundedSender<ServerEvent>,
    topics: &mut HashSet<Topic>,
    text: &str,
) {
    let reply = |event: ServerEvent| {
        // Replies ride the same queue as published events.
        let _ = tx.send(event);
    };

    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(_) => {
            reply(ServerEvent::Error {
                message: "Unrecognized message".into(),
            });
            return;
        }
    };

    match message {
        ClientMessage::Subscribe { topic } => {
            let Some(parsed) = Topic::parse(&topic) else {
                reply(ServerEvent::Error {
                    message: format!("Unknown topic: {topic}"),
                });
                return;
            };
            if let Err(message) = authorize_subscription(state, caller, &parsed).await {
                reply(ServerEvent::Error { message });
                return;
            }
            state.hub.subscribe(parsed, conn_id, tx.clone());
            topics.insert(parsed);
            reply(ServerEvent::Subscribed { topic });
        }
        ClientMessage::Unsubscribe { topic } => {
            let Some(parsed) = Topic::parse(&topic) else {
                reply(ServerEvent::Error {
                    message: format!("Unknown topic: {topic}"),
                });
                return;
            };
            state.hub.unsubscribe(&parsed, conn_id);
            topics.remove(&parsed);
            reply(ServerEvent::Unsubscribed { topic });
        }
        ClientMessage::LocationUpdate { ride_id, location } => {
            let Some(ride) = state.rides.get(ride_id).await else {
                reply(ServerEvent::Error {
                    message: "Ride not found".into(),
                });
                return;
            };
            if ride.driver_id != Some(caller.id) {
                reply(ServerEvent::Error {
                    message: "Only the assigned driver can update this ride".into(),
                });
                return;
            }
            state.hub.publish(
                &Topic::Ride(ride_id),
                &ServerEvent::LocationUpdate { ride_id, location },
            );
        }
    }
}

/// A client may watch the rides it is party to, its own feed, and — for
/// drivers — the dispatch feed.
async fn authorize_subscription(
    state: &AppState,
    caller: &Caller,
    topic: &Topic,
) -> Result<(), String> {
    match topic {
        Topic::Drivers => {
            if caller.role == Role::Driver {
                Ok(())
            } else {
                Err("Only drivers can subscribe to the dispatch feed".into())
            }
        }
        Topic::User(id) => {
            if *id == caller.id {
                Ok(())
            } else {
                Err("Cannot subscribe to another user's feed".into())
            }
        }
        Topic::Ride(id) => match state.rides.get(*id).await {
            Some(ride) if ride.rider_id == caller.id || ride.driver_id == Some(caller.id) => Ok(()),
            Some(_) => Err("Unauthorized to access this ride".into()),
            None => Err("Ride not found".into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{GeoPoint, Ride, RideStatus, RideType};
    use time::OffsetDateTime;

    fn caller(id: Uuid, role: Role) -> Caller {
        Caller {
            id,
            email: format!("{id}@example.com"),
            role,
        }
    }

    fn make_ride(rider: Uuid, driver: Option<Uuid>) -> Ride {
        let now = OffsetDateTime::now_utc();
        Ride {
            id: Uuid::new_v4(),
            rider_id: rider,
            driver_id: driver,
            status: if driver.is_some() {
                RideStatus::Accepted
            } else {
                RideStatus::Pending
            },
            pickup_location: GeoPoint {
                latitude: 1.0,
                longitude: 1.0,
            },
            dropoff_location: GeoPoint {
                latitude: 2.0,
                longitude: 2.0,
            },
            current_location: None,
            ride_type: RideType::Standard,
            estimated_price: 10.0,
            estimated_distance: 4.0,
            estimated_duration: 15.0,
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
        }
    }

    #[tokio::test]
    async fn subscription_authorization_rules() {
        let state = AppState::fake();
        let rider_id = Uuid::new_v4();
        let driver_id = Uuid::new_v4();
        let ride = make_ride(rider_id, Some(driver_id));
        let ride_id = ride.id;
        state.rides.insert(ride).await;

        let rider = caller(rider_id, Role::Rider);
        let driver = caller(driver_id, Role::Driver);
        let stranger = caller(Uuid::new_v4(), Role::Rider);

        // ride topic: parties only
        let topic = Topic::Ride(ride_id);
        assert!(authorize_subscription(&state, &rider, &topic).await.is_ok());
        assert!(authorize_subscription(&state, &driver, &topic).await.is_ok());
        assert!(authorize_subscription(&state, &stranger, &topic)
            .await
            .is_err());
        assert!(
            authorize_subscription(&state, &rider, &Topic::Ride(Uuid::new_v4()))
                .await
                .is_err()
        );

        // user topic: self only
        assert!(authorize_subscription(&state, &rider, &Topic::User(rider_id))
            .await
            .is_ok());
        assert!(
            authorize_subscription(&state, &rider, &Topic::User(driver_id))
                .await
                .is_err()
        );

        // dispatch feed: drivers only
        assert!(authorize_subscription(&state, &driver, &Topic::Drivers)
            .await
            .is_ok());
        assert!(authorize_subscription(&state, &rider, &Topic::Drivers)
            .await
            .is_err());
    }
}
