//! Topic-keyed subscriber registry. Events are published to a topic and
//! fan out only to connections subscribed to it; a client subscribes to the
//! rides and user feed it is a party to, nothing else.

use std::collections::HashMap;
use std::fmt;

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::realtime::events::ServerEvent;

/// A fan-out scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Parties to one ride.
    Ride(Uuid),
    /// A single user's feed.
    User(Uuid),
    /// The pending-ride dispatch feed for drivers.
    Drivers,
}

impl Topic {
    pub fn parse(s: &str) -> Option<Topic> {
        if s == "drivers" {
            return Some(Topic::Drivers);
        }
        let (kind, id) = s.split_once(':')?;
        let id = Uuid::parse_str(id).ok()?;
        match kind {
            "ride" => Some(Topic::Ride(id)),
            "user" => Some(Topic::User(id)),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Ride(id) => write!(f, "ride:{id}"),
            Topic::User(id) => write!(f, "user:{id}"),
            Topic::Drivers => f.write_str("drivers"),
        }
    }
}

pub type ConnId = Uuid;

/// Subscriber registry. Delivery is fire-and-forget over unbounded senders,
/// so publishing never blocks a request handler; a failed send means the
/// connection is gone and its entry is pruned.
#[derive(Default)]
pub struct Hub {
    topics: DashMap<Topic, HashMap<ConnId, UnboundedSender<ServerEvent>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: Topic, conn: ConnId, tx: UnboundedSender<ServerEvent>) {
        self.topics.entry(topic).or_default().insert(conn, tx);
    }

    pub fn unsubscribe(&self, topic: &Topic, conn: ConnId) {
        if let Some(mut subs) = self.topics.get_mut(topic) {
            subs.remove(&conn);
            let empty = subs.is_empty();
            drop(subs);
            if empty {
                self.topics.remove_if(topic, |_, subs| subs.is_empty());
            }
        }
    }

    /// Returns how many subscribers the event reached.
    pub fn publish(&self, topic: &Topic, event: &ServerEvent) -> usize {
        let Some(mut subs) = self.topics.get_mut(topic) else {
            return 0;
        };
        let mut delivered = 0;
        subs.retain(|_, tx| match tx.send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => false,
        });
        delivered
    }
}
