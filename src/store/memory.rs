//! In-memory stores backed by `DashMap`; the source of truth for process
//! lifetime. Mutations run under the map entry's write guard, which is what
//! makes ride transitions serialize (see `RideStore::apply`).

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::claims::Caller;
use crate::error::ApiError;
use crate::rides::lifecycle::{self, RideCommand, RideEvent};
use crate::store::types::{RefreshRecord, Ride, RideRole, RideStatus, User, UserUpdate};
use crate::store::{RefreshTokenStore, RideStore, UserStore};

#[derive(Default)]
pub struct InMemoryUserStore {
    users: DashMap<Uuid, User>,
    /// Email uniqueness index: email -> user id.
    emails: DashMap<String, Uuid>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: User) -> Result<(), ApiError> {
        // Claim the email before touching the user map; the entry guard is
        // dropped at the end of the match so the two maps are never locked
        // at once here.
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => {
                return Err(ApiError::Conflict("User already exists".into()));
            }
            Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|u| u.clone())
    }

    async fn find_by_email(&self, email: &str) -> Option<User> {
        let id = *self.emails.get(email)?;
        self.users.get(&id).map(|u| u.clone())
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<User, ApiError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

        if let Some(email) = update.email {
            if email != user.email {
                match self.emails.entry(email.clone()) {
                    Entry::Occupied(_) => {
                        return Err(ApiError::Conflict("Email already in use".into()));
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(id);
                    }
                }
                self.emails.remove(&user.email);
                user.email = email;
            }
        }
        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(phone_number) = update.phone_number {
            user.phone_number = Some(phone_number);
        }
        if let Some(profile_img) = update.profile_img {
            user.profile_img = Some(profile_img);
        }
        if let Some(location) = update.location {
            user.location = Some(location);
        }
        if let Some(is_driver_mode) = update.is_driver_mode {
            user.is_driver_mode = is_driver_mode;
        }
        if let Some(is_online) = update.is_online {
            user.is_online = is_online;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn remove(&self, id: Uuid) -> bool {
        match self.users.remove(&id) {
            Some((_, user)) => {
                self.emails.remove(&user.email);
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
pub struct InMemoryRideStore {
    rides: DashMap<Uuid, Ride>,
}

impl InMemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(rides: &mut [Ride]) {
    rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl RideStore for InMemoryRideStore {
    async fn insert(&self, ride: Ride) {
        self.rides.insert(ride.id, ride);
    }

    async fn get(&self, id: Uuid) -> Option<Ride> {
        self.rides.get(&id).map(|r| r.clone())
    }

    async fn for_user(
        &self,
        user_id: Uuid,
        role: Option<RideRole>,
        status: Option<RideStatus>,
    ) -> Vec<Ride> {
        let mut rides: Vec<Ride> = self
            .rides
            .iter()
            .filter(|r| match role {
                Some(RideRole::Rider) => r.rider_id == user_id,
                Some(RideRole::Driver) => r.driver_id == Some(user_id),
                None => r.rider_id == user_id || r.driver_id == Some(user_id),
            })
            .filter(|r| status.map_or(true, |s| r.status == s))
            .map(|r| r.clone())
            .collect();
        newest_first(&mut rides);
        rides
    }

    async fn pending(&self) -> Vec<Ride> {
        let mut rides: Vec<Ride> = self
            .rides
            .iter()
            .filter(|r| r.status == RideStatus::Pending)
            .map(|r| r.clone())
            .collect();
        newest_first(&mut rides);
        rides
    }

    async fn apply(
        &self,
        id: Uuid,
        caller: &Caller,
        cmd: RideCommand,
    ) -> Result<(Ride, Vec<RideEvent>), ApiError> {
        let mut ride = self
            .rides
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound("Ride not found".into()))?;
        let events = lifecycle::apply(ride.value_mut(), caller, cmd, OffsetDateTime::now_utc())?;
        Ok((ride.clone(), events))
    }
}

#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: DashMap<String, RefreshRecord>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn insert(&self, token: String, user_id: Uuid, expires_at: OffsetDateTime) {
        self.tokens.insert(
            token,
            RefreshRecord {
                user_id,
                expires_at,
            },
        );
    }

    async fn get(&self, token: &str) -> Option<RefreshRecord> {
        self.tokens.get(token).map(|r| r.clone())
    }

    async fn remove(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }

    async fn remove_for_user(&self, user_id: Uuid) {
        self.tokens.retain(|_, record| record.user_id != user_id);
    }
}
