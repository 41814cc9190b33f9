//! Repository layer: trait contracts shared by the in-memory store and any
//! future persistent implementation, plus the in-memory store itself.

pub mod memory;
pub mod types;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::claims::Caller;
use crate::error::ApiError;
use crate::rides::lifecycle::{RideCommand, RideEvent};
use types::{RefreshRecord, Ride, RideRole, RideStatus, User, UserUpdate};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user; fails with a conflict if the email is taken.
    async fn insert(&self, user: User) -> Result<(), ApiError>;
    async fn get(&self, id: Uuid) -> Option<User>;
    async fn find_by_email(&self, email: &str) -> Option<User>;
    /// Merges `update` into the record under its entry lock.
    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<User, ApiError>;
    /// Returns true if a record was removed.
    async fn remove(&self, id: Uuid) -> bool;
}

#[async_trait]
pub trait RideStore: Send + Sync {
    async fn insert(&self, ride: Ride);
    async fn get(&self, id: Uuid) -> Option<Ride>;
    /// Rides where the user is on the given side (or either side when `role`
    /// is None), optionally narrowed by status; newest-created first.
    async fn for_user(
        &self,
        user_id: Uuid,
        role: Option<RideRole>,
        status: Option<RideStatus>,
    ) -> Vec<Ride>;
    /// All pending rides, newest-created first.
    async fn pending(&self) -> Vec<Ride>;
    /// Runs a lifecycle command under the record's exclusive lock so
    /// concurrent transitions on one ride serialize.
    async fn apply(
        &self,
        id: Uuid,
        caller: &Caller,
        cmd: RideCommand,
    ) -> Result<(Ride, Vec<RideEvent>), ApiError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, token: String, user_id: Uuid, expires_at: OffsetDateTime);
    async fn get(&self, token: &str) -> Option<RefreshRecord>;
    /// Returns true if the token was tracked.
    async fn remove(&self, token: &str) -> bool;
    async fn remove_for_user(&self, user_id: Uuid);
}
