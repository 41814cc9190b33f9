use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::types::Role;

/// Access-token payload; carries the full caller identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,     // user ID
    pub email: String, // user email
    pub role: Role,    // rider | driver | admin
    pub iat: usize,    // issued at (unix timestamp)
    pub exp: usize,    // expires at (unix timestamp)
}

/// Refresh-token payload; identity only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}

/// The identity decoded from a verified bearer credential; consumed by every
/// authenticated handler.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<AccessClaims> for Caller {
    fn from(claims: AccessClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}
