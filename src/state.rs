use std::sync::Arc;

use crate::config::AppConfig;
use crate::realtime::hub::Hub;
use crate::store::memory::{InMemoryRefreshTokenStore, InMemoryRideStore, InMemoryUserStore};
use crate::store::{RefreshTokenStore, RideStore, UserStore};

/// Shared application state. The stores are trait objects so a persistent
/// implementation can replace the in-memory one behind the same contract.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub rides: Arc<dyn RideStore>,
    pub tokens: Arc<dyn RefreshTokenStore>,
    pub hub: Arc<Hub>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            users: Arc::new(InMemoryUserStore::new()),
            rides: Arc::new(InMemoryRideStore::new()),
            tokens: Arc::new(InMemoryRefreshTokenStore::new()),
            hub: Arc::new(Hub::new()),
        }
    }

    /// Fresh state with test config; no environment access.
    pub fn fake() -> Self {
        Self::with_config(Arc::new(AppConfig::fake()))
    }
}
