//! Mock geolocation provider for testing.

use crate::error::{GuardError, Result};
use crate::providers::{GeoLocation, GeoLocator};
use dashmap::DashMap;
use std::future::Future;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory geolocation lookup over a fixed table.
#[derive(Debug, Clone, Default)]
pub struct MockGeoLocator {
    locations: Arc<DashMap<IpAddr, GeoLocation>>,
    failing: Arc<AtomicBool>,
}

impl MockGeoLocator {
    /// Create a locator that knows no addresses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a known address.
    #[must_use]
    pub fn with_location(self, ip: IpAddr, location: GeoLocation) -> Self {
        self.locations.insert(ip, location);
        self
    }

    /// Register or replace a known address after construction.
    pub fn set_location(&self, ip: IpAddr, location: GeoLocation) {
        self.locations.insert(ip, location);
    }

    /// Make subsequent lookups fail (simulated provider outage).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl GeoLocator for MockGeoLocator {
    fn locate(&self, ip: IpAddr) -> impl Future<Output = Result<Option<GeoLocation>>> + Send {
        let failing = self.failing.load(Ordering::SeqCst);
        let found = self.locations.get(&ip).map(|entry| entry.clone());

        async move {
            if failing {
                return Err(GuardError::Internal("geolocation outage".to_string()));
            }
            Ok(found)
        }
    }
}
