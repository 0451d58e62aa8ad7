//! IP geolocation trait.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::IpAddr;

/// Mean Earth radius in kilometers, for great-circle distance.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// IP geolocation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,

    /// Country code (ISO 3166-1 alpha-2), when the provider knows it.
    pub country: Option<String>,

    /// City, when the provider knows it.
    pub city: Option<String>,
}

impl GeoLocation {
    /// Create a location from coordinates.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            country: None,
            city: None,
        }
    }

    /// Great-circle distance to another location, in kilometers (haversine).
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// IP geolocation lookup.
///
/// Lookups may hit an external service and so may fail or hang; the risk
/// engine bounds every call with a short timeout and treats any failure as
/// an absent signal. Implementations should not retry internally.
pub trait GeoLocator: Send + Sync {
    /// Resolve an IP address to a location.
    ///
    /// Returns `Ok(None)` when the address cannot be located (private
    /// ranges, unknown ranges). Reserve `Err` for provider failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails; callers degrade to "no
    /// signal".
    fn locate(&self, ip: IpAddr) -> impl Future<Output = Result<Option<GeoLocation>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let paris = GeoLocation::new(48.8566, 2.3522);
        assert!(paris.distance_km(&paris) < 1e-9);
    }

    #[test]
    fn paris_to_london_is_about_344_km() {
        let paris = GeoLocation::new(48.8566, 2.3522);
        let london = GeoLocation::new(51.5074, -0.1278);
        let d = paris.distance_km(&london);
        assert!((d - 344.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let tokyo = GeoLocation::new(35.6762, 139.6503);
        let sydney = GeoLocation::new(-33.8688, 151.2093);
        let ab = tokyo.distance_km(&sydney);
        let ba = sydney.distance_km(&tokyo);
        assert!((ab - ba).abs() < 1e-6);
    }
}
