//! Best-effort last known location
//!
//! Providers are queried in order (primary, then fallback). A provider that
//! has no fix, or fails (missing permission, unreadable file), is skipped;
//! if none has a fix the alert is sent with an "Unknown" location.

use crate::domain::types::{GeoLocation, LocationSource};
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

pub trait LocationProvider: Send + Sync {
    fn source(&self) -> LocationSource;

    /// Last fix this provider knows about, if any
    fn last_known(&self) -> anyhow::Result<Option<GeoLocation>>;
}

/// Fix file written by a positioning daemon: `{"lat": .., "lon": ..}`
#[derive(Debug, Deserialize)]
struct FixRecord {
    lat: f64,
    lon: f64,
}

/// Reads the latest fix from a JSON file
pub struct FixFileProvider {
    path: PathBuf,
    source: LocationSource,
}

impl FixFileProvider {
    pub fn new(path: impl Into<PathBuf>, source: LocationSource) -> Self {
        Self { path: path.into(), source }
    }
}

impl LocationProvider for FixFileProvider {
    fn source(&self) -> LocationSource {
        self.source
    }

    fn last_known(&self) -> anyhow::Result<Option<GeoLocation>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read fix file {}", self.path.display()))?;
        let fix: FixRecord = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse fix file {}", self.path.display()))?;

        if !fix.lat.is_finite()
            || !fix.lon.is_finite()
            || fix.lat.abs() > 90.0
            || fix.lon.abs() > 180.0
        {
            anyhow::bail!("fix out of range: {}, {}", fix.lat, fix.lon);
        }
        Ok(Some(GeoLocation::new(fix.lat, fix.lon, self.source)))
    }
}

/// A fixed, configured position
pub struct StaticProvider {
    location: GeoLocation,
}

impl StaticProvider {
    pub fn new(latitude: f64, longitude: f64, source: LocationSource) -> Self {
        Self { location: GeoLocation::new(latitude, longitude, source) }
    }
}

impl LocationProvider for StaticProvider {
    fn source(&self) -> LocationSource {
        self.location.source
    }

    fn last_known(&self) -> anyhow::Result<Option<GeoLocation>> {
        Ok(Some(self.location))
    }
}

/// Ordered chain of providers; first fix wins
#[derive(Default)]
pub struct LastKnownLocation {
    providers: Vec<Box<dyn LocationProvider>>,
}

impl LastKnownLocation {
    pub fn new(providers: Vec<Box<dyn LocationProvider>>) -> Self {
        Self { providers }
    }

    pub fn with_provider(mut self, provider: Box<dyn LocationProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn query(&self) -> Option<GeoLocation> {
        for provider in &self.providers {
            match provider.last_known() {
                Ok(Some(location)) => {
                    debug!(
                        source = %location.source.as_str(),
                        lat = %location.latitude,
                        lon = %location.longitude,
                        "location_fix"
                    );
                    return Some(location);
                }
                Ok(None) => {
                    debug!(source = %provider.source().as_str(), "location_no_fix");
                }
                Err(e) => {
                    warn!(source = %provider.source().as_str(), error = %e, "location_provider_failed");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct DeniedProvider;

    impl LocationProvider for DeniedProvider {
        fn source(&self) -> LocationSource {
            LocationSource::Gps
        }

        fn last_known(&self) -> anyhow::Result<Option<GeoLocation>> {
            anyhow::bail!("location permission denied")
        }
    }

    #[test]
    fn test_fix_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gps.json");
        fs::write(&path, r#"{"lat": 12.9716, "lon": 77.5946, "ts": 1700000000000}"#).unwrap();

        let provider = FixFileProvider::new(&path, LocationSource::Gps);
        let fix = provider.last_known().unwrap().unwrap();

        assert_eq!(fix, GeoLocation::new(12.9716, 77.5946, LocationSource::Gps));
    }

    #[test]
    fn test_missing_fix_file_is_none() {
        let dir = tempdir().unwrap();
        let provider = FixFileProvider::new(dir.path().join("gps.json"), LocationSource::Gps);
        assert_eq!(provider.last_known().unwrap(), None);
    }

    #[test]
    fn test_out_of_range_fix_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gps.json");
        fs::write(&path, r#"{"lat": 123.0, "lon": 0.0}"#).unwrap();

        assert!(FixFileProvider::new(&path, LocationSource::Gps).last_known().is_err());
    }

    #[test]
    fn test_primary_wins() {
        let chain = LastKnownLocation::default()
            .with_provider(Box::new(StaticProvider::new(1.0, 2.0, LocationSource::Gps)))
            .with_provider(Box::new(StaticProvider::new(3.0, 4.0, LocationSource::Network)));

        assert_eq!(chain.query().unwrap().source, LocationSource::Gps);
    }

    #[test]
    fn test_falls_back_when_primary_has_no_fix() {
        let dir = tempdir().unwrap();
        let chain = LastKnownLocation::default()
            .with_provider(Box::new(FixFileProvider::new(
                dir.path().join("missing.json"),
                LocationSource::Gps,
            )))
            .with_provider(Box::new(StaticProvider::new(3.0, 4.0, LocationSource::Network)));

        assert_eq!(chain.query(), Some(GeoLocation::new(3.0, 4.0, LocationSource::Network)));
    }

    #[test]
    fn test_falls_back_when_primary_fails() {
        let chain = LastKnownLocation::default()
            .with_provider(Box::new(DeniedProvider))
            .with_provider(Box::new(StaticProvider::new(3.0, 4.0, LocationSource::Network)));

        assert_eq!(chain.query().unwrap().source, LocationSource::Network);
    }

    #[test]
    fn test_no_providers_is_unknown() {
        assert_eq!(LastKnownLocation::default().query(), None);
        assert_eq!(LastKnownLocation::new(vec![Box::new(DeniedProvider)]).query(), None);
    }
}
