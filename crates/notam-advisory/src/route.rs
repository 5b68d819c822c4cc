//! Route airspace lookup.
//!
//! Airspaces along a route are looked up by departure/arrival pair. Centers
//! and radii are placeholders, not geocoded positions: every airspace sits at
//! (0, 0) with a 15 km radius. NOTAM matching only compares identifiers.

use std::collections::HashMap;

use notam_proto::{AirspaceInfo, Coordinate};

/// Radius given to every looked-up airspace.
pub const PLACEHOLDER_RADIUS_KM: f64 = 15.0;

/// Static table of known routes.
#[derive(Debug, Clone)]
pub struct RouteCatalog {
    routes: HashMap<(String, String), Vec<String>>,
}

impl RouteCatalog {
    /// Create a catalog with no known routes. Every pair resolves to
    /// `[departure, arrival]`.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register or replace a route.
    #[must_use]
    pub fn with_route<I, S>(mut self, departure: &str, arrival: &str, waypoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes.insert(
            (departure.to_string(), arrival.to_string()),
            waypoints.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Airspaces traversed from `departure` to `arrival`, in order.
    #[must_use]
    pub fn airspaces_for(&self, departure: &str, arrival: &str) -> Vec<AirspaceInfo> {
        let key = (departure.to_string(), arrival.to_string());
        match self.routes.get(&key) {
            Some(waypoints) => waypoints.iter().map(|id| placeholder(id)).collect(),
            None => vec![placeholder(departure), placeholder(arrival)],
        }
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for RouteCatalog {
    fn default() -> Self {
        Self::empty()
            .with_route("CYYZ", "KJFK", ["CYYZ", "KBUF", "KJFK"])
            .with_route("CYKF", "CYUL", ["CYKF", "CYOW", "CYUL"])
    }
}

fn placeholder(identifier: &str) -> AirspaceInfo {
    AirspaceInfo::new(identifier, Coordinate::default(), PLACEHOLDER_RADIUS_KM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn ids(airspaces: &[AirspaceInfo]) -> Vec<&str> {
        airspaces.iter().map(|a| a.identifier.as_str()).collect()
    }

    #[test_case("CYYZ", "KJFK", &["CYYZ", "KBUF", "KJFK"] ; "toronto to new york")]
    #[test_case("CYKF", "CYUL", &["CYKF", "CYOW", "CYUL"] ; "waterloo to montreal")]
    #[test_case("KJFK", "CYYZ", &["KJFK", "CYYZ"] ; "reverse direction is unknown")]
    #[test_case("EGLL", "LFPG", &["EGLL", "LFPG"] ; "unknown pair")]
    fn test_default_routes(dep: &str, arr: &str, expected: &[&str]) {
        let catalog = RouteCatalog::default();
        assert_eq!(ids(&catalog.airspaces_for(dep, arr)), expected);
    }

    #[test]
    fn test_placeholder_geometry() {
        let airspaces = RouteCatalog::default().airspaces_for("CYYZ", "KJFK");
        for airspace in &airspaces {
            assert_eq!(airspace.center, Coordinate::new(0.0, 0.0));
            assert!((airspace.radius_km - PLACEHOLDER_RADIUS_KM).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_custom_route() {
        let catalog = RouteCatalog::empty().with_route("EGLL", "LFPG", ["EGLL", "EGKK", "LFPG"]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(ids(&catalog.airspaces_for("EGLL", "LFPG")), vec!["EGLL", "EGKK", "LFPG"]);
        assert!(RouteCatalog::empty().is_empty());
    }
}
