//! NOTAM relevance matching.

use notam_proto::{FlightPlan, Notam};

use crate::notam::NotamIndex;

/// Selects the NOTAMs that concern a flight.
///
/// A NOTAM is relevant when its location is the departure or arrival
/// airport, or when its affected airspace identifier equals one of the route
/// airspaces. Comparisons are byte-exact.
#[derive(Debug, Clone, Copy)]
pub struct NotamMatcher<'a> {
    index: &'a NotamIndex,
}

impl<'a> NotamMatcher<'a> {
    /// Create a matcher over an index.
    #[must_use]
    pub const fn new(index: &'a NotamIndex) -> Self {
        Self { index }
    }

    /// NOTAMs relevant to `plan`, in index order.
    #[must_use]
    pub fn relevant(&self, plan: &FlightPlan) -> Vec<&'a Notam> {
        self.index
            .notams()
            .iter()
            .filter(|notam| is_relevant(notam, plan))
            .collect()
    }
}

/// Whether `notam` concerns `plan`.
#[must_use]
pub fn is_relevant(notam: &Notam, plan: &FlightPlan) -> bool {
    notam.location == plan.departure_airport
        || notam.location == plan.arrival_airport
        || plan
            .route_airspaces
            .iter()
            .any(|airspace| airspace.identifier == notam.affected_airspace.identifier)
}
