//! Address and coordinate lookup against the city's posted sweep routes.
//!
//! Geocoding and the route query are collaborators behind traits so the bot
//! and tests can swap them. [`SweepLookup`] applies the lookup policy: address
//! normalization, minimum geocode score, and the widened second route query.

pub mod arcgis;
pub mod cache;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::schedule::ScheduleCode;

pub use arcgis::ArcGisClient;
pub use cache::{CachedGeocoder, CachedRoutes};

pub const DEFAULT_RADIUS_FT: u32 = 200;
pub const DEFAULT_FALLBACK_RADIUS_FT: u32 = 500;
pub const DEFAULT_MIN_SCORE: f64 = 70.0;

/// Best geocoder candidate for an address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    /// Longitude
    pub x: f64,
    /// Latitude
    pub y: f64,
    /// Matched address as reported by the geocoder
    pub label: String,
    pub score: f64,
}

pub trait Geocoder: Send + Sync {
    /// Returns `Ok(None)` when the geocoder has no candidates.
    fn geocode(&self, address: &str) -> Result<Option<GeocodeMatch>>;
}

/// Attributes of one posted route segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    #[serde(rename = "Route", default)]
    pub route: Option<String>,
    #[serde(rename = "Posted_Day", default)]
    pub posted_day: Option<String>,
    #[serde(rename = "Posted_Time", default)]
    pub posted_time: Option<String>,
    #[serde(rename = "Boundaries", default)]
    pub boundaries: Option<String>,
    #[serde(rename = "Weeks", default)]
    pub weeks: Option<String>,
    #[serde(rename = "STNAME", default)]
    pub street: Option<String>,
    #[serde(rename = "STSFX", default)]
    pub suffix: Option<String>,
}

pub trait RouteSource: Send + Sync {
    /// Route segments intersecting a square of `radius_ft` around a point.
    fn routes_near(&self, x: f64, y: f64, radius_ft: u32) -> Result<Vec<RouteRecord>>;
}

/// What a street's posted signs say. `street_name` may be empty when the
/// route layer has no name for the segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepDetails {
    pub sweep_days: Vec<String>,
    pub sweep_schedule: ScheduleCode,
    pub sweep_time: Option<String>,
    pub street_name: String,
}

/// Collapse the route segments near a point into one street's schedule.
///
/// Segments without a posted day are ignored. The street with the most
/// segments wins (first seen on a tie) and only its segments contribute.
pub fn aggregate_routes(records: &[RouteRecord]) -> Option<SweepDetails> {
    let posted: Vec<&RouteRecord> = records
        .iter()
        .filter(|r| r.posted_day.as_deref().is_some_and(|d| !d.trim().is_empty()))
        .collect();
    if posted.is_empty() {
        return None;
    }

    let street_of = |r: &RouteRecord| r.street.clone().unwrap_or_default();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for r in &posted {
        let street = street_of(r);
        let count = counts.entry(street.clone()).or_insert(0);
        if *count == 0 {
            order.push(street);
        }
        *count += 1;
    }
    let mut primary = &order[0];
    for street in &order {
        if counts[street] > counts[primary] {
            primary = street;
        }
    }

    let routes: Vec<&RouteRecord> = posted
        .into_iter()
        .filter(|r| &street_of(r) == primary)
        .collect();
    let first = routes[0];

    let mut days: Vec<String> = Vec::new();
    let mut times: Vec<String> = Vec::new();
    for r in &routes {
        if let Some(day) = &r.posted_day {
            if !days.contains(day) {
                days.push(day.clone());
            }
        }
        if let Some(time) = r.posted_time.as_ref().filter(|t| !t.trim().is_empty()) {
            if !times.contains(time) {
                times.push(time.clone());
            }
        }
    }

    let street_name = [first.street.as_deref(), first.suffix.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();

    Some(SweepDetails {
        sweep_days: days,
        sweep_schedule: ScheduleCode::new(first.weeks.clone().unwrap_or_default()),
        sweep_time: if times.is_empty() {
            None
        } else {
            Some(times.join(", "))
        },
        street_name,
    })
}

/// Append the city when the address doesn't already name it.
pub fn normalize_address(address: &str) -> String {
    let words: Vec<String> = address
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();
    let names_city = words.iter().any(|w| w == "la")
        || words.windows(2).any(|pair| pair[0] == "los" && pair[1] == "angeles");
    if names_city {
        address.to_string()
    } else {
        format!("{}, Los Angeles, CA", address)
    }
}

pub struct SweepLookup {
    geocoder: Arc<dyn Geocoder>,
    routes: Arc<dyn RouteSource>,
    radius_ft: u32,
    fallback_radius_ft: u32,
    min_score: f64,
}

impl SweepLookup {
    pub fn new(geocoder: Arc<dyn Geocoder>, routes: Arc<dyn RouteSource>) -> Self {
        Self {
            geocoder,
            routes,
            radius_ft: DEFAULT_RADIUS_FT,
            fallback_radius_ft: DEFAULT_FALLBACK_RADIUS_FT,
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    pub fn with_radii(mut self, radius_ft: u32, fallback_radius_ft: u32) -> Self {
        self.radius_ft = radius_ft;
        self.fallback_radius_ft = fallback_radius_ft;
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Geocode a user-typed address. Weak matches count as not found.
    pub fn geocode(&self, address: &str) -> Result<Option<GeocodeMatch>> {
        let address = normalize_address(address);
        match self.geocoder.geocode(&address)? {
            Some(m) if m.score >= self.min_score => {
                info!(address = %address, x = m.x, y = m.y, score = m.score, "Geocoded");
                Ok(Some(m))
            }
            Some(m) => {
                debug!(address = %address, score = m.score, "Geocode score below threshold");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Schedule for the street nearest a point, widening the search once
    /// when nothing is found close by.
    pub fn sweep_details(&self, x: f64, y: f64) -> Result<Option<SweepDetails>> {
        let mut records = self.routes.routes_near(x, y, self.radius_ft)?;
        if records.is_empty() && self.fallback_radius_ft > self.radius_ft {
            debug!(x, y, radius_ft = self.fallback_radius_ft, "Widening route search");
            records = self.routes.routes_near(x, y, self.fallback_radius_ft)?;
        }
        Ok(aggregate_routes(&records))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    pub(crate) fn route(street: &str, day: &str, time: &str, weeks: &str) -> RouteRecord {
        RouteRecord {
            route: Some("10P123 M".to_string()),
            posted_day: Some(day.to_string()),
            posted_time: Some(time.to_string()),
            boundaries: None,
            weeks: Some(weeks.to_string()),
            street: Some(street.to_string()),
            suffix: Some("St".to_string()),
        }
    }

    /// Geocoder returning a fixed answer.
    pub(crate) struct FixedGeocoder(pub Option<GeocodeMatch>);

    impl Geocoder for FixedGeocoder {
        fn geocode(&self, _address: &str) -> Result<Option<GeocodeMatch>> {
            Ok(self.0.clone())
        }
    }

    /// Route source answering per radius and recording queries.
    #[derive(Default)]
    pub(crate) struct FakeRoutes {
        pub by_radius: HashMap<u32, Vec<RouteRecord>>,
        pub fail: bool,
        pub queries: Mutex<Vec<u32>>,
    }

    impl RouteSource for FakeRoutes {
        fn routes_near(&self, _x: f64, _y: f64, radius_ft: u32) -> Result<Vec<RouteRecord>> {
            self.queries.lock().unwrap().push(radius_ft);
            if self.fail {
                return Err(anyhow!("Invalid query parameters"));
            }
            Ok(self.by_radius.get(&radius_ft).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("123 Main St"), "123 Main St, Los Angeles, CA");
        assert_eq!(normalize_address("123 Main St, Los Angeles"), "123 Main St, Los Angeles");
        assert_eq!(normalize_address("123 Main St LA 90012"), "123 Main St LA 90012");
        assert_eq!(normalize_address("123 main st, la"), "123 main st, la");
        assert_eq!(normalize_address("500 La Brea Ave"), "500 La Brea Ave");
        // "la" inside a word does not count
        assert_eq!(
            normalize_address("500 Lake St"),
            "500 Lake St, Los Angeles, CA"
        );
    }

    #[test]
    fn test_aggregate_majority_street() {
        let records = vec![
            route("MAIN", "Monday", "8am-10am", "2 & 4"),
            route("SPRING", "Tuesday", "10am-12pm", "1 & 3"),
            route("MAIN", "Tuesday", "8am-10am", "2 & 4"),
        ];
        let details = aggregate_routes(&records).unwrap();
        assert_eq!(details.street_name, "MAIN ST");
        assert_eq!(details.sweep_days, vec!["Monday", "Tuesday"]);
        assert_eq!(details.sweep_schedule.as_str(), "2 & 4");
        assert_eq!(details.sweep_time.as_deref(), Some("8am-10am"));
    }

    #[test]
    fn test_aggregate_tie_takes_first_seen() {
        let records = vec![
            route("SPRING", "Thursday", "12pm-2pm", "1 & 3"),
            route("MAIN", "Monday", "8am-10am", "2 & 4"),
        ];
        let details = aggregate_routes(&records).unwrap();
        assert_eq!(details.street_name, "SPRING ST");
        assert_eq!(details.sweep_days, vec!["Thursday"]);
    }

    #[test]
    fn test_aggregate_joins_distinct_times() {
        let records = vec![
            route("MAIN", "Monday", "8am-10am", "2 & 4"),
            route("MAIN", "Monday", "10am-12pm", "2 & 4"),
            route("MAIN", "Monday", "8am-10am", "2 & 4"),
        ];
        let details = aggregate_routes(&records).unwrap();
        assert_eq!(details.sweep_days, vec!["Monday"]);
        assert_eq!(details.sweep_time.as_deref(), Some("8am-10am, 10am-12pm"));
    }

    #[test]
    fn test_aggregate_ignores_unposted() {
        let mut unposted = route("SPRING", "", "", "");
        unposted.posted_day = None;
        let records = vec![unposted.clone(), unposted, route("MAIN", "Friday", "", "1 & 3")];
        let details = aggregate_routes(&records).unwrap();
        assert_eq!(details.street_name, "MAIN ST");

        let only_blank = vec![route("MAIN", "  ", "8am", "2 & 4")];
        assert!(aggregate_routes(&only_blank).is_none());
        assert!(aggregate_routes(&[]).is_none());
    }

    #[test]
    fn test_aggregate_blank_time_and_name() {
        let mut record = route("MAIN", "Monday", "", "2 & 4");
        record.street = None;
        record.suffix = None;
        let details = aggregate_routes(&[record, route("", "Monday", "  ", "2 & 4")]).unwrap();
        assert_eq!(details.sweep_time, None);
        assert_eq!(details.street_name, "");
    }

    #[test]
    fn test_route_record_from_arcgis_attributes() {
        let json = r#"{"Route":"10P123 M","Posted_Day":"Monday","Posted_Time":"8 am - 10 am",
            "Boundaries":"1ST ST - 2ND ST","Weeks":"2 & 4","Day_Short":"M","STNAME":"Main",
            "TDIR":null,"STSFX":null}"#;
        let record: RouteRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.posted_day.as_deref(), Some("Monday"));
        assert_eq!(record.suffix, None);
        let details = aggregate_routes(&[record]).unwrap();
        assert_eq!(details.street_name, "MAIN");
    }

    #[test]
    fn test_geocode_rejects_low_score() {
        let m = GeocodeMatch {
            x: -118.25,
            y: 34.05,
            label: "123 Main St, Los Angeles, California, 90012".to_string(),
            score: 65.0,
        };
        let lookup = SweepLookup::new(
            Arc::new(FixedGeocoder(Some(m.clone()))),
            Arc::new(FakeRoutes::default()),
        );
        assert!(lookup.geocode("123 Main St").unwrap().is_none());

        let lookup = SweepLookup::new(
            Arc::new(FixedGeocoder(Some(GeocodeMatch { score: 70.0, ..m }))),
            Arc::new(FakeRoutes::default()),
        );
        assert!(lookup.geocode("123 Main St").unwrap().is_some());
    }

    #[test]
    fn test_sweep_details_widens_search() {
        let mut routes = FakeRoutes::default();
        routes
            .by_radius
            .insert(500, vec![route("MAIN", "Monday", "8am-10am", "2 & 4")]);
        let routes = Arc::new(routes);
        let lookup = SweepLookup::new(Arc::new(FixedGeocoder(None)), routes.clone());

        let details = lookup.sweep_details(-118.25, 34.05).unwrap().unwrap();
        assert_eq!(details.street_name, "MAIN ST");
        assert_eq!(*routes.queries.lock().unwrap(), vec![200, 500]);
    }

    #[test]
    fn test_sweep_details_no_widening_when_close_hit() {
        let mut routes = FakeRoutes::default();
        routes
            .by_radius
            .insert(200, vec![route("MAIN", "Monday", "8am-10am", "2 & 4")]);
        let routes = Arc::new(routes);
        let lookup = SweepLookup::new(Arc::new(FixedGeocoder(None)), routes.clone());

        assert!(lookup.sweep_details(-118.25, 34.05).unwrap().is_some());
        assert_eq!(*routes.queries.lock().unwrap(), vec![200]);
    }

    #[test]
    fn test_sweep_details_propagates_errors() {
        let routes = FakeRoutes {
            fail: true,
            ..Default::default()
        };
        let lookup = SweepLookup::new(Arc::new(FixedGeocoder(None)), Arc::new(routes));
        assert!(lookup.sweep_details(-118.25, 34.05).is_err());
    }
}
