//! ArcGIS REST clients: the World Geocoder and the StreetsLA route layer.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

use super::{GeocodeMatch, Geocoder, RouteRecord, RouteSource};
use crate::config::ArcGisConfig;

pub const GEOCODE_URL: &str =
    "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer/findAddressCandidates";
pub const ROUTES_URL: &str = "https://services5.arcgis.com/7nsPwEMP38bSkCjy/arcgis/rest/services/Clean_Street_Routes/FeatureServer/0/query";

/// Downtown LA, used to bias geocoder candidates.
const LOCATION_BIAS: &str = "-118.25,34.05";
const BIAS_DISTANCE_M: &str = "50000";
const MAX_CANDIDATES: &str = "5";
const MAX_ROUTE_RECORDS: &str = "10";
/// Degrees per foot at LA's latitude.
const DEGREES_PER_FOOT: f64 = 0.000003;
const ROUTE_FIELDS: &str = "Route,Posted_Day,Posted_Time,Boundaries,Weeks,Day_Short,STNAME,TDIR,STSFX";

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    address: Option<String>,
    location: Point,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    attributes: CandidateAttributes,
}

#[derive(Debug, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateAttributes {
    #[serde(rename = "Match_addr", default)]
    match_addr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    attributes: RouteRecord,
}

fn api_error(context: &str, err: &ApiError) -> anyhow::Error {
    error!(code = ?err.code, message = ?err.message, "ArcGIS {} error", context);
    anyhow!(
        "ArcGIS {} error {}: {}",
        context,
        err.code.unwrap_or_default(),
        err.message.as_deref().unwrap_or("unknown")
    )
}

fn parse_geocode(response: GeocodeResponse, address: &str) -> Result<Option<GeocodeMatch>> {
    if let Some(err) = &response.error {
        return Err(api_error("geocode", err));
    }

    // First candidate with the highest score
    let mut best: Option<Candidate> = None;
    for candidate in response.candidates {
        if best.as_ref().map_or(true, |b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }

    Ok(best.map(|c| GeocodeMatch {
        x: c.location.x,
        y: c.location.y,
        label: c
            .attributes
            .match_addr
            .or(c.address)
            .unwrap_or_else(|| address.to_string()),
        score: c.score,
    }))
}

fn parse_routes(response: QueryResponse) -> Result<Vec<RouteRecord>> {
    if let Some(err) = &response.error {
        return Err(api_error("route query", err));
    }
    Ok(response.features.into_iter().map(|f| f.attributes).collect())
}

/// Bounding box `xmin,ymin,xmax,ymax` around a point. The route layer
/// rejects the `units` parameter a buffered point query would need.
fn envelope(x: f64, y: f64, radius_ft: u32) -> String {
    let offset = radius_ft as f64 * DEGREES_PER_FOOT;
    format!("{},{},{},{}", x - offset, y - offset, x + offset, y + offset)
}

pub struct ArcGisClient {
    agent: ureq::Agent,
    geocode_url: String,
    routes_url: String,
    api_key: Option<String>,
}

impl ArcGisClient {
    pub fn new(geocode_url: &str, routes_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            geocode_url: geocode_url.to_string(),
            routes_url: routes_url.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn from_config(config: &ArcGisConfig) -> Self {
        Self::new(
            &config.geocode_url,
            &config.routes_url,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

impl Geocoder for ArcGisClient {
    fn geocode(&self, address: &str) -> Result<Option<GeocodeMatch>> {
        let mut request = self
            .agent
            .get(&self.geocode_url)
            .query("f", "json")
            .query("singleLine", address)
            .query("outFields", "Match_addr,Addr_type")
            .query("maxLocations", MAX_CANDIDATES)
            .query("location", LOCATION_BIAS)
            .query("distance", BIAS_DISTANCE_M);
        if let Some(ref key) = self.api_key {
            request = request.query("token", key);
        }

        debug!(address = %address, "Geocode request");
        let response: GeocodeResponse = request
            .call()
            .context("Geocode request failed")?
            .into_json()
            .context("Failed to parse geocode response")?;
        parse_geocode(response, address)
    }
}

impl RouteSource for ArcGisClient {
    fn routes_near(&self, x: f64, y: f64, radius_ft: u32) -> Result<Vec<RouteRecord>> {
        let geometry = envelope(x, y, radius_ft);
        debug!(x, y, radius_ft, "Route query");
        let response: QueryResponse = self
            .agent
            .get(&self.routes_url)
            .query("f", "json")
            .query("geometry", &geometry)
            .query("geometryType", "esriGeometryEnvelope")
            .query("inSR", "4326")
            .query("spatialRel", "esriSpatialRelIntersects")
            .query("outFields", ROUTE_FIELDS)
            .query("returnGeometry", "false")
            .query("resultRecordCount", MAX_ROUTE_RECORDS)
            .call()
            .context("Route query failed")?
            .into_json()
            .context("Failed to parse route query response")?;
        parse_routes(response)
    }
}
