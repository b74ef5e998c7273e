//! HTTP lookup endpoints for the web page.
//!
//! `POST /api/lookup` takes `{lat, lon}` and `POST /api/address` takes
//! `{address}`. Both answer `{found, text}` with the same street card the bot
//! sends; the address endpoint adds the geocoder's matched address.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::format;
use crate::lookup::SweepLookup;
use crate::notify::DailySchedule;
use crate::projector::SweepProjector;

const EMPTY_ADDRESS: &str = "Please enter an address.";
const ADDRESS_NOT_FOUND: &str =
    "Couldn't find that address. Try including the full street name and zip code.";

pub struct WebState {
    pub lookup: Arc<SweepLookup>,
    pub projector: Arc<SweepProjector>,
    pub clock: DailySchedule,
}

#[derive(Debug, Deserialize)]
pub struct CoordsRequest {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct AddressRequest {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub found: bool,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl LookupResponse {
    fn not_found(text: &str) -> Self {
        Self {
            found: false,
            text: text.to_string(),
            address: None,
        }
    }
}

type ApiResult = Result<Json<LookupResponse>, (StatusCode, Json<LookupResponse>)>;

impl WebState {
    /// Card for the street nearest a point (`x` is longitude).
    pub fn lookup_coords(&self, x: f64, y: f64) -> Result<LookupResponse> {
        let response = match self.lookup.sweep_details(x, y)? {
            Some(details) => LookupResponse {
                found: true,
                text: format::street_summary(&details, &self.projector, self.clock.today()),
                address: None,
            },
            None => LookupResponse::not_found(format::NOT_FOUND_TEXT),
        };
        Ok(response)
    }

    pub fn lookup_address(&self, address: &str) -> Result<LookupResponse> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(LookupResponse::not_found(EMPTY_ADDRESS));
        }
        let Some(m) = self.lookup.geocode(address)? else {
            return Ok(LookupResponse::not_found(ADDRESS_NOT_FOUND));
        };
        let mut response = self.lookup_coords(m.x, m.y)?;
        response.address = Some(m.label);
        Ok(response)
    }
}

pub fn router(state: Arc<WebState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/lookup", post(api_lookup))
        .route("/api/address", post(api_address))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn api_lookup(State(state): State<Arc<WebState>>, Json(req): Json<CoordsRequest>) -> ApiResult {
    run_blocking(move || state.lookup_coords(req.lon, req.lat)).await
}

async fn api_address(State(state): State<Arc<WebState>>, Json(req): Json<AddressRequest>) -> ApiResult {
    run_blocking(move || state.lookup_address(&req.address)).await
}

/// Lookups make blocking HTTP calls, so they run on the blocking pool.
async fn run_blocking<F>(lookup: F) -> ApiResult
where
    F: FnOnce() -> Result<LookupResponse> + Send + 'static,
{
    match tokio::task::spawn_blocking(lookup).await {
        Ok(Ok(response)) => Ok(Json(response)),
        Ok(Err(e)) => {
            warn!("Web lookup failed: {:#}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(LookupResponse::not_found(format::SERVICE_DOWN_TEXT)),
            ))
        }
        Err(e) => {
            error!("Web lookup task panicked: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LookupResponse::not_found(format::INTERNAL_ERROR_TEXT)),
            ))
        }
    }
}

pub async fn serve(state: Arc<WebState>, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind web server to {}", addr))?;
    info!("Web lookup listening on http://{}", addr);
    axum::serve(listener, router(state))
        .await
        .context("Web server failed")?;
    Ok(())
}
