//! HTTP dashboard for the uploaded climatologies.
//!
//! Provides endpoints for:
//! - `GET /` - Plotly page with the admin dropdowns, line charts and map
//! - `GET /api/options` - Nested adm0 -> adm1 -> adm2 names and scenarios
//! - `GET /api/series` - Monthly mean and maximum of one adm2 unit
//! - `GET /api/choropleth` - Mean per adm2 unit of a country
//! - `GET /api/boundaries` - Boundaries as GeoJSON

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::{
    catalog::{Month, Product, Scenario},
    db::queries::{self, AdmOptions, ChoroplethValue, SeriesPoint},
};

const INDEX_HTML: &str = include_str!("index.html");

/// Shared state for the HTTP server.
pub struct DashboardState {
    pub pool: SqlitePool,
    pub product: Product,
    pub geojson_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::NotFound(_) => StatusCode::NOT_FOUND,
            DashboardError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DashboardError::Internal(e) => {
                error!("Dashboard request failed: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Response for /api/options.
#[derive(Debug, Serialize)]
pub struct OptionsResponse {
    pub product: String,
    /// Unit of the reported values, `°C` or `raw`.
    pub unit: String,
    pub scenarios: Vec<String>,
    pub adm: AdmOptions,
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub adm0: String,
    pub adm1: String,
    pub adm2: String,
}

#[derive(Debug, Deserialize)]
pub struct ChoroplethQuery {
    pub adm0: String,
    pub scenario: Option<String>,
    pub month: Option<String>,
}

fn unit(product: Product) -> &'static str {
    if product.is_temperature() {
        "°C"
    } else {
        "raw"
    }
}

/// GET /
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /api/options
async fn options_handler(
    Extension(state): Extension<Arc<DashboardState>>,
) -> Result<Json<OptionsResponse>, DashboardError> {
    let adm = queries::adm_options(&state.pool, state.product).await?;
    let scenarios = queries::scenarios(&state.pool, state.product).await?;

    Ok(Json(OptionsResponse {
        product: state.product.to_string(),
        unit: unit(state.product).to_string(),
        scenarios,
        adm,
    }))
}

/// GET /api/series?adm0&adm1&adm2
async fn series_handler(
    Extension(state): Extension<Arc<DashboardState>>,
    Query(query): Query<SeriesQuery>,
) -> Result<Json<Vec<SeriesPoint>>, DashboardError> {
    let series = queries::time_series(
        &state.pool,
        state.product,
        &query.adm0,
        &query.adm1,
        &query.adm2,
    )
    .await?;

    Ok(Json(series))
}

/// GET /api/choropleth?adm0&scenario&month
///
/// Defaults to ACCESS1-0_rcp45 in March.
async fn choropleth_handler(
    Extension(state): Extension<Arc<DashboardState>>,
    Query(query): Query<ChoroplethQuery>,
) -> Result<Json<Vec<ChoroplethValue>>, DashboardError> {
    let scenario = match query.scenario {
        Some(scenario) => scenario
            .parse::<Scenario>()
            .map_err(|_| DashboardError::BadRequest(format!("Unknown scenario `{}`", scenario)))?,
        None => Scenario::Access10Rcp45,
    };
    let month = match query.month {
        Some(month) => month
            .parse::<Month>()
            .map_err(|e| DashboardError::BadRequest(e.to_string()))?,
        None => Month::March,
    };

    let values = queries::choropleth(
        &state.pool,
        state.product,
        &query.adm0,
        &scenario.to_string(),
        month.number(),
    )
    .await?;

    Ok(Json(values))
}

/// GET /api/boundaries
async fn boundaries_handler(
    Extension(state): Extension<Arc<DashboardState>>,
) -> Result<impl IntoResponse, DashboardError> {
    let geojson = tokio::fs::read(&state.geojson_path).await.map_err(|_| {
        DashboardError::NotFound(format!(
            "No boundaries at {}, run `chelsa boundaries` first",
            state.geojson_path.display()
        ))
    })?;

    Ok(([(header::CONTENT_TYPE, "application/geo+json")], geojson))
}

/// Build the HTTP router.
pub fn build_router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/options", get(options_handler))
        .route("/api/series", get(series_handler))
        .route("/api/choropleth", get(choropleth_handler))
        .route("/api/boundaries", get(boundaries_handler))
        .layer(Extension(state))
}

/// Start the HTTP server.
pub async fn start_server(state: Arc<DashboardState>, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Dashboard listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------
