use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::{
    config::Config,
    error::AgeError,
    network::Network,
    render::AgeRenderer,
    service::{TokenActivity, WalletAgeService},
};

pub struct AppState {
    pub service: WalletAgeService,
    pub renderer: Box<dyn AgeRenderer>,
    pub default_network: Network,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgeQuery {
    pub address: Option<String>,
    pub network: Option<String>,
    #[serde(rename = "useOldest")]
    pub use_oldest: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    pub address: Option<String>,
}

#[derive(Debug)]
pub struct ApiError(AgeError);

impl From<AgeError> for ApiError {
    fn from(e: AgeError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if self.0.is_upstream_error() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            error!("Error processing request: {}", self.0);
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(age_image))
        .route("/image", get(age_image))
        .route("/age", get(age_json))
        .route("/age/all", get(age_all))
        .route("/health", get(|| async { "Wallet age API running" }))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(cfg: Config, state: Arc<AppState>) -> eyre::Result<()> {
    let app = router(state);

    let addr = SocketAddr::from((cfg.bind_addr, cfg.port));
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Resolves a query to a single activity, either one chain or the oldest of all.
async fn resolve_activity(state: &AppState, q: &AgeQuery) -> Result<TokenActivity, AgeError> {
    let address = q.address.as_deref().unwrap_or_default();

    if q.use_oldest.as_deref() == Some("true") {
        return state.service.oldest_wallet_age(address).await;
    }

    let network = q.network.as_deref().unwrap_or(state.default_network.id());
    state.service.lookup(address, network).await
}

async fn age_image(State(state): State<Arc<AppState>>, Query(q): Query<AgeQuery>) -> Result<Response, ApiError> {
    let activity = resolve_activity(&state, &q).await?;
    let image = state.renderer.render(&activity.wallet_age)?;

    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, image.cache_control),
        ],
        image.bytes,
    )
        .into_response())
}

async fn age_json(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AgeQuery>,
) -> Result<Json<TokenActivity>, ApiError> {
    Ok(Json(resolve_activity(&state, &q).await?))
}

async fn age_all(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AddressQuery>,
) -> Result<Json<Vec<TokenActivity>>, ApiError> {
    let address = q.address.as_deref().unwrap_or_default();
    Ok(Json(state.service.all_networks(address).await?))
}
