use axum::{
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod predicate;
pub mod repository;
pub mod seed;
pub mod store;

use handlers::members;
use repository::MemberRepository;
use store::MemberStore;

#[derive(Clone)]
pub struct AppState<S> {
    pub members: MemberRepository<S>,
}

impl<S: MemberStore> AppState<S> {
    pub fn new(store: S) -> Self {
        Self { members: MemberRepository::new(store) }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        info!("🔓 No ALLOWED_ORIGINS configured: using permissive CORS");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("⚠️ Ignoring invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    info!("🔒 CORS configured for {} origins", origins.len());
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::ORIGIN,
        ])
}

pub fn app<S: MemberStore>(state: AppState<S>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .merge(members::router::<S>())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(allowed_origins)),
        )
        .with_state(state)
}

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": "member-search",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "members": "/v1/members",
            "members_paged": "/v2/members",
            "members_paged_optimized": "/v3/members",
            "health": "/api/health"
        }
    })))
}
