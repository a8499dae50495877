//! Personal movie/show cataloguing API.
//!
//! Authenticated users search TMDB, pull external ratings from OMDB,
//! save entries into their own catalogue, and rate each other's items.
//! Thin REST facade: axum in front of MongoDB, with a Redis
//! read-through cache (in-process fallback) over both the store and the
//! metadata providers.
//!
//! Rating flow:
//! ```text
//! POST /api/items/{id}/rate {score, comment}
//!   -> validate range/granularity
//!   -> load item, merge caller's rating by identity key
//!   -> recompute aggregate average
//!   -> persist list + aggregate in one versioned write
//!   -> invalidate item cache + owner's list cache
//! ```

use std::time::Duration;

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod items;
pub mod mapping;
pub mod metadata;
pub mod model;
pub mod rating;
pub mod routes;
pub mod state;

use routes::{
    create_item, delete_item, get_item, health_handler, list_items, rate_item, search_details,
    search_ratings, search_title, unrate_item, update_item,
};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/items", get(list_items).post(create_item))
        .route(
            "/api/items/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route(
            "/api/items/{id}/rate",
            post(rate_item).delete(unrate_item),
        )
        .route("/api/search/title", get(search_title))
        .route("/api/search/details/{id}", get(search_details))
        .route("/api/search/ratings/{imdb_id}", get(search_ratings))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
