//! Community forum backend.
//!
//! Threaded discussions with votes, nested replies, moderation, read
//! tracking and private messages, served over a REST API with Tantivy
//! full-text search.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod forum;
pub mod models;
pub mod search;
pub mod store;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use search::SearchIndex;
use store::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub config: Arc<Config>,
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        .route("/me", get(api::get_me))
        .route("/revision", get(api::get_revision))
        .route("/bookmarks", get(api::list_bookmarks))
        // Categories
        .route("/categories", get(api::list_categories))
        .route(
            "/categories/{id}/topics",
            get(api::list_category_topics).post(api::create_topic),
        )
        // Topics
        .route("/topics/{id}", get(api::get_topic).put(api::update_topic))
        .route("/topics/{id}/replies", post(api::create_reply))
        .route("/topics/{id}/moderation", post(api::moderate_topic))
        .route("/topics/{id}/read", put(api::set_read_status))
        .route("/topics/{id}/bookmark", put(api::toggle_bookmark))
        // Replies
        .route(
            "/replies/{id}",
            put(api::update_reply).delete(api::delete_reply),
        )
        .route("/replies/{id}/quote", get(api::quote_reply))
        .route("/replies/{id}/moderation", post(api::moderate_reply))
        // Votes
        .route("/votes/{content_id}", post(api::submit_vote))
        // Reports
        .route("/reports", get(api::list_reports).post(api::submit_report))
        .route("/reports/{id}/resolve", post(api::resolve_report))
        // Notifications
        .route("/notifications", get(api::list_notifications))
        .route("/notifications/read-all", post(api::mark_all_notifications_read))
        .route("/notifications/{id}/read", post(api::mark_notification_read))
        // Messages
        .route(
            "/messages",
            get(api::list_conversations).post(api::send_message),
        )
        .route(
            "/messages/{id}",
            get(api::get_conversation).post(api::reply_message),
        )
        // Member management
        .route("/admin/users", get(api::list_users))
        .route("/admin/users/{id}/role", put(api::change_role))
        .route("/admin/users/{id}/ban", post(api::ban_user))
        .route("/admin/users/{id}/unban", post(api::unban_user))
        // Search
        .route("/search", get(api::search_topics))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
