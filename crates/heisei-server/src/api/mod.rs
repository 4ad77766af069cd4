//! REST surface.
//!
//! Routes live under `/api`; `/health` sits at the root. Every mutating request
//! passes admission control before its handler runs.

mod admission;
mod error;
mod handlers;

pub use admission::ClientIdentity;
pub use error::ApiError;

use crate::limiter::VisitorLimiter;
use crate::services::ForumServices;
use axum::{middleware, routing::get, routing::post, Router};
use heisei_core::CancellationToken;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Shared state for axum handlers
#[derive(Clone)]
pub struct AppState {
    /// Domain services
    pub services: Arc<ForumServices>,
    /// Admission control
    pub limiter: Arc<VisitorLimiter>,
    /// Fires when the server is shutting down
    pub shutdown: Arc<dyn CancellationToken>,
    /// Deadline for transactional writes
    pub request_timeout: Duration,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/categories/:id",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route("/categories/:id/threads", get(handlers::category_threads))
        .route(
            "/threads",
            get(handlers::list_threads).post(handlers::create_thread),
        )
        .route(
            "/threads/:id",
            get(handlers::get_thread)
                .put(handlers::update_thread)
                .delete(handlers::delete_thread),
        )
        .route("/threads/:id/posts", get(handlers::thread_posts))
        .route("/posts", post(handlers::create_post))
        .route(
            "/posts/:id",
            get(handlers::get_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admission::admit_mutations,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
