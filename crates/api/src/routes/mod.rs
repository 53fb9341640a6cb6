//! API routes

pub mod billing;
pub mod health;
pub mod pages;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{guard, state::AppState};

/// Create all routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // API routes under /api/v1 (session checks happen in the handlers)
    let mut api_v1_routes = Router::new();
    if state.config.enable_billing {
        api_v1_routes = api_v1_routes
            .route("/billing/reconcile", post(billing::reconcile))
            .route("/billing/subscription", get(billing::get_subscription));
    }

    // Page routes, gated by the route guard
    let page_routes = Router::new()
        .route("/", get(pages::landing))
        .route("/sign-in", get(pages::sign_in))
        .route("/sign-up", get(pages::sign_up))
        .route("/complete-profile", get(pages::complete_profile))
        .route("/dashboard", get(pages::dashboard))
        .route("/dashboard/*rest", get(pages::dashboard))
        .route("/admin", get(pages::admin_overview))
        .route("/admin/*rest", get(pages::admin_overview))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::route_guard,
        ));

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_v1_routes)
        .merge(page_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
