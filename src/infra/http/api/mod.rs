pub mod conditional;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};

/// `/api/v1` routes behind authentication and rate limiting.
pub fn build_api_router(state: ApiState) -> Router {
    let auth_state = state.clone();
    let rate_state = state.clone();

    Router::new()
        .route(
            "/api/v1/vehicles",
            get(handlers::list_vehicles).post(handlers::create_vehicle),
        )
        .route(
            "/api/v1/vehicles/{id}",
            get(handlers::get_vehicle)
                .patch(handlers::update_vehicle)
                .delete(handlers::delete_vehicle),
        )
        .route(
            "/api/v1/vehicles/{id}/status",
            get(handlers::get_vehicle_status),
        )
        .route(
            "/api/v1/vehicles/{id}/incidents",
            get(handlers::list_vehicle_incidents).post(handlers::create_incident),
        )
        .route("/api/v1/incidents/import", post(handlers::import_incident))
        .route(
            "/api/v1/incidents/{id}",
            patch(handlers::update_incident).delete(handlers::delete_incident),
        )
        .route(
            "/api/v1/incidents/{id}/close",
            post(handlers::close_incident),
        )
        .route("/api/v1/summary", get(handlers::get_summary))
        .route("/api/v1/audit", get(handlers::list_audit_logs))
        .route("/api/v1/api-keys", get(handlers::list_api_keys))
        .route(
            "/api/v1/api-keys/{id}/revoke",
            post(handlers::revoke_api_key),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            rate_state,
            middleware::api_rate_limit,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            middleware::api_auth,
        ))
        .with_state(state)
}
