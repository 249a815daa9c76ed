//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Readiness (store reachable)
//!
//! # Admin (allowlisted users only)
//! GET  /api/admin/products                  - List products
//! POST /api/admin/products                  - Create product (multipart)
//! PUT  /api/admin/products/{id}             - Update product (multipart)
//! GET  /api/admin/orders                    - List all orders
//! PUT  /api/admin/orders/{order_id}/status  - Change order status
//! GET  /api/admin/customers                 - List users
//! GET  /api/admin/stats                     - Dashboard stats
//!
//! # Customer (signed-in users)
//! GET  /api/orders                          - Caller's orders
//! POST /api/orders                          - Place order
//! GET  /api/users/addresses                 - List addresses
//! POST /api/users/addresses                 - Add address
//! PUT  /api/users/addresses/{address_id}    - Update address
//! DELETE /api/users/addresses/{address_id}  - Delete address
//! GET  /api/users/wishlist                  - Wishlisted products
//! POST /api/users/wishlist                  - Add to wishlist
//! DELETE /api/users/wishlist/{product_id}   - Remove from wishlist
//! POST /api/reviews                         - Review a delivered product
//!
//! # Webhooks
//! POST /api/inngest                         - Identity lifecycle events
//! ```

pub mod admin;
pub mod health;
pub mod orders;
pub mod reviews;
pub mod users;
pub mod webhooks;


use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::get,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::ApiConfig;
use crate::middleware::{request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// Create the `/api` routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/admin", admin::routes())
        .nest("/orders", orders::routes())
        .nest("/users", users::routes())
        .nest("/reviews", reviews::routes())
        .nest("/inngest", webhooks::routes())
}

/// Build the application with its state, CORS, security headers and
/// request IDs. Sentry and request tracing are layered on by the binary.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(cors)
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
}

/// CORS for the configured origins; any origin when none are configured.
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
