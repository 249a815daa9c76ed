//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transactions)
//! 2. `TraceLayer` (request span with method, uri, status, latency)
//! 3. Request ID (recorded on the span and the Sentry scope)
//! 4. Security headers
//! 5. CORS

pub mod auth;
pub mod request_id;
pub mod security_headers;

pub use auth::{CurrentUser, RequireAdmin};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
