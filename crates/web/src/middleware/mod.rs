//! HTTP middleware stack for the web front end.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions, signed cookie, in-memory store)
//! 5. Security headers (CSP, frame and sniffing protection)
//!
//! Route protection is not a layer: handlers opt in through the extractors
//! in [`guard`].

pub mod guard;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use guard::{GuardRejection, RequireAdmin, RequireSession, RequireToken};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
