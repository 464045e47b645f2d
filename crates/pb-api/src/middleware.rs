//! photo-battle/crates/pb-api/src/middleware.rs Middleware
//!
//! Logging and cross-origin policy for the arena API.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::Logger;

/// Request logger; the binary's tracing subscriber picks these lines up.
pub fn standard_middleware() -> Logger {
    // remote-ip "request-line" status-code response-size "referrer" "user-agent"
    Logger::default()
}

// The browser front end is served from a different origin than the API.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "DELETE"])
        .allowed_header(header::CONTENT_TYPE)
        .max_age(3600)
}
