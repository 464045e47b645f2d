//! # pb-api
//!
//! The web routing and orchestration layer for Photo Battle.

pub mod error;
pub mod handlers;
pub mod middleware;

use actix_web::web;

/// Configures the routes for the battle arena.
///
/// # Developer Note
/// We use a scoped configuration to allow the main binary to mount
/// the API under different paths if needed (e.g., /api/v1/).
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            // Group directory with `?q=` search
            .route("/groups", web::get().to(handlers::list_groups))
            .route("/groups", web::post().to(handlers::create_group))
            .route("/groups/{group_id}/leaderboard", web::get().to(handlers::leaderboard))
            // Battle sessions
            .route("/groups/{group_id}/sessions", web::post().to(handlers::open_session))
            .route("/sessions/{session_id}", web::get().to(handlers::get_session))
            .route("/sessions/{session_id}", web::delete().to(handlers::close_session))
            .route("/sessions/{session_id}/next", web::post().to(handlers::next_battle))
            .route("/sessions/{session_id}/votes", web::post().to(handlers::cast_vote)),
    );
}
