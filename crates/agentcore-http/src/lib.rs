//! The HTTP/SSE surface: REST routes for sessions, messages, parts,
//! permissions, and questions, plus an `/event` SSE stream of bus events.

mod error;
mod routes;
mod sse;
mod state;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::HttpError;
pub use state::{AppState, Paths};

/// Build the router. `cors_whitelist` origins are allowed in addition to
/// `localhost`, plus any configured whitelist.
pub fn router(state: AppState, cors_whitelist: &[String]) -> Router {
    let cors = build_cors(cors_whitelist);

    Router::new()
        .route("/health", get(routes::health))
        .route("/path", get(routes::path))
        .route("/agent", get(routes::agents))
        .route("/session", get(routes::list_sessions).post(routes::create_session))
        .route("/session/:id", get(routes::get_session).patch(routes::patch_session).delete(routes::delete_session))
        .route("/session/:id/children", get(routes::session_children))
        .route("/session/:id/abort", post(routes::abort_session))
        .route("/session/:id/message", get(routes::list_messages).post(routes::post_message))
        .route("/session/:id/prompt_async", post(routes::post_message_async))
        .route("/session/:id/message/:mid", get(routes::get_message))
        .route("/session/:id/message/:mid/part/:pid", delete(routes::delete_part).patch(routes::patch_part))
        .route("/permission", get(routes::list_permissions))
        .route("/permission/:id/reply", post(routes::reply_permission))
        .route("/question/:id/reply", post(routes::reply_question))
        .route("/question/:id/reject", post(routes::reject_question))
        .route("/event", get(sse::stream_events))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(whitelist: &[String]) -> CorsLayer {
    if whitelist.iter().any(|origin| origin == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }
    let mut origins: Vec<axum::http::HeaderValue> =
        vec!["http://localhost".parse().expect("static origin parses")];
    for origin in whitelist {
        if let Ok(value) = origin.parse() {
            origins.push(value);
        }
    }
    CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
}
