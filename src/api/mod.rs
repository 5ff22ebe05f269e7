use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{authz::AuthorizationResolver, config::AppConfig, gate::SubmissionGate};

mod routes;

#[derive(Clone)]
pub struct AppState {
    pub cfg: AppConfig,
    pub gate: SubmissionGate,
    pub resolver: AuthorizationResolver,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/posts/:post_id/comments",
            get(routes::list_comments).post(routes::submit_comment),
        )
        .route("/comments/:id/can-delete", post(routes::can_delete_comment))
        .route("/comments/:id", delete(routes::delete_comment))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
