pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::session::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/sessions", post(handlers::handle_open_session))
        .route(
            "/api/v1/sessions/:id",
            delete(handlers::handle_close_session),
        )
        .route(
            "/api/v1/sessions/:id/document",
            get(handlers::handle_get_document).put(handlers::handle_update_document),
        )
        .route("/api/v1/sessions/:id/undo", post(handlers::handle_undo))
        .route("/api/v1/sessions/:id/redo", post(handlers::handle_redo))
        .route(
            "/api/v1/sessions/:id/history",
            get(handlers::handle_history).delete(handlers::handle_clear_history),
        )
        .route(
            "/api/v1/sessions/:id/versions",
            get(handlers::handle_list_versions).post(handlers::handle_create_version),
        )
        .route(
            "/api/v1/sessions/:id/versions/compare",
            get(handlers::handle_compare_versions),
        )
        .route(
            "/api/v1/sessions/:id/versions/current",
            get(handlers::handle_current_version),
        )
        .route(
            "/api/v1/sessions/:id/versions/:vid/restore",
            post(handlers::handle_restore_version),
        )
        .route(
            "/api/v1/sessions/:id/versions/:vid/branch",
            post(handlers::handle_create_branch),
        )
        .route(
            "/api/v1/sessions/:id/versions/:vid/publish",
            post(handlers::handle_publish_version),
        )
        .route(
            "/api/v1/sessions/:id/branches",
            get(handlers::handle_list_branches),
        )
        .route(
            "/api/v1/sessions/:id/autosave",
            get(handlers::handle_autosave_status),
        )
        .route(
            "/api/v1/sessions/:id/autosave/save",
            post(handlers::handle_force_save),
        )
        .route(
            "/api/v1/sessions/:id/autosave/clear-error",
            post(handlers::handle_clear_save_error),
        )
        .route(
            "/api/v1/sessions/:id/autosave/reset",
            post(handlers::handle_reset_autosave),
        )
        .with_state(state)
}
