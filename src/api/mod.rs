//! JSON API over [`CrmService`]. Record routes are registered once per kind
//! with the kind attached as a request extension.

pub mod auth;
pub mod error;
mod handlers;

use crate::config::ServerConfig;
use crate::models::EntityKind;
use crate::service::CrmService;
use axum::routing::{delete, get};
use axum::{Extension, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: CrmService,
}

pub fn build_router(service: CrmService, config: &ServerConfig) -> Router {
    let cors = if config.cors_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { service })
}

fn api_routes() -> Router<AppState> {
    let mut router = Router::new()
        .route("/me", get(handlers::get_me).put(handlers::update_me))
        .route("/deleted_objects", get(handlers::list_deleted))
        .route("/deleted_objects/:id", delete(handlers::restore_deleted))
        .route("/timeline", get(handlers::timeline));
    for kind in EntityKind::ALL {
        router = router.nest(&format!("/{}", kind), kind_routes(kind));
    }
    router
}

/// Users are registered here but only ever changed through `/api/me`.
fn kind_routes(kind: EntityKind) -> Router<AppState> {
    let router = match kind {
        EntityKind::Users => Router::new()
            .route("/", get(handlers::list_records).post(handlers::register_user))
            .route("/:id", get(handlers::get_record)),
        _ => Router::new()
            .route("/", get(handlers::list_records).post(handlers::create_record))
            .route(
                "/:id",
                get(handlers::get_record)
                    .put(handlers::update_record)
                    .delete(handlers::delete_record),
            ),
    };
    router.layer(Extension(kind))
}
