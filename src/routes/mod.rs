use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::state::AppState;

pub mod auth;
pub mod clients;
pub mod company;
pub mod health;
pub mod notes;
pub mod projects;
pub mod users;

/// Delete endpoints default to soft delete; `?soft=false` selects the
/// physical, irreversible delete.
#[derive(Deserialize)]
pub struct DeleteMode {
    pub soft: Option<String>,
}

impl DeleteMode {
    pub fn is_hard(&self) -> bool {
        self.soft.as_deref() == Some("false")
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify", post(auth::verify));

    let user_routes = Router::new()
        .route("/", get(users::get_me).delete(users::delete_self))
        .route(
            "/:id",
            get(users::get_user).delete(users::delete_user_by_admin),
        )
        .route("/register", put(users::update_profile))
        .route("/company", patch(company::register_company))
        .route("/guest", post(users::register_guest))
        .route("/restore/:id", patch(users::restore_user_by_admin))
        .route("/request-reset", post(users::request_password_reset))
        .route("/reset-password", post(users::reset_password));

    let company_routes = Router::new()
        .route(
            "/",
            patch(company::update_company).delete(company::delete_company),
        )
        .route("/logo", patch(company::update_logo));

    let client_routes = Router::new()
        .route("/", get(clients::list_clients))
        .route("/register", post(clients::register_client))
        .route(
            "/:id",
            get(clients::get_client)
                .patch(clients::update_client)
                .delete(clients::delete_client),
        )
        .route("/restore/:id", patch(clients::restore_client));

    let project_routes = Router::new()
        .route(
            "/",
            get(projects::list_projects).post(projects::register_project),
        )
        .route("/archived", get(projects::list_archived_projects))
        .route("/archived/:id", get(projects::get_archived_project))
        .route("/recover/:id", put(projects::recover_project))
        .route(
            "/:id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        );

    let note_routes = Router::new()
        .route("/", get(notes::list_notes).post(notes::register_note))
        .route("/pdf/:id", get(notes::get_note_pdf))
        .route("/sign/:id", patch(notes::upload_signature))
        .route("/restore/:id", patch(notes::restore_note))
        .route(
            "/:id",
            get(notes::get_note)
                .put(notes::update_note)
                .delete(notes::delete_note),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/user", user_routes)
        .nest("/api/company", company_routes)
        .nest("/api/client", client_routes)
        .nest("/api/project", project_routes)
        .nest("/api/deliverynote", note_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 32))
}
