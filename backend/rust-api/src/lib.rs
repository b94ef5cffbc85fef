use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::QuizError;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             img-src 'self' data: https:; \
             frame-src https://www.youtube.com https://www.youtube-nocookie.com; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1/auth", auth_routes(app_state.clone()))
        .nest("/api/v1/glossary", glossary_routes())
        .nest("/api/v1/videos", video_routes(app_state.clone()))
        // Anonymous callers reach the quiz core, which refuses to start for them
        .nest(
            "/api/v1/quiz",
            quiz_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::optional_auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn quiz_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(handlers::quiz::start_session))
        .route(
            "/sessions/{id}",
            get(handlers::quiz::get_session).delete(handlers::quiz::abandon),
        )
        .route("/sessions/{id}/answer", put(handlers::quiz::record_answer))
        .route("/sessions/{id}/advance", post(handlers::quiz::advance))
        .route("/sessions/{id}/finish", post(handlers::quiz::finish))
        .route("/sessions/{id}/result", get(handlers::quiz::get_result))
        .route("/sessions/{id}/stream", get(handlers::sse::session_stream))
        .route("/results", get(handlers::quiz::list_results))
}

fn glossary_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::glossary::list_terms))
        .route("/categories", get(handlers::glossary::list_categories))
        .route("/{id}", get(handlers::glossary::get_term))
}

fn video_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/", get(handlers::videos::list_videos))
        .route("/{id}", get(handlers::videos::get_video));

    let protected_routes = Router::new()
        .route("/progress", get(handlers::videos::get_progress))
        .route(
            "/{id}/watched",
            put(handlers::videos::mark_watched).delete(handlers::videos::unmark_watched),
        )
        .route(
            "/{id}/watched/toggle",
            post(handlers::videos::toggle_watched),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}

fn auth_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/signin", post(handlers::auth::sign_in))
        .route("/signup", post(handlers::auth::sign_up));

    let protected_routes = Router::new()
        .route("/me", get(handlers::auth::get_current_user))
        .route("/signout", post(handlers::auth::sign_out))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}
