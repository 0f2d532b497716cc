//! HTTP API server for hostdb.
//!
//! Commands are CLI-shaped: a client first dispatches the command text,
//! follows the redirect to the item's endpoint, fetches the input form with
//! GET and submits the filled form with POST.
//!
//! # Example
//!
//! ```bash
//! # Start the server
//! hostdb serve --listen 127.0.0.1:8080
//!
//! # Resolve the item
//! curl -i 'http://localhost:8080/delete?args=machine'
//!
//! # Fetch the form, then submit it
//! curl -H 'Authorization: Token s3cret' http://localhost:8080/machine/delete
//! curl -X POST http://localhost:8080/machine/delete \
//!   -H 'Authorization: Token s3cret' \
//!   -H "Content-Type: application/json" \
//!   -d '{"form": {"fqdn": "host01.example.com"}}'
//! ```

pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    http::{
        header::{ALLOW, CONTENT_TYPE},
        StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::command::DeleteItem;
use error::ApiError;
use state::ApiState;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Create the API router with all endpoints.
pub fn create_router(state: Arc<ApiState>, request_timeout: Duration) -> Router {
    // Health check route
    let health_route = Router::new().route("/health", get(handlers::health::health));

    // Command dispatch and introspection
    let command_routes = Router::new()
        .route("/delete", get(handlers::commands::dispatch_delete))
        .route("/delete/completion", get(handlers::commands::delete_completion))
        .route("/delete/help", get(handlers::commands::delete_help));

    // Item routes carry their own timeout handling
    let item_routes = DeleteItem::ALL
        .into_iter()
        .fold(Router::new(), |router, item| {
            router.route(item.path(), handlers::delete::item_routes(item, request_timeout))
        });

    // Combine all routes
    Router::new()
        .merge(health_route)
        .merge(command_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .merge(item_routes)
        .fallback(unknown_path)
        .layer(middleware::map_response(render_bare_errors))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn unknown_path() -> ApiError {
    ApiError::UnknownPath
}

/// Replace the empty-bodied responses produced by routing and the timeout
/// layer with the structured payload.
async fn render_bare_errors(response: Response) -> Response {
    if response.headers().contains_key(CONTENT_TYPE) {
        return response;
    }
    match response.status() {
        StatusCode::METHOD_NOT_ALLOWED => {
            let allow = response.headers().get(ALLOW).cloned();
            let mut rendered = ApiError::MethodNotAllowed.into_response();
            if let Some(allow) = allow {
                rendered.headers_mut().insert(ALLOW, allow);
            }
            rendered
        }
        StatusCode::REQUEST_TIMEOUT => ApiError::Timeout.into_response(),
        _ => response,
    }
}
