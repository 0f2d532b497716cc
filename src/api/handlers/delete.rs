//! Describe and execute handlers of the delete items.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::HeaderMap,
    routing::{get, MethodRouter},
    Json,
};
use hostdb_protocol::Response;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::api::error::ApiError;
use crate::api::state::ApiState;
use crate::command::DeleteItem;
use crate::delete;

/// GET and POST routes for one item.
///
/// Only describe is bounded by `request_timeout`. Execute always answers
/// with the outcome of the deletion; backend programs carry their own
/// timeout.
pub fn item_routes(item: DeleteItem, request_timeout: Duration) -> MethodRouter<Arc<ApiState>> {
    get(move |state: State<Arc<ApiState>>, headers: HeaderMap| {
        describe_item(item, state, headers)
    })
    .layer(TimeoutLayer::new(request_timeout))
    .post(
        move |state: State<Arc<ApiState>>,
              headers: HeaderMap,
              body: Result<Bytes, BytesRejection>| {
            execute_item(item, state, headers, body)
        },
    )
}

/// GET /<item>/delete - Return the input form.
pub async fn describe_item(
    item: DeleteItem,
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<Response>, ApiError> {
    let principal = state.authenticate(&headers);
    let response = delete::describe(delete::handler(item), &principal)?;
    Ok(Json(response))
}

/// POST /<item>/delete - Validate the submitted form and delete.
///
/// Storage and backend calls block, so the whole execution runs on the
/// blocking pool.
pub async fn execute_item(
    item: DeleteItem,
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Response>, ApiError> {
    let principal = state.authenticate(&headers);

    // An unreadable body is only reported to callers allowed to delete.
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            delete::authorize(&principal)?;
            return Err(rejection.into());
        }
    };

    let response = tokio::task::spawn_blocking(move || {
        delete::execute(
            delete::handler(item),
            state.delete_context(),
            &principal,
            &body,
        )
    })
    .await??;

    Ok(Json(response))
}
