//! Command dispatch and introspection handlers.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::state::ApiState;
use crate::command::{self, DELETE};

/// Query of the dispatch endpoint.
#[derive(Debug, Deserialize)]
pub struct DispatchQuery {
    /// Raw argument string, e.g. `machine`.
    pub args: Option<String>,
}

/// Help metadata of a command.
#[derive(Debug, Serialize)]
pub struct CommandHelp {
    pub name: &'static str,
    pub method: &'static str,
    pub url: &'static str,
    pub arguments: &'static [&'static str],
    pub help_short: &'static str,
    pub help: &'static str,
}

/// GET /delete?args=<item> - Resolve the item and redirect to its handler.
pub async fn dispatch_delete(
    query: Result<Query<DispatchQuery>, QueryRejection>,
) -> Result<Redirect, ApiError> {
    let Query(query) = query?;
    let item = command::dispatch(query.args.as_deref())?;
    Ok(Redirect::temporary(item.path()))
}

/// GET /delete/completion - Item names for tab completion.
pub async fn delete_completion(State(state): State<Arc<ApiState>>) -> Json<Vec<&'static str>> {
    Json(state.registry().list_command_names().into_iter().collect())
}

/// GET /delete/help - Help text of the delete command.
pub async fn delete_help(State(state): State<Arc<ApiState>>) -> Json<CommandHelp> {
    let command = state.registry().command(DELETE.name).unwrap_or(&DELETE);
    Json(CommandHelp {
        name: command.name,
        method: command.method,
        url: command.url,
        arguments: command.arguments,
        help_short: command.help_short,
        help: command.help,
    })
}
