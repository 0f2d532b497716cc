//! Wire types for the hostdb command API.
//!
//! Every answer the server gives is a [`Response`]. Clients (the CLI,
//! a web UI) discriminate outcomes by the `type` tag of the payload, never
//! by the HTTP status code alone.
//!
//! ```json
//! {"type": "ERROR", "kind": "UNKNOWN_ITEM", "message": "Unknown item 'bogus'!"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Message carried by [`Response::AuthRequired`].
pub const AUTH_REQUIRED_MESSAGE: &str = "Authentication required!";

/// A structured API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    /// The caller must authenticate before retrying.
    AuthRequired {
        /// Human readable hint.
        message: String,
    },

    /// The request failed.
    Error {
        /// Machine readable failure category.
        kind: ErrorKind,
        /// Human readable message, safe to show to the caller.
        message: String,
    },

    /// Tabular result.
    Table {
        /// Column definitions, in display order.
        header: Vec<Column>,
        /// One object per row, keyed by [`Column::key`].
        data: Vec<Map<String, Value>>,
    },

    /// Input form the client must fill in and submit to `url`.
    Input {
        /// Path the filled form must be POSTed to.
        url: String,
        /// Field keys in display order.
        order: Vec<String>,
        /// Field descriptions, in the same order as `order`.
        fields: Vec<InputField>,
    },
}

impl Response {
    /// Build an [`Response::AuthRequired`] payload.
    pub fn auth_required() -> Self {
        Response::AuthRequired {
            message: AUTH_REQUIRED_MESSAGE.to_string(),
        }
    }

    /// Build an [`Response::Error`] payload.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error {
            kind,
            message: message.into(),
        }
    }
}

/// Failure categories reported in [`Response::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// No command text was supplied.
    MissingArgument,
    /// The command names an item outside the registry.
    UnknownItem,
    /// Sub-arguments were given where none are accepted.
    InvalidArgumentCount,
    /// The caller is authenticated but lacks the required privilege.
    Forbidden,
    /// The request query or body could not be parsed.
    BadRequest,
    /// The endpoint does not accept the request method.
    MethodNotAllowed,
    /// The request did not finish within the server's time limit.
    Timeout,
    /// The submitted form failed field validation.
    ValidationError,
    /// The target resource does not exist.
    NotFound,
    /// The target resource is being modified by another request.
    Conflict,
    /// The target lacks the sub-resource being deleted.
    PreconditionFailed,
    /// Server-side configuration does not allow the operation.
    ConfigurationError,
    /// Anything else. Details are only logged server side.
    InternalError,
}

/// A table column, on the wire a single-entry object `{key: title}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<String, String>", try_from = "BTreeMap<String, String>")]
pub struct Column {
    /// Key used in row objects.
    pub key: String,
    /// Column title.
    pub title: String,
}

impl Column {
    /// Create a column.
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
        }
    }
}

impl From<Column> for BTreeMap<String, String> {
    fn from(column: Column) -> Self {
        BTreeMap::from([(column.key, column.title)])
    }
}

impl TryFrom<BTreeMap<String, String>> for Column {
    type Error = String;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut entries = map.into_iter();
        match (entries.next(), entries.next()) {
            (Some((key, title)), None) => Ok(Column { key, title }),
            _ => Err("column must be a single-entry object".to_string()),
        }
    }
}

/// Value type of an input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text.
    String,
    /// Whole number.
    Integer,
    /// Yes/no.
    Boolean,
}

/// Client-facing description of one input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    /// Key the value must be submitted under.
    pub key: String,
    /// Prompt shown to the user.
    pub label: String,
    /// Value type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether a value must be supplied.
    pub required: bool,
    /// Maximum length for string values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Pre-filled value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<Value>,
    /// Extra help shown next to the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

/// Body of an execute request: the filled form under the `form` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Field values keyed by [`InputField::key`].
    pub form: Map<String, Value>,
}

/// Response of the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok` when the server answers.
    pub status: String,
    /// Server version.
    pub version: String,
}
