//! Delete handlers.
//!
//! Each [`DeleteItem`] has a handler implementing [`DeleteHandler`]. All
//! handlers share the same two-phase contract:
//!
//! - [`describe`]: return the input form, no side effects
//! - [`execute`]: authorize, validate the submitted form against the same
//!   schema, resolve the machine, run the item-specific action and report
//!   what was removed
//!
//! Any failure is terminal for the request; later steps are never applied
//! and nothing is retried.

mod machine;
mod remote_power;
mod serial_console;

use crate::auth::{require_superuser, Access, Principal, SUPERUSER_REQUIRED};
use crate::command::DeleteItem;
use crate::error::Error;
use crate::form::{FieldSpec, FormErrors, FormSchema};
use crate::model::{fqdn_key, Machine};
use crate::storage::{DeletionResult, ResourceRepository};
use crate::virt::BackendRegistry;
use hostdb_protocol::{Column, ErrorKind, Response, SubmitRequest};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

pub use machine::MachineDelete;
pub use remote_power::RemotePowerDelete;
pub use serial_console::SerialConsoleDelete;

/// Message reported for unanticipated failures.
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong!";

/// Message reported when a virtual machine's hypervisor has no usable backend.
pub const NO_VIRTUALIZATION_API: &str = "No virtualization API found!";

/// Failures of a describe or execute request.
#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error("authentication required")]
    AuthRequired,

    #[error("{}", SUPERUSER_REQUIRED)]
    Forbidden,

    #[error("Invalid request body!")]
    BadRequest,

    #[error("{0}")]
    Validation(FormErrors),

    #[error("Machine '{0}' not found!")]
    NotFound(String),

    #[error("Machine '{0}' is busy!")]
    Conflict(String),

    #[error("{0}")]
    PreconditionFailed(&'static str),

    #[error("{0}")]
    Configuration(&'static str),

    #[error("{}", INTERNAL_ERROR_MESSAGE)]
    Internal(#[source] Error),
}

impl From<Error> for DeleteError {
    fn from(e: Error) -> Self {
        match e {
            Error::MachineNotFound(fqdn) => DeleteError::NotFound(fqdn),
            other => DeleteError::Internal(other),
        }
    }
}

impl DeleteError {
    /// Error kind reported to the client, `None` for [`DeleteError::AuthRequired`].
    pub fn kind(&self) -> Option<ErrorKind> {
        Some(match self {
            DeleteError::AuthRequired => return None,
            DeleteError::Forbidden => ErrorKind::Forbidden,
            DeleteError::BadRequest => ErrorKind::BadRequest,
            DeleteError::Validation(_) => ErrorKind::ValidationError,
            DeleteError::NotFound(_) => ErrorKind::NotFound,
            DeleteError::Conflict(_) => ErrorKind::Conflict,
            DeleteError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            DeleteError::Configuration(_) => ErrorKind::ConfigurationError,
            DeleteError::Internal(_) => ErrorKind::InternalError,
        })
    }

    /// Client-facing payload. Internal details never leave the server.
    pub fn to_response(&self) -> Response {
        match self.kind() {
            None => Response::auth_required(),
            Some(kind) => Response::error(kind, self.to_string()),
        }
    }
}

/// Machines with a delete currently in progress.
#[derive(Debug, Default)]
pub struct InFlight {
    fqdns: Mutex<HashSet<String>>,
}

impl InFlight {
    /// Claim `fqdn`, or `None` if another request holds it.
    pub fn try_acquire(&self, fqdn: &str) -> Option<InFlightGuard<'_>> {
        let key = fqdn_key(fqdn);
        if !self.fqdns.lock().insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard { owner: self, key })
    }
}

/// Releases its fqdn on drop.
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.fqdns.lock().remove(&self.key);
    }
}

/// Collaborators the delete handlers act on.
pub struct DeleteContext {
    pub repository: Arc<dyn ResourceRepository>,
    pub backends: BackendRegistry,
    pub in_flight: InFlight,
}

impl DeleteContext {
    pub fn new(repository: Arc<dyn ResourceRepository>, backends: BackendRegistry) -> Self {
        Self {
            repository,
            backends,
            in_flight: InFlight::default(),
        }
    }
}

/// Shared capability of the per-item handlers.
pub trait DeleteHandler: Send + Sync {
    /// Item this handler deletes.
    fn item(&self) -> DeleteItem;

    /// Input schema, shared by describe and execute.
    fn schema(&self) -> FormSchema {
        FormSchema::new(self.item().path()).field(FieldSpec::fqdn())
    }

    /// Check the item-specific precondition and delete.
    fn perform(&self, ctx: &DeleteContext, machine: &Machine) -> Result<DeletionResult, DeleteError>;
}

static MACHINE: MachineDelete = MachineDelete;
static SERIAL_CONSOLE: SerialConsoleDelete = SerialConsoleDelete;
static REMOTE_POWER: RemotePowerDelete = RemotePowerDelete;

/// Handler for an item.
pub fn handler(item: DeleteItem) -> &'static dyn DeleteHandler {
    match item {
        DeleteItem::Machine => &MACHINE,
        DeleteItem::SerialConsole => &SERIAL_CONSOLE,
        DeleteItem::RemotePower => &REMOTE_POWER,
    }
}

/// Require a superuser for any delete phase.
pub fn authorize(principal: &Principal) -> Result<(), DeleteError> {
    match require_superuser(principal) {
        Access::Granted => Ok(()),
        Access::AuthRequired => Err(DeleteError::AuthRequired),
        Access::Forbidden => Err(DeleteError::Forbidden),
    }
}

/// Describe phase: the form the client must submit.
pub fn describe(handler: &dyn DeleteHandler, principal: &Principal) -> Result<Response, DeleteError> {
    authorize(principal)?;
    Ok(handler.schema().to_response())
}

/// Parse an execute body of the form `{"form": {...}}`.
pub fn parse_body(body: &[u8]) -> Result<Map<String, Value>, DeleteError> {
    serde_json::from_slice::<SubmitRequest>(body)
        .map(|req| req.form)
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected request body");
            DeleteError::BadRequest
        })
}

/// Execute phase on a raw request body of the form `{"form": {...}}`.
pub fn execute(
    handler: &dyn DeleteHandler,
    ctx: &DeleteContext,
    principal: &Principal,
    body: &[u8],
) -> Result<Response, DeleteError> {
    execute_with(handler, ctx, principal, || parse_body(body))
}

/// Execute phase on already decoded form values.
pub fn execute_form(
    handler: &dyn DeleteHandler,
    ctx: &DeleteContext,
    principal: &Principal,
    form: &Map<String, Value>,
) -> Result<Response, DeleteError> {
    execute_with(handler, ctx, principal, || Ok(form.clone()))
}

fn execute_with<F>(
    handler: &dyn DeleteHandler,
    ctx: &DeleteContext,
    principal: &Principal,
    form: F,
) -> Result<Response, DeleteError>
where
    F: FnOnce() -> Result<Map<String, Value>, DeleteError>,
{
    let item = handler.item();
    let result = run(handler, ctx, principal, form);

    match &result {
        Ok(_) => {}
        Err(DeleteError::Internal(e)) => {
            tracing::error!(item = %item, user = %principal.name(), error = %e, "delete failed");
        }
        Err(e) => {
            tracing::info!(item = %item, user = %principal.name(), reason = %e, "delete rejected");
        }
    }

    result.map(|removed| deletion_table(&removed))
}

/// Received -> Authorized -> Validated -> Resolved -> Deleted.
fn run<F>(
    handler: &dyn DeleteHandler,
    ctx: &DeleteContext,
    principal: &Principal,
    form: F,
) -> Result<DeletionResult, DeleteError>
where
    F: FnOnce() -> Result<Map<String, Value>, DeleteError>,
{
    authorize(principal)?;

    let form = form()?;
    let cleaned = handler.schema().validate(&form).map_err(DeleteError::Validation)?;
    let fqdn = cleaned.get_str("fqdn").ok_or(DeleteError::BadRequest)?;

    let _guard = ctx
        .in_flight
        .try_acquire(fqdn)
        .ok_or_else(|| DeleteError::Conflict(fqdn.to_string()))?;

    let machine = ctx
        .repository
        .get_machine(fqdn)?
        .ok_or_else(|| DeleteError::NotFound(fqdn.to_string()))?;

    let removed = handler.perform(ctx, &machine)?;
    tracing::info!(
        item = %handler.item(),
        fqdn = %machine.fqdn,
        user = %principal.name(),
        removed = removed.total(),
        "deleted"
    );
    Ok(removed)
}

/// Strip the storage namespace from a kind name (`data.Machine` -> `Machine`).
pub fn strip_namespace(kind: &str) -> &str {
    kind.rsplit_once('.').map(|(_, name)| name).unwrap_or(kind)
}

/// Render a deletion result as a `Deleted objects | #` table.
pub fn deletion_table(removed: &DeletionResult) -> Response {
    let data = removed
        .iter()
        .map(|(kind, count)| {
            let mut row = Map::new();
            row.insert("objects".into(), Value::from(strip_namespace(kind)));
            row.insert("count".into(), Value::from(count));
            row
        })
        .collect();

    Response::Table {
        header: vec![
            Column::new("objects", "Deleted objects"),
            Column::new("count", "#"),
        ],
        data,
    }
}
