//! Remote power deletion.

use super::{DeleteContext, DeleteError, DeleteHandler};
use crate::command::DeleteItem;
use crate::error::Error;
use crate::model::Machine;
use crate::storage::DeletionResult;

const NO_REMOTE_POWER: &str = "Machine has no remote power!";

/// Deletes the remote power of a machine.
pub struct RemotePowerDelete;

impl DeleteHandler for RemotePowerDelete {
    fn item(&self) -> DeleteItem {
        DeleteItem::RemotePower
    }

    fn perform(&self, ctx: &DeleteContext, machine: &Machine) -> Result<DeletionResult, DeleteError> {
        if ctx.repository.remote_power(&machine.fqdn)?.is_none() {
            return Err(DeleteError::PreconditionFailed(NO_REMOTE_POWER));
        }

        match ctx.repository.delete_remote_power(&machine.fqdn) {
            Err(Error::RecordNotFound { .. }) => Err(DeleteError::PreconditionFailed(NO_REMOTE_POWER)),
            other => Ok(other?),
        }
    }
}
