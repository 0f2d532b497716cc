//! Machine deletion.

use super::{DeleteContext, DeleteError, DeleteHandler, NO_VIRTUALIZATION_API};
use crate::command::DeleteItem;
use crate::model::Machine;
use crate::storage::DeletionResult;

/// Deletes a machine with everything that depends on it.
///
/// Virtual machines are decommissioned through their hypervisor's backend
/// first. When that fails the record is kept.
pub struct MachineDelete;

impl DeleteHandler for MachineDelete {
    fn item(&self) -> DeleteItem {
        DeleteItem::Machine
    }

    fn perform(&self, ctx: &DeleteContext, machine: &Machine) -> Result<DeletionResult, DeleteError> {
        if machine.is_virtual_machine() {
            let hypervisor = machine
                .hypervisor
                .as_deref()
                .map(|fqdn| ctx.repository.get_machine(fqdn))
                .transpose()?
                .flatten();

            let backend = hypervisor
                .as_ref()
                .and_then(|hv| ctx.backends.for_hypervisor(hv))
                .ok_or(DeleteError::Configuration(NO_VIRTUALIZATION_API))?;

            backend.decommission(machine).map_err(DeleteError::Internal)?;
            tracing::info!(
                fqdn = %machine.fqdn,
                backend = backend.kind(),
                "virtual machine decommissioned"
            );
        }

        Ok(ctx.repository.delete_machine(&machine.fqdn)?)
    }
}
