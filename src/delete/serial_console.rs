//! Serial console deletion.

use super::{DeleteContext, DeleteError, DeleteHandler};
use crate::command::DeleteItem;
use crate::error::Error;
use crate::model::Machine;
use crate::storage::DeletionResult;

const NO_SERIAL_CONSOLE: &str = "Machine has no serial console!";

/// Deletes the serial console of a machine.
pub struct SerialConsoleDelete;

impl DeleteHandler for SerialConsoleDelete {
    fn item(&self) -> DeleteItem {
        DeleteItem::SerialConsole
    }

    fn perform(&self, ctx: &DeleteContext, machine: &Machine) -> Result<DeletionResult, DeleteError> {
        if ctx.repository.serial_console(&machine.fqdn)?.is_none() {
            return Err(DeleteError::PreconditionFailed(NO_SERIAL_CONSOLE));
        }

        // The console can still vanish between the check and the delete.
        match ctx.repository.delete_serial_console(&machine.fqdn) {
            Err(Error::RecordNotFound { .. }) => Err(DeleteError::PreconditionFailed(NO_SERIAL_CONSOLE)),
            other => Ok(other?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use crate::delete::tests::{context, fqdn_form, rows};
    use crate::delete::{execute_form, handler};
    use crate::model::{RemotePower, SerialConsole};
    use crate::storage::tests::CSCREEN;
    use hostdb_protocol::ErrorKind;

    #[test]
    fn test_delete_serial_console() {
        let (_dir, ctx) = context();
        let fqdn = "host01.example.com";
        ctx.repository.put_machine(&Machine::new(CSCREEN)).unwrap();
        ctx.repository.put_machine(&Machine::new(fqdn)).unwrap();
        ctx.repository
            .put_serial_console(&SerialConsole::new(fqdn, "IPMI", CSCREEN))
            .unwrap();
        ctx.repository
            .put_remote_power(&RemotePower::new(fqdn, "ipmilanplus"))
            .unwrap();

        let response = execute_form(
            handler(DeleteItem::SerialConsole),
            &ctx,
            &Principal::operator(),
            &fqdn_form(fqdn),
        )
        .unwrap();
        assert_eq!(rows(&response), vec![("SerialConsole".to_string(), 1)]);

        assert!(ctx.repository.serial_console(fqdn).unwrap().is_none());
        assert!(ctx.repository.remote_power(fqdn).unwrap().is_some());
        assert!(ctx.repository.get_machine(fqdn).unwrap().is_some());
    }

    #[test]
    fn test_machine_without_serial_console() {
        let (_dir, ctx) = context();
        let fqdn = "host01.example.com";
        ctx.repository.put_machine(&Machine::new(fqdn)).unwrap();

        let err = execute_form(
            handler(DeleteItem::SerialConsole),
            &ctx,
            &Principal::operator(),
            &fqdn_form(fqdn),
        )
        .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::PreconditionFailed));
        assert_eq!(err.to_string(), "Machine has no serial console!");
        assert!(ctx.repository.get_machine(fqdn).unwrap().is_some());
    }
}
