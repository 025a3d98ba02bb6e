//! Soft shutdown: ask the namespaced init to stop.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::domain::DomainState;
use crate::error::DriverError;

use super::driver::{DomainHandle, Driver};

impl Driver {
    /// Send SIGINT to the container init to request shutdown. A target
    /// that is already gone is not an error. Does not wait: the domain
    /// stays in the active partition until it is destroyed.
    pub fn shutdown_domain(&mut self, dom: &DomainHandle) -> Result<(), DriverError> {
        let Self {
            registry, syscall, ..
        } = self;

        let record = registry
            .find_by_id_mut(dom.id)
            .ok_or(DriverError::InvalidDomain)?;
        let pid = Pid::from_raw(record.def().id);

        match syscall.kill(pid, Signal::SIGINT) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(err) => {
                tracing::error!(name = %record.def().name, %err, "sending SIGINT failed");
                return Err(DriverError::Syscall {
                    msg: "sending SIGINT failed",
                    source: err,
                });
            }
        }

        record.set_state(DomainState::ShuttingDown);
        Ok(())
    }
}
