//! Starting domains: pty tunnel, forwarder, then the namespaced init.

use crate::domain::DomainState;
use crate::error::DriverError;
use crate::process::{forwarder, spawner};
use crate::store;
use crate::tty;

use super::driver::{release_tty, reap_forwarder, DomainHandle, Driver};

impl Driver {
    /// Start a previously defined domain.
    pub fn start_domain(&mut self, dom: &DomainHandle) -> Result<(), DriverError> {
        self.vm_start(&dom.name)
    }

    /// Define a domain from a document and immediately start it. The
    /// fresh record does not survive a failed first start.
    pub fn create_domain(&mut self, doc: &str) -> Result<DomainHandle, DriverError> {
        let handle = self.define_domain(doc)?;

        if let Err(err) = self.vm_start(&handle.name) {
            self.registry.remove_inactive(&handle.uuid);
            return Err(err);
        }

        // Re-read the record for the captured runtime id.
        let record = self
            .registry
            .find_by_uuid(&handle.uuid)
            .ok_or(DriverError::InvalidDomain)?;
        Ok(DomainHandle::from(record))
    }

    /// The start sequence: host-side master, container-side pair,
    /// forwarder, namespaced init, persist, bookkeeping. Any failure
    /// before the spawner succeeds releases everything acquired so far
    /// and leaves the record off.
    fn vm_start(&mut self, name: &str) -> Result<(), DriverError> {
        let Self {
            registry,
            config_dir,
            syscall,
            entry,
        } = self;
        let syscall = syscall.as_ref();

        let record = registry
            .find_by_name_mut(name)
            .ok_or(DriverError::InvalidDomain)?;
        if !record.state().can_start() {
            return Err(DriverError::AlreadyActive);
        }

        let parent_fd = tty::setup_tty_tunnel(syscall, record.def_mut())?;
        record.parent_tty_fd = parent_fd;

        match tty::setup_container_tty(syscall) {
            Ok((master, tty_name)) => {
                record.container_tty_fd = master;
                record.container_tty_name = Some(tty_name);
            }
            Err(err) => {
                release_tty(syscall, record);
                return Err(err.into());
            }
        }

        // No host-side master means nothing to shuttle bytes to.
        if record.parent_tty_fd >= 0 {
            match forwarder::spawn(syscall, record.parent_tty_fd, record.container_tty_fd) {
                Ok(pid) => record.forwarder_pid = Some(pid),
                Err(err) => {
                    release_tty(syscall, record);
                    return Err(err.into());
                }
            }
        }

        let pid = match spawner::spawn_namespaced(syscall, record, *entry) {
            Ok(pid) => pid,
            Err(err) => {
                reap_forwarder(syscall, record);
                release_tty(syscall, record);
                return Err(err.into());
            }
        };
        record.def_mut().id = pid.as_raw();

        // The forwarder inherited its own copy of the container-side
        // master across the fork; drop the parent's.
        if record.forwarder_pid.is_some() {
            if let Err(err) = syscall.close(record.container_tty_fd) {
                tracing::warn!(name, %err, "failed to close container tty copy");
            }
            record.container_tty_fd = -1;
        }

        if let Err(err) = store::save_definition(config_dir, record.def()) {
            tracing::warn!(name, %err, "failed to persist started domain");
        }

        let id = record.def().id;
        record.set_state(DomainState::Running);
        registry.record_activation();
        tracing::debug!(name, id, "domain started");
        Ok(())
    }
}
