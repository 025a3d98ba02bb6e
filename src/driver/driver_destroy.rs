//! Forced termination: kill, reap, and reconcile a domain.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::domain::DomainState;
use crate::error::DriverError;

use super::driver::{release_tty, wait_past_interrupts, DomainHandle, Driver};

impl Driver {
    /// Kill the namespaced init and the forwarder, reap both, and
    /// reconcile the record to shut-off. Processes that are already
    /// gone are silently skipped; other intermediate failures are
    /// collected and the first one is returned, but only after the
    /// bookkeeping has converged.
    pub fn destroy_domain(&mut self, dom: &DomainHandle) -> Result<(), DriverError> {
        let Self {
            registry, syscall, ..
        } = self;
        let syscall = syscall.as_ref();

        let record = registry
            .find_by_id_mut(dom.id)
            .ok_or(DriverError::InvalidDomain)?;
        let init_pid = Pid::from_raw(record.def().id);
        let name = record.def().name.clone();

        let mut first_err: Option<DriverError> = None;

        match syscall.kill(init_pid, Signal::SIGKILL) {
            Ok(()) => {
                record.set_state(DomainState::ShuttingDown);
                match wait_past_interrupts(syscall, init_pid) {
                    Ok(status) if status.pid() == Some(init_pid) => {
                        tracing::debug!(name = %name, ?status, "container exited");
                    }
                    Ok(status) => {
                        tracing::error!(name = %name, ?status, "waited for an unexpected child");
                        first_err.get_or_insert(DriverError::Internal(format!(
                            "waitpid reaped an unexpected child for container {init_pid}"
                        )));
                    }
                    Err(err) => {
                        tracing::error!(name = %name, %err, "waitpid on container failed");
                        first_err.get_or_insert(DriverError::Syscall {
                            msg: "waitpid on container failed",
                            source: err,
                        });
                    }
                }
            }
            // Already gone, possibly reaped by someone else: nothing to
            // wait for, reconcile the record anyway.
            Err(Errno::ESRCH) => {}
            Err(err) => {
                tracing::error!(name = %name, %err, "sending SIGKILL failed");
                return Err(DriverError::Syscall {
                    msg: "sending SIGKILL failed",
                    source: err,
                });
            }
        }

        // The forwarder is reaped independently: it may have died long
        // before the init, or be the only one left alive.
        if let Some(fwd_pid) = record.forwarder_pid {
            match syscall.kill(fwd_pid, Signal::SIGKILL) {
                Ok(()) => match wait_past_interrupts(syscall, fwd_pid) {
                    Ok(status) if status.pid() == Some(fwd_pid) => {}
                    Ok(status) => {
                        tracing::error!(name = %name, ?status, "waited for an unexpected child");
                        first_err.get_or_insert(DriverError::Internal(format!(
                            "waitpid reaped an unexpected child for tty forwarder {fwd_pid}"
                        )));
                    }
                    Err(err) => {
                        tracing::error!(name = %name, %err, "waitpid on tty forwarder failed");
                        first_err.get_or_insert(DriverError::Syscall {
                            msg: "waitpid on tty forwarder failed",
                            source: err,
                        });
                    }
                },
                Err(Errno::ESRCH) => {}
                Err(err) => {
                    tracing::error!(name = %name, %err, "sending SIGKILL to tty forwarder failed");
                    first_err.get_or_insert(DriverError::Syscall {
                        msg: "sending SIGKILL to tty forwarder failed",
                        source: err,
                    });
                }
            }
        }

        release_tty(syscall, record);
        record.forwarder_pid = None;
        record.def_mut().id = -1;
        record.set_state(DomainState::ShutOff);
        registry.record_deactivation();

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
