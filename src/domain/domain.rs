//! The in-memory lifecycle object for a single domain.

use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use nix::unistd::Pid;

use crate::domain::{DomainDefinition, DomainState};

/// A domain record owns its definition and, while the domain runs, the
/// pty file descriptors and the forwarder pid. The fds are raw on
/// purpose: they are closed exactly once, through the syscall shim, on
/// start-failure cleanup or on destroy.
#[derive(Debug)]
pub struct DomainRecord {
    pub(crate) def: DomainDefinition,
    pub(crate) state: DomainState,
    /// Host-side master pty fd, -1 when unset.
    pub(crate) parent_tty_fd: RawFd,
    /// Container-side master pty fd, -1 when unset.
    pub(crate) container_tty_fd: RawFd,
    /// Slave pty path handed to the container as its controlling tty.
    pub(crate) container_tty_name: Option<String>,
    pub(crate) forwarder_pid: Option<Pid>,
    /// On-disk location of the persisted definition.
    pub(crate) config_path: Option<PathBuf>,
}

impl DomainRecord {
    pub fn new(def: DomainDefinition) -> Self {
        Self {
            def,
            state: DomainState::Off,
            parent_tty_fd: -1,
            container_tty_fd: -1,
            container_tty_name: None,
            forwarder_pid: None,
            config_path: None,
        }
    }

    pub fn def(&self) -> &DomainDefinition {
        &self.def
    }

    pub(crate) fn def_mut(&mut self) -> &mut DomainDefinition {
        &mut self.def
    }

    pub fn state(&self) -> DomainState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: DomainState) {
        self.state = state;
    }

    /// A domain is active while its init pid is known, which covers both
    /// `Running` and the window between `shutdown` and the reap.
    pub fn is_active(&self) -> bool {
        self.def.id >= 0
    }

    pub fn init_pid(&self) -> Option<Pid> {
        (self.def.id >= 0).then(|| Pid::from_raw(self.def.id))
    }

    pub fn parent_tty_fd(&self) -> RawFd {
        self.parent_tty_fd
    }

    pub fn container_tty_fd(&self) -> RawFd {
        self.container_tty_fd
    }

    pub fn container_tty_name(&self) -> Option<&str> {
        self.container_tty_name.as_deref()
    }

    pub fn forwarder_pid(&self) -> Option<Pid> {
        self.forwarder_pid
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}


#[cfg(test)]
pub(crate) use tests::record as test_record;
