//! Crate-level error type for driver operations.

use nix::errno::Errno;

use crate::capability::CapabilityError;
use crate::domain::DefinitionError;
use crate::process::forwarder::ForwarderError;
use crate::process::spawner::SpawnError;
use crate::registry::RegistryError;
use crate::store::StoreError;
use crate::tty::TtyError;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Lookup miss by id, uuid, or name.
    #[error("no domain with matching {0}")]
    NoDomain(&'static str),
    /// An operation referenced a domain the registry no longer knows.
    #[error("domain no longer exists")]
    InvalidDomain,
    #[error("domain is already active")]
    AlreadyActive,
    #[error("cannot delete active domain")]
    CannotDeleteActive,
    #[error("the driver requires superuser privileges")]
    NotSuperuser,
    #[error("the driver has not been started")]
    NotStarted,
    /// A raw syscall failed, carrying the system error.
    #[error("{msg}: {source}")]
    Syscall { msg: &'static str, source: Errno },
    /// Inconsistency the driver can report but not attribute to errno.
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Tty(#[from] TtyError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Forwarder(#[from] ForwarderError),
}
