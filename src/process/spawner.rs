//! Spawns the namespaced init process for a domain.

use nix::sched::CloneFlags;
use nix::unistd::Pid;

use crate::domain::DomainRecord;
use crate::syscall::Syscall;

/// First code run inside the namespaced child; never returns control to
/// the driver. Supplied by the embedder.
pub type ContainerEntry = fn(&DomainRecord) -> isize;

/// The child stack only has to carry the entry routine up to its exec.
pub const CHILD_STACK_PAGES: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("clone() failed")]
    Clone { source: nix::errno::Errno },
}

/// Namespaces every container gets: its own pid 1, mount table,
/// hostname, uid/gid mappings, and IPC objects.
pub fn namespace_flags() -> CloneFlags {
    CloneFlags::CLONE_NEWPID
        | CloneFlags::CLONE_NEWNS
        | CloneFlags::CLONE_NEWUTS
        | CloneFlags::CLONE_NEWUSER
        | CloneFlags::CLONE_NEWIPC
}

/// Clone the container init with the namespace flag set, running the
/// entry routine against the record. Returns the host-visible pid.
///
/// The stack buffer lives only for the duration of this call: without
/// CLONE_VM the child runs on a copy of the address space, so the
/// parent's allocation can be released once clone returns.
pub fn spawn_namespaced(
    syscall: &dyn Syscall,
    record: &DomainRecord,
    entry: ContainerEntry,
) -> Result<Pid, SpawnError> {
    let mut stack = vec![0u8; CHILD_STACK_PAGES * syscall.page_size()];

    let pid = syscall
        .clone_child(Box::new(|| entry(record)), &mut stack, namespace_flags())
        .map_err(|err| SpawnError::Clone { source: err })?;

    tracing::debug!(name = %record.def().name, ?pid, "clone() returned");
    Ok(pid)
}
