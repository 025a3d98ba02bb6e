//! Startup probe that the kernel accepts the namespace flag union.

use nix::errno::Errno;

use crate::process::spawner::{namespace_flags, CHILD_STACK_PAGES};
use crate::syscall::Syscall;

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("kernel does not support the required container namespaces")]
    NotSupported,
}

/// Attempt a short-lived child with every required namespace flag set
/// and a trivial entry. EINVAL from the clone primitive is the one
/// reliable signal that the kernel rejects the flag combination; any
/// other outcome counts as supported, and a live child is reaped.
pub fn check_container_support(syscall: &dyn Syscall) -> Result<(), CapabilityError> {
    let mut stack = vec![0u8; CHILD_STACK_PAGES * syscall.page_size()];

    match syscall.clone_child(Box::new(|| 0), &mut stack, namespace_flags()) {
        Ok(pid) => {
            if let Err(err) = syscall.waitpid(pid) {
                tracing::warn!(?pid, %err, "failed to reap namespace probe child");
            }
            Ok(())
        }
        Err(Errno::EINVAL) => {
            tracing::debug!("clone returned EINVAL, container support is not enabled");
            Err(CapabilityError::NotSupported)
        }
        Err(err) => {
            tracing::debug!(%err, "namespace probe failed for another reason, assuming support");
            Ok(())
        }
    }
}
