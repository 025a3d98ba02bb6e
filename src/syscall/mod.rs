//! Typed shims over the raw kernel surface so the lifecycle controller
//! can be driven against a mock platform in tests.

pub mod linux;
#[allow(clippy::module_inception)]
pub mod syscall;

pub use syscall::{create_syscall, Syscall, SyscallType};

/// Shim methods surface the raw errno; callers wrap it with context.
pub type Result<T> = std::result::Result<T, nix::errno::Errno>;
