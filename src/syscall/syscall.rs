//! An interface trait so the rest of the driver can invoke the kernel
//! primitives it needs without knowing their implementation details.

use std::any::Any;
use std::os::unix::io::RawFd;
use std::path::Path;

use nix::sched::{CloneCb, CloneFlags};
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::{ForkResult, Pid, Uid};

use crate::syscall::linux::LinuxSyscall;
use crate::syscall::test::TestHelperSyscall;
use crate::syscall::Result;

/// The kernel functionality required for container lifecycle management.
///
/// Each method has a narrow contract and no hidden state; the `Linux`
/// implementation performs the real syscall, the `Test` implementation
/// records arguments and replays scripted outcomes.
pub trait Syscall {
    fn as_any(&self) -> &dyn Any;
    /// Effective user id of the calling process.
    fn euid(&self) -> Uid;
    /// Host page size in bytes.
    fn page_size(&self) -> usize;
    /// Create a child process on the given stack with the given clone
    /// flags, delivering SIGCHLD to the parent on exit.
    fn clone_child(&self, cb: CloneCb, stack: &mut [u8], flags: CloneFlags) -> Result<Pid>;
    /// Plain fork, no namespace flags.
    fn fork(&self) -> Result<ForkResult>;
    fn kill(&self, pid: Pid, signal: Signal) -> Result<()>;
    fn waitpid(&self, pid: Pid) -> Result<WaitStatus>;
    /// Open an existing terminal device read/write, non-blocking,
    /// without acquiring it as the controlling terminal.
    fn open_terminal(&self, path: &Path) -> Result<RawFd>;
    /// Open a fresh pseudo-terminal master.
    fn open_pty_master(&self) -> Result<RawFd>;
    fn grant_pty(&self, fd: RawFd) -> Result<()>;
    fn unlock_pty(&self, fd: RawFd) -> Result<()>;
    /// Name of the slave device paired with the given master.
    fn pty_peer_name(&self, fd: RawFd) -> Result<String>;
    /// Switch the terminal to raw mode: no echo, no canonicalization,
    /// 8-bit clean, no signal generation.
    fn set_raw_mode(&self, fd: RawFd) -> Result<()>;
    fn close(&self, fd: RawFd) -> Result<()>;
}

#[derive(Clone, Copy, Debug)]
pub enum SyscallType {
    Linux,
    Test,
}

impl Default for SyscallType {
    fn default() -> Self {
        if cfg!(test) {
            SyscallType::Test
        } else {
            SyscallType::Linux
        }
    }
}

impl SyscallType {
    pub fn create_syscall(&self) -> Box<dyn Syscall> {
        match self {
            SyscallType::Linux => Box::new(LinuxSyscall),
            SyscallType::Test => Box::<TestHelperSyscall>::default(),
        }
    }
}

pub fn create_syscall() -> Box<dyn Syscall> {
    SyscallType::default().create_syscall()
}
