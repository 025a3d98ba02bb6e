//! Implements the syscall shims for Linux hosts.

use std::any::Any;
use std::ffi::CStr;
use std::os::fd::BorrowedFd;
use std::os::unix::io::RawFd;
use std::path::Path;

use libc::c_int;
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::sched::{self, CloneCb, CloneFlags};
use nix::sys::signal::{self, Signal};
use nix::sys::stat::Mode;
use nix::sys::termios::{self, SetArg};
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, ForkResult, Pid, Uid};

use super::{Result, Syscall};

/// Empty structure to implement the Syscall trait for.
#[derive(Clone)]
pub struct LinuxSyscall;

impl Syscall for LinuxSyscall {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn euid(&self) -> Uid {
        unistd::geteuid()
    }

    fn page_size(&self) -> usize {
        // Fall back to 4K if sysconf cannot answer.
        match unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) } {
            -1 => 4 * 1024,
            x => x as usize,
        }
    }

    fn clone_child(&self, cb: CloneCb, stack: &mut [u8], flags: CloneFlags) -> Result<Pid> {
        // SIGCHLD mimics fork so the child can be reaped with waitpid.
        unsafe { sched::clone(cb, stack, flags, Some(Signal::SIGCHLD as c_int)) }
    }

    fn fork(&self) -> Result<ForkResult> {
        unsafe { unistd::fork() }
    }

    fn kill(&self, pid: Pid, signal: Signal) -> Result<()> {
        signal::kill(pid, signal)
    }

    fn waitpid(&self, pid: Pid) -> Result<WaitStatus> {
        wait::waitpid(pid, None)
    }

    fn open_terminal(&self, path: &Path) -> Result<RawFd> {
        open(
            path,
            OFlag::O_RDWR | OFlag::O_NOCTTY | OFlag::O_NONBLOCK,
            Mode::empty(),
        )
    }

    fn open_pty_master(&self) -> Result<RawFd> {
        // nix only exposes the pty calls on its owning PtyMaster type;
        // the record tracks raw fds, so go through libc here.
        Errno::result(unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) })
    }

    fn grant_pty(&self, fd: RawFd) -> Result<()> {
        Errno::result(unsafe { libc::grantpt(fd) }).map(drop)
    }

    fn unlock_pty(&self, fd: RawFd) -> Result<()> {
        Errno::result(unsafe { libc::unlockpt(fd) }).map(drop)
    }

    fn pty_peer_name(&self, fd: RawFd) -> Result<String> {
        let mut buf = [0u8; 128];
        let ret = unsafe { libc::ptsname_r(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if ret != 0 {
            return Err(Errno::from_raw(ret));
        }
        let name = CStr::from_bytes_until_nul(&buf)
            .map_err(|_| Errno::EINVAL)?
            .to_string_lossy()
            .into_owned();
        Ok(name)
    }

    fn set_raw_mode(&self, fd: RawFd) -> Result<()> {
        let fd = unsafe { BorrowedFd::borrow_raw(fd) };
        let mut attr = termios::tcgetattr(fd)?;
        termios::cfmakeraw(&mut attr);
        termios::tcsetattr(fd, SetArg::TCSADRAIN, &attr)
    }

    fn close(&self, fd: RawFd) -> Result<()> {
        unistd::close(fd)
    }
}
