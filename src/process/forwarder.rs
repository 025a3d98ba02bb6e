//! The tty forwarder: a side-car child that shuttles bytes between the
//! host-side and container-side pty masters.

use std::os::fd::BorrowedFd;
use std::os::unix::io::RawFd;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd::{self, ForkResult, Pid};

use crate::syscall::Syscall;

/// Bytes copied per readiness event. One is the historical choice for a
/// console tunnel; any larger buffer must keep per-direction ordering.
const FORWARD_BUF_LEN: usize = 1;

#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error("unable to fork tty forwarding process")]
    Fork { source: Errno },
    #[error("poll returned error")]
    Poll { source: Errno },
    #[error("read of fd {fd} failed")]
    Read { fd: RawFd, source: Errno },
    #[error("write to fd {fd} failed")]
    Write { fd: RawFd, source: Errno },
    #[error("end of stream on fd {fd}")]
    HangUp { fd: RawFd },
}

type Result<T> = std::result::Result<T, ForwarderError>;

/// Fork the forwarder for a running domain. The child never returns:
/// it loops in [`forward`] until one side hangs up, then exits.
pub fn spawn(syscall: &dyn Syscall, host_fd: RawFd, container_fd: RawFd) -> Result<Pid> {
    match syscall.fork() {
        Ok(ForkResult::Parent { child }) => Ok(child),
        Ok(ForkResult::Child) => {
            let err = forward(host_fd, container_fd).unwrap_err();
            tracing::debug!(%err, "tty forwarder finished");
            std::process::exit(1);
        }
        Err(errno) => Err(ForwarderError::Fork { source: errno }),
    }
}

/// Forward traffic between two fds. Data read from either fd is written
/// to the other, one byte per readiness event, until an unrecoverable
/// poll error or a hangup; the return value is always that error. A
/// poll interrupted by a signal restarts without losing bytes.
pub fn forward(host_fd: RawFd, container_fd: RawFd) -> Result<std::convert::Infallible> {
    let raw = [host_fd, container_fd];
    let borrowed = raw.map(|fd| unsafe { BorrowedFd::borrow_raw(fd) });

    loop {
        let mut fds = [
            PollFd::new(borrowed[0], PollFlags::POLLIN),
            PollFd::new(borrowed[1], PollFlags::POLLIN),
        ];

        match poll(&mut fds, PollTimeout::NONE) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(Errno::EINTR) | Err(Errno::EAGAIN) => continue,
            Err(errno) => return Err(ForwarderError::Poll { source: errno }),
        }

        let revents = [fds[0].revents(), fds[1].revents()];
        for (i, revent) in revents.iter().enumerate() {
            let Some(revent) = revent else {
                continue;
            };
            if !revent.contains(PollFlags::POLLIN) {
                continue;
            }

            let mut buf = [0u8; FORWARD_BUF_LEN];
            let n = unistd::read(raw[i], &mut buf).map_err(|errno| ForwarderError::Read {
                fd: raw[i],
                source: errno,
            })?;
            if n != buf.len() {
                return Err(ForwarderError::HangUp { fd: raw[i] });
            }

            let other = i ^ 1;
            let n = unistd::write(borrowed[other], &buf).map_err(|errno| ForwarderError::Write {
                fd: raw[other],
                source: errno,
            })?;
            if n != buf.len() {
                return Err(ForwarderError::HangUp { fd: raw[other] });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::fd::{AsRawFd, OwnedFd};

    use anyhow::Result;
    use nix::sys::signal::Signal;
    use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
    use nix::sys::wait::{waitpid, WaitStatus};
    use serial_test::serial;

    use super::*;
    use crate::syscall::linux::LinuxSyscall;

    fn pair() -> Result<(OwnedFd, OwnedFd)> {
        Ok(socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )?)
    }

    fn write_byte(fd: &OwnedFd, byte: u8) -> Result<()> {
        assert_eq!(unistd::write(fd, &[byte])?, 1);
        Ok(())
    }

    fn read_byte(fd: &OwnedFd) -> Result<u8> {
        let mut buf = [0u8; 1];
        assert_eq!(unistd::read(fd.as_raw_fd(), &mut buf)?, 1);
        Ok(buf[0])
    }

    #[test]
    fn test_forward_both_directions_and_hangup() -> Result<()> {
        let (host_side, host_peer) = pair()?;
        let (container_side, container_peer) = pair()?;

        let handle = std::thread::spawn(move || {
            forward(host_side.as_raw_fd(), container_side.as_raw_fd()).unwrap_err()
        });

        write_byte(&host_peer, b'h')?;
        assert_eq!(read_byte(&container_peer)?, b'h');

        write_byte(&container_peer, b'c')?;
        assert_eq!(read_byte(&host_peer)?, b'c');

        // Hanging up one side terminates the loop.
        drop(host_peer);
        let err = handle.join().unwrap();
        assert!(matches!(err, ForwarderError::HangUp { .. }));
        Ok(())
    }

    #[test]
    #[serial]
    fn test_spawned_forwarder_shuttles_bytes() -> Result<()> {
        let (host_side, host_peer) = pair()?;
        let (container_side, container_peer) = pair()?;

        let syscall = LinuxSyscall;
        let child = spawn(&syscall, host_side.as_raw_fd(), container_side.as_raw_fd())?;

        write_byte(&host_peer, b'x')?;
        assert_eq!(read_byte(&container_peer)?, b'x');
        write_byte(&container_peer, b'y')?;
        assert_eq!(read_byte(&host_peer)?, b'y');

        // interrupting the poll must not lose traffic
        syscall.kill(child, Signal::SIGSTOP)?;
        syscall.kill(child, Signal::SIGCONT)?;
        write_byte(&host_peer, b'z')?;
        assert_eq!(read_byte(&container_peer)?, b'z');

        syscall.kill(child, Signal::SIGKILL)?;
        assert_eq!(
            waitpid(child, None)?,
            WaitStatus::Signaled(child, Signal::SIGKILL, false)
        );
        Ok(())
    }
}
