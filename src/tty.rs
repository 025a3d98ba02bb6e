//! Pseudo-terminal plumbing between the host and the container.

use std::os::unix::io::RawFd;
use std::path::Path;

use crate::domain::DomainDefinition;
use crate::syscall::Syscall;

#[derive(Debug, thiserror::Error)]
pub enum TtyError {
    #[error("failed to open tty {path}")]
    OpenTerminal {
        path: String,
        source: nix::errno::Errno,
    },
    #[error("grantpt failed")]
    Grant { source: nix::errno::Errno },
    #[error("unlockpt failed")]
    Unlock { source: nix::errno::Errno },
    #[error("failed to query slave pty name")]
    PeerName { source: nix::errno::Errno },
    #[error("failed to put tty in raw mode")]
    RawMode { source: nix::errno::Errno },
    #[error("could not create pseudo terminal")]
    CreateMaster { source: nix::errno::Errno },
}

type Result<T> = std::result::Result<T, TtyError>;

/// Open and configure the host-side master tty named by the definition.
///
/// The master is granted, unlocked, and switched to raw mode so bytes
/// transit unmodified. If the queried slave name differs from the
/// configured path, the definition is updated in place. An empty path
/// means no host-side tunnel: the returned fd is -1.
pub fn setup_tty_tunnel(syscall: &dyn Syscall, def: &mut DomainDefinition) -> Result<RawFd> {
    if def.tty.is_empty() {
        return Ok(-1);
    }

    let fd = syscall
        .open_terminal(Path::new(&def.tty))
        .map_err(|err| TtyError::OpenTerminal {
            path: def.tty.clone(),
            source: err,
        })?;

    // Close the half-configured master on any later failure.
    let mut setup = || -> Result<()> {
        syscall
            .grant_pty(fd)
            .map_err(|err| TtyError::Grant { source: err })?;
        syscall
            .unlock_pty(fd)
            .map_err(|err| TtyError::Unlock { source: err })?;

        let name = syscall
            .pty_peer_name(fd)
            .map_err(|err| TtyError::PeerName { source: err })?;
        // The slave name belongs in the persisted configuration.
        if name != def.tty {
            def.tty = name;
        }

        syscall
            .set_raw_mode(fd)
            .map_err(|err| TtyError::RawMode { source: err })
    };

    if let Err(err) = setup() {
        let _ = syscall.close(fd);
        return Err(err);
    }

    Ok(fd)
}

/// Allocate the container-side pty pair: a fresh master plus the slave
/// path the container entry routine opens as its controlling terminal.
pub fn setup_container_tty(syscall: &dyn Syscall) -> Result<(RawFd, String)> {
    let master = syscall
        .open_pty_master()
        .map_err(|err| TtyError::CreateMaster { source: err })?;

    let unlock_and_name = || -> Result<String> {
        syscall
            .unlock_pty(master)
            .map_err(|err| TtyError::Unlock { source: err })?;
        syscall
            .pty_peer_name(master)
            .map_err(|err| TtyError::PeerName { source: err })
    };

    match unlock_and_name() {
        Ok(name) => Ok((master, name)),
        Err(err) => {
            let _ = syscall.close(master);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use anyhow::Result;
    use uuid::Uuid;

    use super::*;
    use crate::domain::definition::minimal_doc;
    use crate::syscall::test::TestHelperSyscall;

    fn def_with_tty(tty: &str) -> DomainDefinition {
        let mut def = DomainDefinition::parse(&minimal_doc("c1", Uuid::new_v4())).unwrap();
        def.tty = tty.to_string();
        def
    }

    #[test]
    fn test_tunnel_empty_tty_is_unset() -> Result<()> {
        let syscall = TestHelperSyscall::default();
        let mut def = def_with_tty("");

        let fd = setup_tty_tunnel(&syscall, &mut def)?;
        assert_eq!(fd, -1);
        assert!(syscall.get_opened_terminals().is_empty());
        Ok(())
    }

    #[test]
    fn test_tunnel_configures_master() -> Result<()> {
        let syscall = TestHelperSyscall::default();
        syscall.set_peer_name("/dev/pts/7");
        let mut def = def_with_tty("/dev/pts/7");

        let fd = setup_tty_tunnel(&syscall, &mut def)?;
        assert!(fd >= 0);
        assert_eq!(
            syscall.get_opened_terminals(),
            vec![PathBuf::from("/dev/pts/7")]
        );
        assert_eq!(syscall.get_granted_fds(), vec![fd]);
        assert_eq!(syscall.get_unlocked_fds(), vec![fd]);
        assert_eq!(syscall.get_raw_mode_fds(), vec![fd]);
        assert_eq!(def.tty, "/dev/pts/7");
        Ok(())
    }

    #[test]
    fn test_tunnel_rewrites_differing_slave_name() -> Result<()> {
        let syscall = TestHelperSyscall::default();
        syscall.set_peer_name("/dev/pts/9");
        let mut def = def_with_tty("/dev/ptmx");

        setup_tty_tunnel(&syscall, &mut def)?;
        assert_eq!(def.tty, "/dev/pts/9");
        Ok(())
    }

    #[test]
    fn test_container_tty_pair() -> Result<()> {
        let syscall = TestHelperSyscall::default();
        syscall.set_peer_name("/dev/pts/11");

        let (master, name) = setup_container_tty(&syscall)?;
        assert_eq!(syscall.get_opened_masters(), vec![master]);
        assert_eq!(syscall.get_unlocked_fds(), vec![master]);
        assert_eq!(name, "/dev/pts/11");
        assert!(syscall.get_closed_fds().is_empty());
        Ok(())
    }
}
