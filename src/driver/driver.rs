//! The driver value owning the registry, plus the non-mutating half of
//! the dispatch surface.

use std::path::PathBuf;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use uuid::Uuid;

use crate::capability;
use crate::domain::{DomainRecord, DomainState};
use crate::error::DriverError;
use crate::process::spawner::ContainerEntry;
use crate::registry::Registry;
use crate::store;
use crate::syscall::Syscall;

pub const DEFAULT_CONFIG_DIR: &str = "/etc/nsbox";

/// Embedder-supplied configuration for driver startup.
pub struct DriverConfig {
    /// Directory holding one definition file per defined domain.
    pub config_dir: PathBuf,
    /// First code run inside every namespaced child.
    pub entry: ContainerEntry,
}

impl DriverConfig {
    pub fn new(entry: ContainerEntry) -> Self {
        Self {
            config_dir: DEFAULT_CONFIG_DIR.into(),
            entry,
        }
    }
}

/// Caller-facing snapshot of a domain, handed out by lookups and handed
/// back to the lifecycle operations. `id` is the runtime id captured at
/// lookup time; it goes stale once the domain stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainHandle {
    pub name: String,
    pub uuid: Uuid,
    pub id: i32,
}

impl From<&DomainRecord> for DomainHandle {
    fn from(record: &DomainRecord) -> Self {
        Self {
            name: record.def().name.clone(),
            uuid: record.def().uuid,
            id: record.def().id,
        }
    }
}

/// Runtime information about a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    pub state: DomainState,
    /// Configured ceiling in KiB.
    pub max_mem: u64,
    /// Mirrors `max_mem`; actual usage is not tracked by this driver.
    pub memory: u64,
    /// Fixed at 1; vcpu topology is not modeled.
    pub nr_virt_cpu: u32,
    /// Always 0; cpu accounting is not tracked.
    pub cpu_time: u64,
}

/// The container driver: registry, persisted configuration directory,
/// and the syscall surface everything runs through.
///
/// All operations execute on the dispatch thread; the only concurrency
/// is the per-domain forwarder and init processes.
pub struct Driver {
    pub(super) registry: Registry,
    pub(super) config_dir: PathBuf,
    pub(super) syscall: Box<dyn Syscall>,
    pub(super) entry: ContainerEntry,
}

impl Driver {
    /// Bring the driver up: verify the caller is the superuser and the
    /// kernel accepts the namespace flags, then load every persisted
    /// definition into the inactive partition.
    pub fn startup(config: DriverConfig, syscall: Box<dyn Syscall>) -> Result<Self, DriverError> {
        if !syscall.euid().is_root() {
            return Err(DriverError::NotSuperuser);
        }
        capability::check_container_support(syscall.as_ref())?;

        let mut registry = Registry::default();
        for (def, path) in store::load_definitions(&config.config_dir)? {
            let name = def.name.clone();
            match registry.assign(def) {
                Ok(record) => record.config_path = Some(path),
                Err(err) => {
                    tracing::warn!(name = %name, %err, "skipping persisted definition");
                }
            }
        }

        Ok(Self {
            registry,
            config_dir: config.config_dir,
            syscall,
            entry: config.entry,
        })
    }

    /// Runtime ids only resolve while a domain is active.
    pub fn lookup_by_id(&self, id: i32) -> Result<DomainHandle, DriverError> {
        self.registry
            .find_by_id(id)
            .map(DomainHandle::from)
            .ok_or(DriverError::NoDomain("id"))
    }

    pub fn lookup_by_uuid(&self, uuid: &Uuid) -> Result<DomainHandle, DriverError> {
        self.registry
            .find_by_uuid(uuid)
            .map(DomainHandle::from)
            .ok_or(DriverError::NoDomain("uuid"))
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<DomainHandle, DriverError> {
        self.registry
            .find_by_name(name)
            .map(DomainHandle::from)
            .ok_or(DriverError::NoDomain("name"))
    }

    /// Runtime ids of active domains, at most `max` of them.
    pub fn list_domains(&self, max: usize) -> Vec<i32> {
        self.registry
            .iter()
            .filter(|d| d.is_active())
            .take(max)
            .map(|d| d.def().id)
            .collect()
    }

    pub fn num_of_domains(&self) -> usize {
        self.registry.num_active()
    }

    /// Names of defined-but-inactive domains, at most `max` of them,
    /// each a freshly owned copy.
    pub fn list_defined_domains(&self, max: usize) -> Vec<String> {
        self.registry
            .iter()
            .filter(|d| !d.is_active())
            .take(max)
            .map(|d| d.def().name.clone())
            .collect()
    }

    pub fn num_of_defined_domains(&self) -> usize {
        self.registry.num_inactive()
    }

    /// Linux containers only run on Linux.
    pub fn os_type(&self) -> &'static str {
        "linux"
    }

    pub fn domain_info(&self, dom: &DomainHandle) -> Result<DomainInfo, DriverError> {
        let record = self
            .registry
            .find_by_uuid(&dom.uuid)
            .ok_or(DriverError::InvalidDomain)?;

        Ok(DomainInfo {
            state: record.state(),
            max_mem: record.def().max_memory,
            memory: record.def().max_memory,
            nr_virt_cpu: 1,
            cpu_time: 0,
        })
    }

    /// Re-serialize the in-memory definition.
    pub fn dump_definition(&self, dom: &DomainHandle) -> Result<String, DriverError> {
        let record = self
            .registry
            .find_by_uuid(&dom.uuid)
            .ok_or(DriverError::InvalidDomain)?;
        Ok(record.def().dump()?)
    }

    /// True while any domain is active.
    pub fn is_active(&self) -> bool {
        self.registry.num_active() > 0
    }

    /// Drop every record. Running containers are not killed: the driver
    /// relinquishes local tracking and the operator owns their fate.
    pub fn shutdown(&mut self) {
        let active = self.registry.num_active();
        if active > 0 {
            tracing::warn!(active, "driver shutting down with active domains still running");
        }
        self.registry.free_all();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn syscall(&self) -> &dyn Syscall {
        self.syscall.as_ref()
    }
}

/// Close whatever pty fds a record still holds. Used on start-failure
/// unwind and on destroy; fds are closed exactly once because the
/// record forgets them here.
pub(super) fn release_tty(syscall: &dyn Syscall, record: &mut DomainRecord) {
    if record.parent_tty_fd >= 0 {
        if let Err(err) = syscall.close(record.parent_tty_fd) {
            tracing::warn!(name = %record.def().name, %err, "failed to close parent tty");
        }
        record.parent_tty_fd = -1;
    }
    if record.container_tty_fd >= 0 {
        if let Err(err) = syscall.close(record.container_tty_fd) {
            tracing::warn!(name = %record.def().name, %err, "failed to close container tty");
        }
        record.container_tty_fd = -1;
    }
    record.container_tty_name = None;
}

/// Wait for a specific child, restarting past signal interruptions.
pub(super) fn wait_past_interrupts(
    syscall: &dyn Syscall,
    pid: Pid,
) -> crate::syscall::Result<WaitStatus> {
    loop {
        match syscall.waitpid(pid) {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

/// Kill and reap a forwarder that outlived its purpose.
pub(super) fn reap_forwarder(syscall: &dyn Syscall, record: &mut DomainRecord) {
    if let Some(pid) = record.forwarder_pid.take() {
        match syscall.kill(pid, Signal::SIGKILL) {
            Ok(()) => {
                if let Err(err) = wait_past_interrupts(syscall, pid) {
                    tracing::warn!(?pid, %err, "failed to reap tty forwarder");
                }
            }
            Err(Errno::ESRCH) => {}
            Err(err) => {
                tracing::warn!(?pid, %err, "failed to kill tty forwarder");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use anyhow::Result;
    use nix::unistd::Uid;
    use tempfile::TempDir;

    use super::*;
    use crate::domain::definition::minimal_doc;
    use crate::domain::DomainDefinition;
    use crate::syscall::test::TestHelperSyscall;
    use crate::syscall::SyscallType;

    pub(crate) fn noop_entry(_record: &DomainRecord) -> isize {
        0
    }

    /// A driver over the mock syscall layer and a throwaway config dir.
    pub(crate) fn test_driver() -> (Driver, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = DriverConfig {
            config_dir: dir.path().to_owned(),
            entry: noop_entry,
        };
        let driver = Driver::startup(config, SyscallType::Test.create_syscall()).unwrap();
        (driver, dir)
    }

    pub(crate) fn mock(driver: &Driver) -> &TestHelperSyscall {
        driver
            .syscall()
            .as_any()
            .downcast_ref::<TestHelperSyscall>()
            .unwrap()
    }

    #[test]
    fn test_startup_rejects_non_root() {
        let dir = TempDir::new().unwrap();
        let syscall = SyscallType::Test.create_syscall();
        syscall
            .as_any()
            .downcast_ref::<TestHelperSyscall>()
            .unwrap()
            .set_euid(Uid::from_raw(1000));

        let config = DriverConfig {
            config_dir: dir.path().to_owned(),
            entry: noop_entry,
        };
        assert!(matches!(
            Driver::startup(config, syscall),
            Err(DriverError::NotSuperuser)
        ));
    }

    #[test]
    fn test_startup_rejects_unsupported_kernel() {
        let dir = TempDir::new().unwrap();
        let syscall = SyscallType::Test.create_syscall();
        syscall
            .as_any()
            .downcast_ref::<TestHelperSyscall>()
            .unwrap()
            .set_clone_ret(Err(Errno::EINVAL));

        let config = DriverConfig {
            config_dir: dir.path().to_owned(),
            entry: noop_entry,
        };
        assert!(matches!(
            Driver::startup(config, syscall),
            Err(DriverError::Capability(_))
        ));
    }

    #[test]
    fn test_startup_loads_persisted_definitions() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let mut def =
            DomainDefinition::parse(&minimal_doc("persisted", uuid::Uuid::new_v4())).unwrap();
        def.id = 77;
        store::save_definition(dir.path(), &def)?;

        let config = DriverConfig {
            config_dir: dir.path().to_owned(),
            entry: noop_entry,
        };
        let driver = Driver::startup(config, SyscallType::Test.create_syscall())?;

        assert_eq!(driver.num_of_defined_domains(), 1);
        assert_eq!(driver.num_of_domains(), 0);
        let handle = driver.lookup_by_name("persisted")?;
        assert_eq!(handle.id, -1);
        let record = driver.registry().find_by_name("persisted").unwrap();
        assert!(record.config_path().is_some());
        Ok(())
    }

    #[test]
    fn test_lookup_misses() {
        let (driver, _dir) = test_driver();
        assert!(matches!(
            driver.lookup_by_id(999),
            Err(DriverError::NoDomain("id"))
        ));
        assert!(matches!(
            driver.lookup_by_name("ghost"),
            Err(DriverError::NoDomain("name"))
        ));
        assert!(matches!(
            driver.lookup_by_uuid(&Uuid::new_v4()),
            Err(DriverError::NoDomain("uuid"))
        ));
    }

    #[test]
    fn test_os_type() {
        let (driver, _dir) = test_driver();
        assert_eq!(driver.os_type(), "linux");
    }

    #[test]
    fn test_info_reports_untracked_values() -> Result<()> {
        let (mut driver, _dir) = test_driver();
        let doc = minimal_doc("c1", Uuid::new_v4());
        let handle = driver.define_domain(&doc)?;

        let info = driver.domain_info(&handle)?;
        assert_eq!(info.state, DomainState::Off);
        assert_eq!(info.max_mem, 65536);
        assert_eq!(info.memory, info.max_mem);
        assert_eq!(info.nr_virt_cpu, 1);
        assert_eq!(info.cpu_time, 0);
        Ok(())
    }

    #[test]
    fn test_dump_round_trips() -> Result<()> {
        let (mut driver, _dir) = test_driver();
        let doc = minimal_doc("c1", Uuid::new_v4());
        let handle = driver.define_domain(&doc)?;

        let dumped = driver.dump_definition(&handle)?;
        let reparsed = DomainDefinition::parse(&dumped)?;
        assert_eq!(&reparsed, driver.registry().find_by_name("c1").unwrap().def());
        Ok(())
    }

    #[test]
    fn test_list_caps_at_max() -> Result<()> {
        let (mut driver, _dir) = test_driver();
        for i in 0..3 {
            driver.define_domain(&minimal_doc(&format!("c{i}"), Uuid::new_v4()))?;
        }

        assert_eq!(driver.num_of_defined_domains(), 3);
        assert_eq!(driver.list_defined_domains(2).len(), 2);
        assert_eq!(driver.list_defined_domains(10).len(), 3);
        assert!(driver.list_domains(10).is_empty());
        Ok(())
    }
}
