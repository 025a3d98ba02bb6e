//! Connection gate and the state-driver registration surface.

use std::cell::RefCell;
use std::rc::Rc;

use uuid::Uuid;

use crate::capability;
use crate::driver::{DomainHandle, DomainInfo, Driver, DriverConfig};
use crate::error::DriverError;
use crate::syscall::{Syscall, SyscallType};

/// Lowercase driver name; doubles as the accepted URI scheme.
pub const DRIVER_TAG: &str = "nsbox";
/// Canonical connection URI.
pub const DRIVER_URI: &str = "nsbox:///";

/// Outcome of a connection attempt. Declining is not an error: it tells
/// the dispatch layer to offer the URI to another driver.
pub enum OpenOutcome {
    Accepted(Connection),
    Declined,
}

/// Owns the driver registration for the dispatch layer. Replaces the
/// module-level singleton of older drivers: the embedder holds one
/// `DriverState` and wires its callbacks into the generic layer.
pub struct DriverState {
    syscall: SyscallType,
    driver: Option<Rc<RefCell<Driver>>>,
}

impl Default for DriverState {
    fn default() -> Self {
        Self::new(SyscallType::default())
    }
}

impl DriverState {
    pub fn new(syscall: SyscallType) -> Self {
        Self {
            syscall,
            driver: None,
        }
    }

    /// State-driver startup callback.
    pub fn startup(&mut self, config: DriverConfig) -> Result<(), DriverError> {
        self.startup_with_syscall(config, self.syscall.create_syscall())
    }

    /// Startup with an explicit syscall layer, for embedders that
    /// construct their own.
    pub fn startup_with_syscall(
        &mut self,
        config: DriverConfig,
        syscall: Box<dyn Syscall>,
    ) -> Result<(), DriverError> {
        let driver = Driver::startup(config, syscall)?;
        self.driver = Some(Rc::new(RefCell::new(driver)));
        Ok(())
    }

    /// State-driver shutdown callback. Running containers are not
    /// killed; the operator is expected to destroy them first.
    pub fn shutdown(&mut self) -> Result<(), DriverError> {
        let driver = self.driver.take().ok_or(DriverError::NotStarted)?;
        driver.borrow_mut().shutdown();
        Ok(())
    }

    /// State-driver active-check callback.
    pub fn active(&self) -> bool {
        self.driver
            .as_ref()
            .map_or(false, |driver| driver.borrow().is_active())
    }

    /// Canonical driver URI, if this host can run containers.
    pub fn probe(&self) -> Option<&'static str> {
        if !cfg!(target_os = "linux") {
            return None;
        }

        let syscall = self.syscall.create_syscall();
        capability::check_container_support(syscall.as_ref())
            .ok()
            .map(|_| DRIVER_URI)
    }

    /// Accept a connection iff the caller is the superuser, the driver
    /// has been started, and the URI scheme matches the driver tag.
    pub fn open(&self, uri: &str) -> OpenOutcome {
        let Some(driver) = &self.driver else {
            return OpenOutcome::Declined;
        };

        if !driver.borrow().syscall().euid().is_root() {
            return OpenOutcome::Declined;
        }

        let Some((scheme, _)) = uri.split_once(':') else {
            return OpenOutcome::Declined;
        };
        if scheme != DRIVER_TAG {
            return OpenOutcome::Declined;
        }

        OpenOutcome::Accepted(Connection {
            driver: Rc::clone(driver),
        })
    }
}

/// An accepted connection: the dispatch table the generic layer calls
/// through. Operations execute on the caller's thread; the dispatch
/// layer serializes them.
pub struct Connection {
    driver: Rc<RefCell<Driver>>,
}

impl Connection {
    pub fn list_domains(&self, max: usize) -> Vec<i32> {
        self.driver.borrow().list_domains(max)
    }

    pub fn num_of_domains(&self) -> usize {
        self.driver.borrow().num_of_domains()
    }

    pub fn create_domain(&self, doc: &str) -> Result<DomainHandle, DriverError> {
        self.driver.borrow_mut().create_domain(doc)
    }

    pub fn lookup_by_id(&self, id: i32) -> Result<DomainHandle, DriverError> {
        self.driver.borrow().lookup_by_id(id)
    }

    pub fn lookup_by_uuid(&self, uuid: &Uuid) -> Result<DomainHandle, DriverError> {
        self.driver.borrow().lookup_by_uuid(uuid)
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<DomainHandle, DriverError> {
        self.driver.borrow().lookup_by_name(name)
    }

    pub fn shutdown_domain(&self, dom: &DomainHandle) -> Result<(), DriverError> {
        self.driver.borrow_mut().shutdown_domain(dom)
    }

    pub fn destroy_domain(&self, dom: &DomainHandle) -> Result<(), DriverError> {
        self.driver.borrow_mut().destroy_domain(dom)
    }

    pub fn os_type(&self) -> &'static str {
        self.driver.borrow().os_type()
    }

    pub fn domain_info(&self, dom: &DomainHandle) -> Result<DomainInfo, DriverError> {
        self.driver.borrow().domain_info(dom)
    }

    pub fn dump_definition(&self, dom: &DomainHandle) -> Result<String, DriverError> {
        self.driver.borrow().dump_definition(dom)
    }

    pub fn list_defined_domains(&self, max: usize) -> Vec<String> {
        self.driver.borrow().list_defined_domains(max)
    }

    pub fn num_of_defined_domains(&self) -> usize {
        self.driver.borrow().num_of_defined_domains()
    }

    pub fn start_domain(&self, dom: &DomainHandle) -> Result<(), DriverError> {
        self.driver.borrow_mut().start_domain(dom)
    }

    pub fn define_domain(&self, doc: &str) -> Result<DomainHandle, DriverError> {
        self.driver.borrow_mut().define_domain(doc)
    }

    pub fn undefine_domain(&self, dom: &DomainHandle) -> Result<(), DriverError> {
        self.driver.borrow_mut().undefine_domain(dom)
    }

    pub fn close(self) {}
}
