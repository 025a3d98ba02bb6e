//! The driver value and the dispatch-surface operations over it. The
//! compound lifecycle operations each live in their own file.

#[allow(clippy::module_inception)]
mod driver;
mod driver_define;
mod driver_destroy;
mod driver_shutdown;
mod driver_start;

pub use driver::{DomainHandle, DomainInfo, Driver, DriverConfig, DEFAULT_CONFIG_DIR};
