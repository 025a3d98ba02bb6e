//! Defining and undefining domains.

use crate::domain::DomainDefinition;
use crate::error::DriverError;
use crate::store;

use super::driver::{DomainHandle, Driver};

impl Driver {
    /// Parse a definition document, insert the domain into the inactive
    /// partition, and persist it. A persist failure rolls the insert
    /// back, leaving the registry unchanged.
    pub fn define_domain(&mut self, doc: &str) -> Result<DomainHandle, DriverError> {
        let def = DomainDefinition::parse(doc)?;
        let uuid = def.uuid;

        let Self {
            registry,
            config_dir,
            ..
        } = self;

        let record = registry.assign(def)?;
        match store::save_definition(config_dir, record.def()) {
            Ok(path) => {
                record.config_path = Some(path);
                tracing::debug!(name = %record.def().name, "defined domain");
                Ok(DomainHandle::from(&*record))
            }
            Err(err) => {
                tracing::error!(%err, "failed to persist domain definition");
                registry.remove_inactive(&uuid);
                Err(err.into())
            }
        }
    }

    /// Remove a defined domain: delete the on-disk definition, then drop
    /// the record. Active domains cannot be undefined.
    pub fn undefine_domain(&mut self, dom: &DomainHandle) -> Result<(), DriverError> {
        let record = self
            .registry
            .find_by_uuid(&dom.uuid)
            .ok_or(DriverError::InvalidDomain)?;

        if !record.state().can_undefine() {
            tracing::error!(name = %record.def().name, "cannot delete active domain");
            return Err(DriverError::CannotDeleteActive);
        }

        if let Some(path) = record.config_path() {
            store::delete_definition(path, &record.def().name)?;
        }

        self.registry.remove_inactive(&dom.uuid);
        Ok(())
    }
}
