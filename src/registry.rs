//! The process-wide collection of domain records.

use uuid::Uuid;

use crate::domain::{DomainDefinition, DomainRecord};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("domain '{0}' is already defined")]
    DuplicateName(String),
    #[error("a domain with uuid {0} is already defined")]
    DuplicateUuid(Uuid),
}

/// All known domains, partitioned by activity into two counters.
///
/// A record is in the active partition while its init pid is known
/// (`def.id >= 0`); everything else is inactive. `uuid` and `name` are
/// unique across the whole registry. Lookups are linear scans; the
/// registry holds the handful of containers of a single host.
#[derive(Debug, Default)]
pub struct Registry {
    domains: Vec<DomainRecord>,
    n_active: usize,
    n_inactive: usize,
}

impl Registry {
    /// Insert a freshly defined domain into the inactive partition.
    pub fn assign(&mut self, def: DomainDefinition) -> Result<&mut DomainRecord, RegistryError> {
        if self.find_by_name(&def.name).is_some() {
            return Err(RegistryError::DuplicateName(def.name));
        }
        if self.find_by_uuid(&def.uuid).is_some() {
            return Err(RegistryError::DuplicateUuid(def.uuid));
        }

        self.domains.push(DomainRecord::new(def));
        self.n_inactive += 1;
        // non-empty: the record was just pushed
        Ok(self.domains.last_mut().unwrap())
    }

    /// Remove an inactive record and hand it back to the caller.
    /// Active records are never removed this way.
    pub fn remove_inactive(&mut self, uuid: &Uuid) -> Option<DomainRecord> {
        let pos = self
            .domains
            .iter()
            .position(|d| !d.is_active() && d.def().uuid == *uuid)?;
        self.n_inactive -= 1;
        Some(self.domains.remove(pos))
    }

    /// Runtime ids only resolve for active domains.
    pub fn find_by_id(&self, id: i32) -> Option<&DomainRecord> {
        self.domains
            .iter()
            .find(|d| d.is_active() && d.def().id == id)
    }

    pub fn find_by_id_mut(&mut self, id: i32) -> Option<&mut DomainRecord> {
        self.domains
            .iter_mut()
            .find(|d| d.is_active() && d.def().id == id)
    }

    pub fn find_by_uuid(&self, uuid: &Uuid) -> Option<&DomainRecord> {
        self.domains.iter().find(|d| d.def().uuid == *uuid)
    }

    pub fn find_by_uuid_mut(&mut self, uuid: &Uuid) -> Option<&mut DomainRecord> {
        self.domains.iter_mut().find(|d| d.def().uuid == *uuid)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&DomainRecord> {
        self.domains.iter().find(|d| d.def().name == name)
    }

    pub fn find_by_name_mut(&mut self, name: &str) -> Option<&mut DomainRecord> {
        self.domains.iter_mut().find(|d| d.def().name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainRecord> {
        self.domains.iter()
    }

    /// A record moved from the inactive to the active partition.
    pub(crate) fn record_activation(&mut self) {
        self.n_inactive -= 1;
        self.n_active += 1;
    }

    /// A record moved from the active to the inactive partition.
    pub(crate) fn record_deactivation(&mut self) {
        self.n_active -= 1;
        self.n_inactive += 1;
    }

    pub fn num_active(&self) -> usize {
        self.n_active
    }

    pub fn num_inactive(&self) -> usize {
        self.n_inactive
    }

    /// Drop every record and reset the counters.
    pub fn free_all(&mut self) {
        self.domains.clear();
        self.n_active = 0;
        self.n_inactive = 0;
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::domain::definition::minimal_doc;

    fn def(name: &str) -> DomainDefinition {
        DomainDefinition::parse(&minimal_doc(name, Uuid::new_v4())).unwrap()
    }

    #[test]
    fn test_assign_counts_inactive() -> Result<()> {
        let mut registry = Registry::default();
        registry.assign(def("c1"))?;
        registry.assign(def("c2"))?;

        assert_eq!(registry.num_inactive(), 2);
        assert_eq!(registry.num_active(), 0);
        Ok(())
    }

    #[test]
    fn test_assign_rejects_duplicate_name() -> Result<()> {
        let mut registry = Registry::default();
        registry.assign(def("c1"))?;

        let err = registry.assign(def("c1")).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(name) if name == "c1"));
        assert_eq!(registry.num_inactive(), 1);
        Ok(())
    }

    #[test]
    fn test_assign_rejects_duplicate_uuid() -> Result<()> {
        let mut registry = Registry::default();
        let uuid = Uuid::new_v4();
        registry.assign(DomainDefinition::parse(&minimal_doc("c1", uuid))?)?;

        let err = registry
            .assign(DomainDefinition::parse(&minimal_doc("c2", uuid))?)
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateUuid(u) if u == uuid));
        Ok(())
    }

    #[test]
    fn test_find_by_id_ignores_inactive() -> Result<()> {
        let mut registry = Registry::default();
        registry.assign(def("c1"))?;
        assert!(registry.find_by_id(-1).is_none());

        let rec = registry.find_by_name_mut("c1").unwrap();
        rec.def_mut().id = 1234;
        registry.record_activation();

        assert!(registry.find_by_id(1234).is_some());
        assert_eq!(registry.num_active(), 1);
        assert_eq!(registry.num_inactive(), 0);
        Ok(())
    }

    #[test]
    fn test_remove_inactive_skips_active() -> Result<()> {
        let mut registry = Registry::default();
        let uuid = Uuid::new_v4();
        registry.assign(DomainDefinition::parse(&minimal_doc("c1", uuid))?)?;

        let rec = registry.find_by_name_mut("c1").unwrap();
        rec.def_mut().id = 1234;
        registry.record_activation();

        assert!(registry.remove_inactive(&uuid).is_none());

        let rec = registry.find_by_name_mut("c1").unwrap();
        rec.def_mut().id = -1;
        registry.record_deactivation();

        assert!(registry.remove_inactive(&uuid).is_some());
        assert_eq!(registry.num_inactive(), 0);
        assert!(registry.find_by_uuid(&uuid).is_none());
        Ok(())
    }

    #[test]
    fn test_free_all() -> Result<()> {
        let mut registry = Registry::default();
        registry.assign(def("c1"))?;
        registry.assign(def("c2"))?;
        registry.free_all();

        assert_eq!(registry.num_active(), 0);
        assert_eq!(registry.num_inactive(), 0);
        assert!(registry.iter().next().is_none());
        Ok(())
    }
}
