//! Standard resources with binary mutual exclusion.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::id::{ResourceId, TaskId};
use super::status::{OsError, OsResult};

/// Declared resources and their current holders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceTable {
    declared: BTreeSet<ResourceId>,
    owners: BTreeMap<ResourceId, TaskId>,
}

impl ResourceTable {
    pub fn new(declared: impl IntoIterator<Item = ResourceId>) -> Self {
        ResourceTable {
            declared: declared.into_iter().collect(),
            owners: BTreeMap::new(),
        }
    }

    pub fn is_declared(&self, resource: ResourceId) -> bool {
        self.declared.contains(&resource)
    }

    /// Acquire `resource` for `task`.
    ///
    /// `E_OS_ACCESS` if anyone (including `task`) holds it, `E_OS_ID` if it
    /// was never declared.
    pub fn get(&mut self, task: TaskId, resource: ResourceId) -> OsResult {
        if self.owners.contains_key(&resource) {
            return Err(OsError::Access);
        }
        if !self.is_declared(resource) {
            return Err(OsError::Id);
        }
        self.owners.insert(resource, task);
        debug!(%task, %resource, "resource acquired");
        Ok(())
    }

    /// Release `resource` held by `task`.
    ///
    /// `E_OS_ID` if undeclared, `E_OS_NOFUNC` if `task` does not hold it.
    pub fn release(&mut self, task: TaskId, resource: ResourceId) -> OsResult {
        if !self.is_declared(resource) {
            return Err(OsError::Id);
        }
        if self.owners.get(&resource) != Some(&task) {
            return Err(OsError::NoFunc);
        }
        self.owners.remove(&resource);
        debug!(%task, %resource, "resource released");
        Ok(())
    }

    pub fn holder(&self, resource: ResourceId) -> Option<TaskId> {
        self.owners.get(&resource).copied()
    }

    /// Resources currently held by `task`, in id order.
    pub fn held_by(&self, task: TaskId) -> Vec<ResourceId> {
        self.owners
            .iter()
            .filter(|(_, owner)| **owner == task)
            .map(|(resource, _)| *resource)
            .collect()
    }

    /// Release everything.
    pub fn reset(&mut self) {
        self.owners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_release() {
        let (a, b) = (TaskId::new(1), TaskId::new(2));
        let r = ResourceId::new(5);
        let mut table = ResourceTable::new([r]);

        assert_eq!(table.get(a, r), Ok(()));
        assert_eq!(table.holder(r), Some(a));
        assert_eq!(table.get(b, r), Err(OsError::Access));
        assert_eq!(table.get(a, r), Err(OsError::Access));
        assert_eq!(table.release(b, r), Err(OsError::NoFunc));
        assert_eq!(table.release(a, r), Ok(()));
        assert_eq!(table.get(b, r), Ok(()));
        assert_eq!(table.held_by(b), vec![r]);
    }

    #[test]
    fn test_undeclared_resource() {
        let mut table = ResourceTable::new([]);
        let r = ResourceId::new(1);
        assert_eq!(table.get(TaskId::new(0), r), Err(OsError::Id));
        assert_eq!(table.release(TaskId::new(0), r), Err(OsError::Id));
    }
}
