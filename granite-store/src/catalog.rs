//! Catalog of currently visible parts.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use granite_result::{Error, Result};

use crate::part::DataPart;

/// Registry of the parts a table currently exposes to queries.
///
/// `snapshot` returns a value: the planner works against the part set as it
/// was at one instant, and later catalog mutation does not disturb running
/// queries. Removed parts stay alive while any snapshot or worker stream
/// still holds their `Arc`.
#[derive(Debug, Default)]
pub struct PartCatalog {
    parts: RwLock<BTreeMap<String, Arc<DataPart>>>,
}

impl PartCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a part, returning the shared handle.
    pub fn add_part(&self, part: DataPart) -> Result<Arc<DataPart>> {
        let part = Arc::new(part);
        let mut parts = self
            .parts
            .write()
            .map_err(|_| Error::logical("part catalog lock poisoned"))?;
        if parts.contains_key(&part.name) {
            return Err(Error::InvalidArgument(format!(
                "part {} is already registered",
                part.name
            )));
        }
        parts.insert(part.name.clone(), Arc::clone(&part));
        Ok(part)
    }

    /// Drop a part from the visible set. Outstanding observers keep it
    /// alive until they finish.
    pub fn remove_part(&self, name: &str) -> Option<Arc<DataPart>> {
        self.parts.write().ok()?.remove(name)
    }

    /// Atomic snapshot of the visible parts, ordered by name.
    pub fn snapshot(&self) -> Vec<Arc<DataPart>> {
        match self.parts.read() {
            Ok(parts) => parts.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.parts.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::SparseIndex;

    fn part(name: &str) -> DataPart {
        let index = SparseIndex::new(vec![0, 10], 1).expect("index");
        DataPart::new(name, 0, 1, 16, index).expect("part")
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutation() {
        let catalog = PartCatalog::new();
        catalog.add_part(part("a")).expect("add a");
        catalog.add_part(part("b")).expect("add b");

        let snap = catalog.snapshot();
        assert_eq!(snap.len(), 2);

        catalog.add_part(part("c")).expect("add c");
        catalog.remove_part("a");

        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].name, "a");
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let catalog = PartCatalog::new();
        catalog.add_part(part("a")).expect("add");
        assert!(catalog.add_part(part("a")).is_err());
    }

    #[test]
    fn removed_part_survives_through_snapshot() {
        let catalog = PartCatalog::new();
        catalog.add_part(part("a")).expect("add");
        let snap = catalog.snapshot();
        let removed = catalog.remove_part("a").expect("removed");
        assert_eq!(Arc::strong_count(&removed), 2);
        drop(snap);
        assert_eq!(Arc::strong_count(&removed), 1);
    }
}
