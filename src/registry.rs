//! Explicit map of live switchers, owned by whatever manages configuration
//! entries.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::device::Sw6Switcher;
use crate::switch::VideoSwitcher;

/// Live switchers keyed by configuration entry id.
#[derive(Default)]
pub struct SwitcherRegistry {
    switchers: HashMap<String, Arc<Sw6Switcher>>,
}

impl SwitcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a switcher, returning any previous one under the same id.
    /// The previous switcher is not disconnected.
    pub fn insert(
        &mut self,
        entry_id: impl Into<String>,
        switcher: Arc<Sw6Switcher>,
    ) -> Option<Arc<Sw6Switcher>> {
        self.switchers.insert(entry_id.into(), switcher)
    }

    pub fn get(&self, entry_id: &str) -> Option<&Arc<Sw6Switcher>> {
        self.switchers.get(entry_id)
    }

    /// Unregister and disconnect. Returns false if the id was unknown.
    pub async fn remove(&mut self, entry_id: &str) -> bool {
        match self.switchers.remove(entry_id) {
            Some(switcher) => {
                debug!(entry_id = %entry_id, "unloading switcher");
                switcher.disconnect().await;
                true
            }
            None => false,
        }
    }

    /// Disconnect and drop every registered switcher.
    pub async fn disconnect_all(&mut self) {
        for (entry_id, switcher) in self.switchers.drain() {
            debug!(entry_id = %entry_id, "unloading switcher");
            switcher.disconnect().await;
        }
    }

    pub fn len(&self) -> usize {
        self.switchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switchers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockPort, SwitcherBuilder};

    fn switcher(address: &str) -> Arc<Sw6Switcher> {
        Arc::new(
            SwitcherBuilder::new(address)
                .query_on_connect(false)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn insert_and_get() {
        let mut registry = SwitcherRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.insert("a", switcher("/dev/ttyUSB0")).is_none());
        assert!(registry.insert("a", switcher("/dev/ttyUSB1")).is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("a").unwrap().identity().identifier,
            "/dev/ttyUSB1"
        );
        assert!(registry.get("b").is_none());
    }

    #[tokio::test]
    async fn remove_disconnects() {
        let mut registry = SwitcherRegistry::new();
        let sw = switcher("/dev/mock");
        let mock = MockPort::new();
        sw.connect_with_port(mock.clone()).await;
        assert!(sw.state().available);

        registry.insert("entry", sw.clone());
        assert!(registry.remove("entry").await);
        assert!(!registry.remove("entry").await);
        assert!(!sw.state().available);
        assert!(mock.is_closed());
    }

    #[tokio::test]
    async fn disconnect_all_empties_registry() {
        let mut registry = SwitcherRegistry::new();
        registry.insert("a", switcher("/dev/a"));
        registry.insert("b", switcher("/dev/b"));
        registry.disconnect_all().await;
        assert!(registry.is_empty());
    }
}
