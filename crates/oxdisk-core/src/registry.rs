//! Lookup table from test type to workload.

use crate::config::{TestType, WorkloadConfig};
use crate::workload::{
    DirectoryChurnWorkload, MetadataWorkload, MixedRandomWorkload, RandomAccessWorkload,
    SequentialReadWorkload, SequentialWriteWorkload, Workload,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of workloads, populated once at engine start and read-only afterwards.
#[derive(Clone, Default)]
pub struct WorkloadRegistry {
    workloads: HashMap<TestType, Arc<dyn Workload>>,
}

impl WorkloadRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the full workload catalog.
    pub fn with_defaults(config: WorkloadConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SequentialWriteWorkload::new(config)));
        registry.register(Arc::new(SequentialReadWorkload::new(config)));
        registry.register(Arc::new(RandomAccessWorkload::write(config)));
        registry.register(Arc::new(RandomAccessWorkload::read(config)));
        registry.register(Arc::new(MixedRandomWorkload::new(config)));
        registry.register(Arc::new(MetadataWorkload::new(config)));
        registry.register(Arc::new(DirectoryChurnWorkload::new(config)));
        registry
    }

    /// Register a workload under its own test type, replacing any previous entry.
    pub fn register(&mut self, workload: Arc<dyn Workload>) {
        let test_type = workload.test_type();
        if self.workloads.insert(test_type, workload).is_some() {
            tracing::debug!(%test_type, "Replaced registered workload");
        }
    }

    pub fn get(&self, test_type: TestType) -> Option<Arc<dyn Workload>> {
        self.workloads.get(&test_type).cloned()
    }

    pub fn contains(&self, test_type: TestType) -> bool {
        self.workloads.contains_key(&test_type)
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }

    /// Registered workloads in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Workload>> {
        TestType::all()
            .into_iter()
            .filter_map(move |t| self.workloads.get(&t))
    }
}

impl std::fmt::Debug for WorkloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadRegistry")
            .field("workloads", &self.workloads.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_catalog() {
        let registry = WorkloadRegistry::with_defaults(WorkloadConfig::default());
        assert_eq!(registry.len(), TestType::all().len());
        for t in TestType::all() {
            let workload = registry.get(t).unwrap();
            assert_eq!(workload.test_type(), t);
            assert!(workload.default_settings().pass_count >= 1);
            assert!(workload.default_settings().block_size > 0);
        }
    }

    #[test]
    fn test_iter_in_catalog_order() {
        let registry = WorkloadRegistry::with_defaults(WorkloadConfig::default());
        let order: Vec<TestType> = registry.iter().map(|w| w.test_type()).collect();
        assert_eq!(order, TestType::all());
    }

    #[test]
    fn test_missing_entry() {
        let mut registry = WorkloadRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(TestType::Metadata).is_none());
        registry.register(Arc::new(MetadataWorkload::new(WorkloadConfig::default())));
        assert!(registry.contains(TestType::Metadata));
        assert!(!registry.contains(TestType::SequentialWrite));
    }
}
