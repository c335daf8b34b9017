//! Failure budget for a rolling operation.

use std::collections::BTreeMap;

use drover_id::InstanceId;

/// Tracks failed instances against per-instance and total caps.
///
/// Counters only grow, so once exhausted a budget stays exhausted.
#[derive(Debug, Clone)]
pub struct FailureBudget {
    /// Failures tolerated per instance.
    max_per_instance: u32,

    /// Failures tolerated across the operation.
    max_total: u32,

    per_instance: BTreeMap<InstanceId, u32>,
    total: u32,
}

impl FailureBudget {
    pub fn new(max_per_instance: u32, max_total: u32) -> Self {
        Self {
            max_per_instance,
            max_total,
            per_instance: BTreeMap::new(),
            total: 0,
        }
    }

    /// Record one failure for each of `instances`.
    pub fn record_failures(&mut self, instances: &[InstanceId]) {
        for instance in instances {
            *self.per_instance.entry(*instance).or_insert(0) += 1;
        }
        let added = u32::try_from(instances.len()).unwrap_or(u32::MAX);
        self.total = self.total.saturating_add(added);
    }

    /// True once the total cap or any per-instance cap is exceeded.
    pub fn is_exhausted(&self) -> bool {
        self.total > self.max_total
            || self
                .per_instance
                .values()
                .any(|count| *count > self.max_per_instance)
    }

    pub fn total_failures(&self) -> u32 {
        self.total
    }

    pub fn failures_for(&self, instance: InstanceId) -> u32 {
        self.per_instance.get(&instance).copied().unwrap_or(0)
    }
}
