//! Per-job uptime vector.
//!
//! Maps every instance that has been RUNNING to the seconds elapsed since
//! its last transition into RUNNING, as of one reference time, and answers
//! percentile and threshold questions over that map.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use drover_id::InstanceId;
use drover_tasks::TaskRecord;

use crate::{SlaError, SlaResult};

/// Instance uptimes of one job at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct UptimeVector {
    uptimes: BTreeMap<InstanceId, i64>,
    sorted: Vec<i64>,
}

impl UptimeVector {
    /// Build the vector from a job's tasks as of `now`.
    ///
    /// Tasks that never reached RUNNING are left out entirely.
    pub fn new<'a, I>(tasks: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a TaskRecord>,
    {
        let now_ms = now.timestamp_millis();
        let mut uptimes = BTreeMap::new();

        for task in tasks {
            if let Some(running_ms) = task.last_running_ms() {
                let uptime = (now_ms - running_ms).div_euclid(1000).max(0);
                uptimes.insert(task.instance_id, uptime);
            }
        }

        let mut sorted: Vec<i64> = uptimes.values().copied().collect();
        sorted.sort_unstable();

        Self { uptimes, sorted }
    }

    /// Number of instances with an uptime entry.
    pub fn total_tasks(&self) -> usize {
        self.uptimes.len()
    }

    /// Uptime in seconds of a single instance.
    pub fn uptime(&self, instance: InstanceId) -> Option<i64> {
        self.uptimes.get(&instance).copied()
    }

    /// Iterate `(instance, uptime_secs)` in instance order.
    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, i64)> + '_ {
        self.uptimes.iter().map(|(id, uptime)| (*id, *uptime))
    }

    /// Percentage (0-100) of instances up for at least `duration_secs`.
    ///
    /// The denominator is `total_override` when given, else [`total_tasks`].
    /// A zero denominator yields 0.
    ///
    /// [`total_tasks`]: Self::total_tasks
    pub fn task_up_count(&self, duration_secs: i64, total_override: Option<usize>) -> f64 {
        let total = total_override.unwrap_or(self.sorted.len());
        if total == 0 {
            return 0.0;
        }

        let above = self.sorted.iter().filter(|&&uptime| uptime >= duration_secs).count();
        100.0 * above as f64 / total as f64
    }

    /// Uptime such that `percentile`% of instances have been up at least that long.
    ///
    /// `percentile` must lie in (0, 100). An empty vector yields 0.
    pub fn job_uptime(&self, percentile: f64) -> SlaResult<i64> {
        if !(percentile > 0.0 && percentile < 100.0) {
            return Err(SlaError::InvalidPercentile(percentile));
        }

        let total = self.sorted.len() as i64;
        let value = (percentile / 100.0 * total as f64).floor() as i64;
        let index = total - value - 1;

        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| self.sorted.get(i).copied())
            .unwrap_or(0))
    }

    /// Seconds until [`task_up_count`] for `duration_secs` reaches `percentile`.
    ///
    /// Returns `Some(0)` when the target is already met and `None` when the
    /// current population can never meet it.
    ///
    /// [`task_up_count`]: Self::task_up_count
    pub fn wait_time_to_sla(
        &self,
        percentile: f64,
        duration_secs: i64,
        total_override: Option<usize>,
    ) -> Option<i64> {
        if self.task_up_count(duration_secs, total_override) >= percentile {
            return Some(0);
        }

        let elements = self.sorted.len() as i64;
        let total = total_override.unwrap_or(self.sorted.len()) as f64;
        let target_count = (total * percentile / 100.0).ceil() as i64;
        let index = elements - target_count;

        if index < 0 || index >= elements {
            return None;
        }

        usize::try_from(index)
            .ok()
            .and_then(|i| self.sorted.get(i))
            .map(|uptime| duration_secs - uptime)
    }
}

#[cfg(test)]
mod tests {
    use drover_testing::{FakeClock, TaskBuilder};
    use drover_tasks::Clock;
    use proptest::prelude::*;

    use super::*;

    const JOB: &str = "west/mesos/test/job";

    fn vector(uptimes: &[i64]) -> UptimeVector {
        let now = FakeClock::new().now();
        let tasks: Vec<_> = uptimes
            .iter()
            .enumerate()
            .map(|(i, uptime)| TaskBuilder::running(JOB, i as u32, "h1", *uptime, now))
            .collect();
        UptimeVector::new(&tasks, now)
    }

    #[test]
    fn test_tasks_without_running_event_are_excluded() {
        let now = FakeClock::new().now();
        let tasks = vec![
            TaskBuilder::running(JOB, 0, "h1", 100, now),
            TaskBuilder::new(JOB, 1, "h1")
                .event(drover_tasks::ScheduleStatus::Pending, now.timestamp_millis())
                .build(),
        ];
        let vector = UptimeVector::new(&tasks, now);
        assert_eq!(vector.total_tasks(), 1);
        assert_eq!(vector.uptime(InstanceId::new(0)), Some(100));
        assert_eq!(vector.uptime(InstanceId::new(1)), None);
    }

    #[test]
    fn test_uses_last_running_transition() {
        let now = FakeClock::new().now();
        let now_ms = now.timestamp_millis();
        let task = TaskBuilder::new(JOB, 0, "h1")
            .event(drover_tasks::ScheduleStatus::Running, now_ms - 500_000)
            .event(drover_tasks::ScheduleStatus::Restarting, now_ms - 400_000)
            .event(drover_tasks::ScheduleStatus::Running, now_ms - 60_500)
            .build();
        let vector = UptimeVector::new([&task], now);
        assert_eq!(vector.uptime(InstanceId::new(0)), Some(60));
    }

    #[test]
    fn test_count_empty() {
        assert_eq!(vector(&[]).task_up_count(0, None), 0.0);
    }

    #[test]
    fn test_count_50() {
        assert_eq!(vector(&[600, 900, 100, 200]).task_up_count(300, None), 50.0);
    }

    #[test]
    fn test_count_100() {
        assert_eq!(vector(&[100, 200, 300, 400, 500]).task_up_count(50, None), 100.0);
    }

    #[test]
    fn test_count_two_thirds() {
        let count = vector(&[100, 200, 300]).task_up_count(150, None);
        assert!((count - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_count_with_total_override() {
        assert_eq!(vector(&[100, 200]).task_up_count(150, Some(4)), 25.0);
        assert_eq!(vector(&[100, 200]).task_up_count(150, Some(0)), 0.0);
    }

    #[test]
    fn test_uptime_empty() {
        assert_eq!(vector(&[]).job_uptime(50.0).unwrap(), 0);
    }

    #[test]
    fn test_uptime_rejects_out_of_range_percentile() {
        let v = vector(&[100, 200, 300, 400]);
        assert!(matches!(v.job_uptime(0.0), Err(SlaError::InvalidPercentile(_))));
        assert!(matches!(v.job_uptime(100.0), Err(SlaError::InvalidPercentile(_))));
        assert!(matches!(v.job_uptime(-5.0), Err(SlaError::InvalidPercentile(_))));
        assert!(matches!(v.job_uptime(f64::NAN), Err(SlaError::InvalidPercentile(_))));
    }

    #[test]
    fn test_uptime_percentiles() {
        let v = vector(&[100, 200, 300, 400]);
        assert_eq!(v.job_uptime(10.0).unwrap(), 400);
        assert_eq!(v.job_uptime(50.0).unwrap(), 200);
        assert_eq!(v.job_uptime(99.0).unwrap(), 100);
    }

    #[test]
    fn test_uptime_median_of_three() {
        assert_eq!(vector(&[100, 200, 300]).job_uptime(50.0).unwrap(), 200);
    }

    #[test]
    fn test_wait_time_empty() {
        assert_eq!(vector(&[]).wait_time_to_sla(50.0, 200, None), None);
    }

    #[test]
    fn test_wait_time_already_met() {
        assert_eq!(vector(&[100, 200, 300, 400]).wait_time_to_sla(75.0, 200, None), Some(0));
    }

    #[test]
    fn test_wait_time_infeasible() {
        assert_eq!(vector(&[100, 200, 300, 400]).wait_time_to_sla(95.0, 200, Some(5)), None);
    }

    #[test]
    fn test_wait_time_upper() {
        assert_eq!(vector(&[100, 200, 300, 400]).wait_time_to_sla(25.0, 450, None), Some(50));
    }

    #[test]
    fn test_wait_time_mid() {
        assert_eq!(
            vector(&[100, 200, 300, 400, 500]).wait_time_to_sla(50.0, 350, None),
            Some(50)
        );
    }

    #[test]
    fn test_wait_time_lower() {
        assert_eq!(
            vector(&[100, 200, 300, 400, 500]).wait_time_to_sla(90.0, 150, None),
            Some(50)
        );
    }

    #[test]
    fn test_wait_time_with_total() {
        assert_eq!(vector(&[100, 200, 300, 400]).wait_time_to_sla(80.0, 250, Some(5)), Some(150));
    }

    #[test]
    fn test_wait_time_full_percentile() {
        assert_eq!(vector(&[100, 200, 300]).wait_time_to_sla(100.0, 150, Some(3)), Some(50));
    }

    #[test]
    fn test_wait_time_with_lost_tasks() {
        // Two of four tasks gone: the survivors alone cannot reach 75%.
        let v = vector(&[300, 400]);
        assert_eq!(v.task_up_count(200, Some(4)), 50.0);
        assert_eq!(v.wait_time_to_sla(75.0, 200, Some(4)), None);
        assert_eq!(v.wait_time_to_sla(50.0, 350, Some(4)), Some(50));
    }

    proptest! {
        #[test]
        fn prop_up_count_non_increasing(
            uptimes in proptest::collection::vec(0i64..10_000, 0..40),
            d1 in 0i64..12_000,
            d2 in 0i64..12_000,
        ) {
            let v = vector(&uptimes);
            let (low, high) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
            prop_assert!(v.task_up_count(low, None) >= v.task_up_count(high, None));
        }

        #[test]
        fn prop_extreme_percentiles_hit_extremes(
            uptimes in proptest::collection::vec(0i64..10_000, 1..40),
        ) {
            let v = vector(&uptimes);
            let max = *uptimes.iter().max().unwrap();
            let min = *uptimes.iter().min().unwrap();
            prop_assert_eq!(v.job_uptime(0.0001).unwrap(), max);
            prop_assert_eq!(v.job_uptime(99.9999).unwrap(), min);
        }
    }
}
