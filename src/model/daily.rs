//! Per-patient daily generation counters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How many videos a patient has had today and which clusters they used.
///
/// The count is a cache; the number of video records created today is the
/// ground truth and wins on mismatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyGenerationState {
    pub last_reset_date: String,
    pub videos_generated_today: u32,
    pub clusters_used_today: BTreeSet<String>,
}

impl DailyGenerationState {
    pub fn new(today: &str) -> Self {
        Self {
            last_reset_date: today.to_string(),
            ..Default::default()
        }
    }

    pub fn needs_reset(&self, today: &str) -> bool {
        self.last_reset_date != today
    }

    /// Reset counters if the stored date is not `today`. Returns true when a
    /// reset happened.
    pub fn roll_over(&mut self, today: &str) -> bool {
        if !self.needs_reset(today) {
            return false;
        }
        self.reset(today);
        true
    }

    /// Unconditional daily reset.
    pub fn reset(&mut self, today: &str) {
        self.last_reset_date = today.to_string();
        self.videos_generated_today = 0;
        self.clusters_used_today.clear();
    }

    /// Adopt the ground-truth count. Returns the stale local count when the
    /// two disagreed.
    pub fn reconcile(&mut self, ground_truth: u32) -> Option<u32> {
        if self.videos_generated_today == ground_truth {
            return None;
        }
        let stale = self.videos_generated_today;
        self.videos_generated_today = ground_truth;
        Some(stale)
    }

    pub fn record_success(&mut self, cluster_id: &str) {
        self.videos_generated_today += 1;
        self.clusters_used_today.insert(cluster_id.to_string());
    }

    pub fn remaining(&self, max_per_day: u32) -> u32 {
        max_per_day.saturating_sub(self.videos_generated_today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_over_resets_on_new_day() {
        let mut state = DailyGenerationState::new("2024-03-05");
        state.record_success("c1");
        state.record_success("c2");

        assert!(!state.roll_over("2024-03-05"));
        assert_eq!(state.videos_generated_today, 2);

        assert!(state.roll_over("2024-03-06"));
        assert_eq!(state.videos_generated_today, 0);
        assert!(state.clusters_used_today.is_empty());
        assert_eq!(state.last_reset_date, "2024-03-06");
    }

    #[test]
    fn test_reconcile_prefers_ground_truth() {
        let mut state = DailyGenerationState::new("2024-03-05");
        state.videos_generated_today = 4;

        assert_eq!(state.reconcile(6), Some(4));
        assert_eq!(state.videos_generated_today, 6);
        assert_eq!(state.reconcile(6), None);
        assert_eq!(state.remaining(10), 4);
    }

    #[test]
    fn test_remaining_never_underflows() {
        let mut state = DailyGenerationState::new("d");
        state.videos_generated_today = 12;
        assert_eq!(state.remaining(10), 0);
    }
}
