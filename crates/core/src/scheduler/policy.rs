//! Policy and sync-mode enums plus the small pure calculations shared across
//! the three dispatch strategies (§4.7, §9 "Policy dispatch").

/// Which of the three dispatch strategies governs this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPolicy {
    RoundRobin,
    DeadlineEDF,
    PreemptivePriority,
}

/// Whether the scheduler wakes on every clock tick or only when its
/// dedicated timer fires (§4.7 "Activation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Clock,
    Timer,
}

/// `current_tick + (quantum * priority) / 100`, per the GLOSSARY definition.
/// Smaller values are dispatched first.
pub fn virtual_deadline(quantum: u32, priority: i8, current_tick: u64) -> i64 {
    current_tick as i64 + (quantum as i64 * priority as i64) / 100
}

/// Priority buckets are indexed 0..39 for priorities -20..=19.
pub fn bucket_index(priority: i8) -> usize {
    (priority as i32 + 20).clamp(0, 39) as usize
}

/// Per-bucket capacity given a system-wide cap, with a floor of 2 (§9
/// "Priority bucket sizing").
pub fn bucket_capacity(max_processes: usize) -> usize {
    (max_processes / 40).max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_priority_yields_earlier_deadline() {
        let urgent = virtual_deadline(10, -10, 0);
        let lazy = virtual_deadline(10, 10, 0);
        assert!(urgent < lazy);
    }

    #[test]
    fn bucket_index_covers_full_priority_range() {
        assert_eq!(bucket_index(-20), 0);
        assert_eq!(bucket_index(19), 39);
        assert_eq!(bucket_index(0), 20);
    }

    #[test]
    fn bucket_capacity_has_a_floor_of_two() {
        assert_eq!(bucket_capacity(4), 2);
        assert_eq!(bucket_capacity(400), 10);
    }
}
