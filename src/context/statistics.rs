use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Point-in-time copy of a context's operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContextStatistics {
    pub operations_started: u64,
    pub operations_succeeded: u64,
    pub operations_failed: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
}

impl ContextStatistics {
    /// Operations submitted but not yet finished
    pub fn operations_in_flight(&self) -> u64 {
        self.operations_started
            .saturating_sub(self.operations_succeeded + self.operations_failed)
    }

    pub fn log_summary(&self) {
        info!(
            operations_started = self.operations_started,
            operations_succeeded = self.operations_succeeded,
            operations_failed = self.operations_failed,
            transactions_committed = self.transactions_committed,
            transactions_rolled_back = self.transactions_rolled_back,
            "Database context statistics"
        );
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatisticsRecorder {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

impl StatisticsRecorder {
    pub(crate) fn operation_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn operation_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn operation_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn transaction_committed(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn transaction_rolled_back(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ContextStatistics {
        ContextStatistics {
            operations_started: self.started.load(Ordering::Relaxed),
            operations_succeeded: self.succeeded.load(Ordering::Relaxed),
            operations_failed: self.failed.load(Ordering::Relaxed),
            transactions_committed: self.committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.rolled_back.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let recorder = StatisticsRecorder::default();
        recorder.operation_started();
        recorder.operation_started();
        recorder.operation_succeeded();
        recorder.transaction_rolled_back();

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.operations_started, 2);
        assert_eq!(snapshot.operations_in_flight(), 1);
        assert_eq!(snapshot.transactions_rolled_back, 1);
        assert_eq!(snapshot.transactions_committed, 0);
    }
}
