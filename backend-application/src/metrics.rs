use std::sync::atomic::{AtomicU64, Ordering};

use backend_domain::IngestSummary;

#[derive(Debug, Default)]
pub struct Metrics {
    ingest_runs: AtomicU64,
    ingest_failures: AtomicU64,
    records_inserted: AtomicU64,
    records_skipped: AtomicU64,
    records_unmatched: AtomicU64,
    events_published: AtomicU64,
    poll_sweeps: AtomicU64,
}

impl Metrics {
    pub fn record_ingest(&self, summary: &IngestSummary) {
        self.ingest_runs.fetch_add(1, Ordering::Relaxed);
        self.records_inserted
            .fetch_add(summary.inserted as u64, Ordering::Relaxed);
        self.records_skipped
            .fetch_add(summary.skipped_duplicate as u64, Ordering::Relaxed);
        self.records_unmatched
            .fetch_add(summary.unmatched as u64, Ordering::Relaxed);
    }

    pub fn record_ingest_failure(&self) {
        self.ingest_runs.fetch_add(1, Ordering::Relaxed);
        self.ingest_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self, deliveries: usize) {
        self.events_published
            .fetch_add(deliveries as u64, Ordering::Relaxed);
    }

    pub fn record_sweep(&self) {
        self.poll_sweeps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_inserted(&self) -> u64 {
        self.records_inserted.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let runs = self.ingest_runs.load(Ordering::Relaxed);
        let failures = self.ingest_failures.load(Ordering::Relaxed);
        let inserted = self.records_inserted.load(Ordering::Relaxed);
        let skipped = self.records_skipped.load(Ordering::Relaxed);
        let unmatched = self.records_unmatched.load(Ordering::Relaxed);
        let published = self.events_published.load(Ordering::Relaxed);
        let sweeps = self.poll_sweeps.load(Ordering::Relaxed);

        format!(
            "# TYPE rollcall_ingest_runs_total counter\n\
rollcall_ingest_runs_total {}\n\
# TYPE rollcall_ingest_failures_total counter\n\
rollcall_ingest_failures_total {}\n\
# TYPE rollcall_records_inserted_total counter\n\
rollcall_records_inserted_total {}\n\
# TYPE rollcall_records_skipped_total counter\n\
rollcall_records_skipped_total {}\n\
# TYPE rollcall_records_unmatched_total counter\n\
rollcall_records_unmatched_total {}\n\
# TYPE rollcall_events_published_total counter\n\
rollcall_events_published_total {}\n\
# TYPE rollcall_poll_sweeps_total counter\n\
rollcall_poll_sweeps_total {}\n",
            runs, failures, inserted, skipped, unmatched, published, sweeps
        )
    }
}
