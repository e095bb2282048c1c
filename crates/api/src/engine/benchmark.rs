//! Benchmark sweep job driver.
//!
//! Walks `sizes x iterations` row-major. The first unit is reported as soon
//! as the job starts; each later unit follows a randomized delay standing in
//! for the previous unit's cost. Every unit's elapsed time is collected into
//! the `benchmark_complete` results.

use std::time::Duration;

use pulse_core::commands::BenchmarkStart;
use pulse_core::job::{BenchmarkCursor, JobKind};
use pulse_core::messages::{BenchmarkResult, BenchmarkUpdate, BenchmarkUpdateKind, ServerEvent};
use pulse_core::pacing::PacingPolicy;
use pulse_core::types::JobId;

use super::runner::{JobDriver, Step};

pub struct BenchmarkDriver {
    job_id: JobId,
    sizes: Vec<u64>,
    iterations: u32,
    cursor: BenchmarkCursor,
    /// Unit reported by the previous step and still being "measured".
    in_flight: Option<(usize, u32)>,
    last_delay: Duration,
    results: Vec<BenchmarkResult>,
}

impl BenchmarkDriver {
    /// Parameters must already be validated.
    pub fn new(job_id: JobId, params: &BenchmarkStart) -> Self {
        Self {
            job_id,
            cursor: BenchmarkCursor::new(params.sizes.len(), params.iterations),
            sizes: params.sizes.clone(),
            iterations: params.iterations,
            in_flight: None,
            last_delay: Duration::ZERO,
            results: Vec::new(),
        }
    }

    fn update(&self, kind: BenchmarkUpdateKind) -> BenchmarkUpdate {
        BenchmarkUpdate {
            total_sizes: Some(self.sizes.len()),
            total_iterations: Some(self.iterations),
            ..BenchmarkUpdate::new(kind, Some(self.job_id.clone()))
        }
    }

    fn record_in_flight(&mut self) {
        if let Some((size_index, iteration_index)) = self.in_flight.take() {
            self.results.push(BenchmarkResult {
                size: self.sizes[size_index],
                size_index,
                iteration: iteration_index + 1,
                elapsed_ms: self.last_delay.as_millis() as u64,
            });
        }
    }
}

impl JobDriver for BenchmarkDriver {
    fn kind(&self) -> JobKind {
        JobKind::Benchmark
    }

    fn start_event(&self) -> ServerEvent {
        ServerEvent::benchmark(self.update(BenchmarkUpdateKind::BenchmarkStart))
    }

    fn wait_before_step(&mut self, pacing: &dyn PacingPolicy) -> Option<Duration> {
        // Entry step fires immediately.
        if self.in_flight.is_none() {
            return None;
        }
        let delay = pacing.next_delay();
        self.last_delay = delay;
        Some(delay)
    }

    fn step(&mut self, _pacing: &dyn PacingPolicy) -> Step {
        self.record_in_flight();

        match self.cursor.current() {
            Some((size_index, iteration_index)) => {
                let mut update = self.update(BenchmarkUpdateKind::BenchmarkProgress);
                update.current_size = Some(self.sizes[size_index]);
                update.size_index = Some(size_index);
                update.current_iteration = Some(iteration_index + 1);

                self.in_flight = Some((size_index, iteration_index));
                self.cursor.advance();
                Step::Progress(ServerEvent::benchmark(update))
            }
            None => {
                let mut update = self.update(BenchmarkUpdateKind::BenchmarkComplete);
                update.results = Some(self.results.clone());
                Step::Complete(ServerEvent::benchmark(update))
            }
        }
    }

    fn progress(&self) -> f64 {
        let total = self.cursor.total_units();
        if total == 0 {
            return 0.0;
        }
        self.results.len() as f64 / total as f64 * 100.0
    }

    fn failure_event(&self, message: &str) -> ServerEvent {
        let mut update = BenchmarkUpdate::error(Some(self.job_id.clone()), message);
        update.total_sizes = Some(self.sizes.len());
        update.total_iterations = Some(self.iterations);
        ServerEvent::benchmark(update)
    }
}
