//! Opt-in timing hooks for the warp engine.
//!
//! Timing is only collected when the `warp_metrics` feature is enabled and the
//! target is not WASM. Otherwise every call compiles down to invoking the
//! closure directly and [`WarpMetrics::end`] returns `None`.
//!
//! # Usage
//!
//! ```ignore
//! let mut metrics = WarpMetrics::default();
//! metrics.begin();
//! let coefficients = metrics.time(TimingBucket::Solve, || solve(&inputs));
//! if let Some(report) = metrics.end() {
//!     log::debug!("solve took {} ns", report.solve_ns);
//! }
//! ```

/// Categories for timing the stages of a warp query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Building and solving the coefficient system.
    Solve,
    /// Warping every vertex of the source mesh.
    MeshWarp,
    /// Warping the non-participating landmark points.
    PointWarp,
    /// Dirty checks and cache bookkeeping.
    Cache,
}

/// Cumulative timing report with nanosecond precision.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WarpTimingReport {
    pub solve_ns: u64,
    pub mesh_warp_ns: u64,
    pub point_warp_ns: u64,
    pub cache_ns: u64,
}

impl WarpTimingReport {
    /// Returns the total time across all buckets in nanoseconds.
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.solve_ns
            .saturating_add(self.mesh_warp_ns)
            .saturating_add(self.point_warp_ns)
            .saturating_add(self.cache_ns)
    }

    /// Returns the total time in milliseconds (for display purposes).
    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }
}

/// Accumulator for timing warp operations.
///
/// When the `warp_metrics` feature is disabled (or on WASM), all methods
/// are no-ops and [`end`](Self::end) returns `None`.
#[derive(Debug, Default)]
pub struct WarpMetrics {
    #[cfg(all(feature = "warp_metrics", not(target_arch = "wasm32")))]
    report: WarpTimingReport,
}

impl WarpMetrics {
    /// Resets all timing counters to zero.
    pub fn begin(&mut self) {
        #[cfg(all(feature = "warp_metrics", not(target_arch = "wasm32")))]
        {
            self.report = WarpTimingReport::default();
        }
    }

    /// Returns the accumulated timing report, or `None` if metrics are disabled.
    #[must_use]
    pub fn end(&self) -> Option<WarpTimingReport> {
        #[cfg(all(feature = "warp_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "warp_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Times the execution of `f` and accumulates the elapsed time in `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "warp_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
            self.add_to_bucket(bucket, nanos);
            result
        }

        #[cfg(not(all(feature = "warp_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }

    #[cfg(all(feature = "warp_metrics", not(target_arch = "wasm32")))]
    fn add_to_bucket(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = match bucket {
            TimingBucket::Solve => &mut self.report.solve_ns,
            TimingBucket::MeshWarp => &mut self.report.mesh_warp_ns,
            TimingBucket::PointWarp => &mut self.report.point_warp_ns,
            TimingBucket::Cache => &mut self.report.cache_ns,
        };
        *slot = slot.saturating_add(nanos);
    }
}
