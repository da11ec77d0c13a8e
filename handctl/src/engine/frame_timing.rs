//! Per-frame processing time statistics.
//!
//! Tracks how long classification and the state updates take and keeps
//! rolling percentiles.  Under sustained overload the classification
//! stride can be raised so only every other frame is classified.

use std::collections::VecDeque;

use tracing::warn;

/// Rolling processing-time statistics over a window of samples.
#[derive(Debug)]
pub struct FrameTiming {
    /// Pose classification time per frame (ms).
    pub classify_times: VecDeque<f64>,
    /// Debounce, filter and state machine time per frame (ms).
    pub update_times: VecDeque<f64>,
    pub total_times: VecDeque<f64>,
    pub window_size: usize,
    pub total_frames: u64,
    /// Frames that exceeded the budget.
    pub missed_frames: u64,
    /// Per-frame budget in milliseconds (16 for 60 Hz).
    pub budget_ms: f64,
    /// Whether classification may be skipped under load.
    pub adaptive: bool,
    stride: u32,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(600, 16.0)
    }
}

impl FrameTiming {
    pub fn new(window_size: usize, budget_ms: f64) -> Self {
        Self {
            classify_times: VecDeque::with_capacity(window_size),
            update_times: VecDeque::with_capacity(window_size),
            total_times: VecDeque::with_capacity(window_size),
            window_size,
            total_frames: 0,
            missed_frames: 0,
            budget_ms,
            adaptive: false,
            stride: 1,
        }
    }

    /// Record one frame's timings.
    pub fn record_frame(&mut self, classify_ms: f64, update_ms: f64) {
        let total = classify_ms + update_ms;

        Self::push_sample(&mut self.classify_times, classify_ms, self.window_size);
        Self::push_sample(&mut self.update_times, update_ms, self.window_size);
        Self::push_sample(&mut self.total_times, total, self.window_size);

        self.total_frames += 1;
        if total > self.budget_ms {
            self.missed_frames += 1;
        }
        self.adjust_stride();
    }

    fn push_sample(samples: &mut VecDeque<f64>, value: f64, window_size: usize) {
        samples.push_back(value);
        while samples.len() > window_size {
            samples.pop_front();
        }
    }

    fn adjust_stride(&mut self) {
        if !self.adaptive {
            self.stride = 1;
            return;
        }
        // Re-evaluate once the window has something to say.
        if self.total_times.len() < self.window_size.min(30) {
            return;
        }
        let p50 = self.stats().total_p50;
        let next = if p50 > self.budget_ms { 2 } else { 1 };
        if next != self.stride {
            warn!(
                "Classification stride {} -> {} (p50 {:.1}ms, budget {:.1}ms)",
                self.stride, next, p50, self.budget_ms
            );
            self.stride = next;
        }
    }

    /// Classify every `stride`-th frame.
    pub fn classify_stride(&self) -> u32 {
        self.stride
    }

    /// Whether frame `index` should run the classifier.
    pub fn should_classify(&self, index: u64) -> bool {
        index % self.stride as u64 == 0
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = ((sorted.len() as f64 - 1.0) * p / 100.0).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    fn sorted(samples: &VecDeque<f64>) -> Vec<f64> {
        let mut v: Vec<f64> = samples.iter().copied().collect();
        v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        v
    }

    pub fn stats(&self) -> FrameTimingStats {
        let classify = Self::sorted(&self.classify_times);
        let update = Self::sorted(&self.update_times);
        let total = Self::sorted(&self.total_times);

        FrameTimingStats {
            classify_p50: Self::percentile(&classify, 50.0),
            update_p50: Self::percentile(&update, 50.0),
            total_p50: Self::percentile(&total, 50.0),
            total_p95: Self::percentile(&total, 95.0),
            total_p99: Self::percentile(&total, 99.0),
            missed_pct: if self.total_frames > 0 {
                (self.missed_frames as f64 / self.total_frames as f64) * 100.0
            } else {
                0.0
            },
            total_frames: self.total_frames,
            missed_frames: self.missed_frames,
        }
    }

    /// Format stats as an s-expression.
    pub fn stats_sexp(&self) -> String {
        let s = self.stats();
        format!(
            "(:classify-p50 {:.2} :update-p50 {:.2} :total-p50 {:.2} :total-p95 {:.2} :total-p99 {:.2} :missed-pct {:.1} :total-frames {} :missed-frames {} :stride {})",
            s.classify_p50, s.update_p50, s.total_p50, s.total_p95, s.total_p99,
            s.missed_pct, s.total_frames, s.missed_frames, self.stride,
        )
    }
}

#[derive(Debug, Clone)]
pub struct FrameTimingStats {
    pub classify_p50: f64,
    pub update_p50: f64,
    pub total_p50: f64,
    pub total_p95: f64,
    pub total_p99: f64,
    pub missed_pct: f64,
    pub total_frames: u64,
    pub missed_frames: u64,
}
