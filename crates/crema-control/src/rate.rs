//! [`RateEstimator`] – stepped rate-of-change estimate.
//!
//! The probe is noisy, so the rate is not differentiated sample by sample.
//! Instead a reference sample is held for one estimation interval; when the
//! interval has elapsed the rate over the whole window is computed and the
//! reference moves to the current sample.  Between refreshes the previous
//! estimate is returned unchanged.
//!
//! ```rust
//! use crema_control::rate::RateEstimator;
//! use crema_types::Sample;
//!
//! let mut est = RateEstimator::new(3000);
//! est.update(Sample::new(90.0, 0));
//! assert_eq!(est.update(Sample::new(91.0, 1000)).celsius_per_sec, 0.0);
//! let rate = est.update(Sample::new(93.0, 3000));
//! assert!((rate.celsius_per_sec - 1.0).abs() < 1e-6);
//! ```

use crema_types::{RateEstimate, Sample};

#[derive(Debug, Clone)]
pub struct RateEstimator {
    interval_ms: u64,
    reference: Option<Sample>,
    estimate: RateEstimate,
}

impl RateEstimator {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            reference: None,
            estimate: RateEstimate::default(),
        }
    }

    /// Feed the cycle's sample and return the estimate in force.
    ///
    /// The first sample only opens the first window.
    pub fn update(&mut self, sample: Sample) -> RateEstimate {
        let Some(reference) = self.reference else {
            self.reference = Some(sample);
            self.estimate.window_start_ms = sample.timestamp_ms;
            return self.estimate;
        };

        let elapsed_ms = sample.timestamp_ms.saturating_sub(reference.timestamp_ms);
        if elapsed_ms >= self.interval_ms && elapsed_ms > 0 {
            self.estimate = RateEstimate {
                celsius_per_sec: (sample.celsius - reference.celsius) / elapsed_ms as f32 * 1000.0,
                window_start_ms: reference.timestamp_ms,
            };
            self.reference = Some(sample);
        }
        self.estimate
    }

    pub fn current(&self) -> RateEstimate {
        self.estimate
    }

    /// Change the estimation interval.  The open window is kept.
    pub fn set_interval(&mut self, interval_ms: u64) {
        self.interval_ms = interval_ms;
    }
}
