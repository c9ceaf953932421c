//! Expectations (spec §4.7, §GLOSSARY): an opaque predictor of a builder's
//! next build duration. The predictor itself is out of scope (spec §1,
//! Non-goals) -- this crate only owns the init-then-feed lifecycle.

use std::time::Duration;

/// `setExpectations`: `None` until the first successful build, then fed on
/// every subsequent one (spec §4.7).
#[derive(Debug, Default)]
pub struct Expectations {
    predicted: Option<Duration>,
}

impl Expectations {
    pub fn new() -> Self {
        Expectations { predicted: None }
    }

    /// On first successful build, initializes the predictor from `progress`.
    /// Thereafter feeds `progress` into the predictor's update. Both cases
    /// collapse to the same thing here since the predictor is an opaque
    /// running estimate (last observed duration).
    pub fn set_expectations(&mut self, progress: Duration) {
        self.predicted = Some(progress);
    }

    pub fn predicted(&self) -> Option<Duration> {
        self.predicted
    }
}
