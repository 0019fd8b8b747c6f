//! Stall detection for supervised region downloads.
//!
//! Fed one downloaded-tile count per poll. When the count stops moving for
//! `threshold` consecutive polls it asks for a resume and doubles the
//! threshold (up to a cap), so a throttling tile server is not hammered with
//! resume requests. Any real progress restores the initial threshold.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallVerdict {
    /// Count increased, backoff cleared.
    Progressing,
    /// Nothing downloaded yet, or count moved backwards.
    Idle,
    /// Unchanged for this many consecutive polls.
    Stalled(u32),
    /// Threshold reached: resume the download.
    Resume,
}

#[derive(Debug, Clone)]
pub struct StallDetector {
    last_downloaded: u64,
    stalled_polls: u32,
    threshold: u32,
    initial_threshold: u32,
    max_threshold: u32,
}

impl StallDetector {
    pub fn new(initial_threshold: u32, max_threshold: u32) -> Self {
        let initial_threshold = initial_threshold.max(1);
        Self {
            last_downloaded: 0,
            stalled_polls: 0,
            threshold: initial_threshold,
            initial_threshold,
            max_threshold: max_threshold.max(initial_threshold),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn stalled_polls(&self) -> u32 {
        self.stalled_polls
    }

    pub fn observe(&mut self, downloaded: u64) -> StallVerdict {
        if downloaded > self.last_downloaded {
            self.last_downloaded = downloaded;
            self.stalled_polls = 0;
            self.threshold = self.initial_threshold;
            return StallVerdict::Progressing;
        }

        if downloaded < self.last_downloaded || downloaded == 0 {
            self.last_downloaded = downloaded;
            self.stalled_polls = 0;
            return StallVerdict::Idle;
        }

        self.stalled_polls += 1;
        if self.stalled_polls < self.threshold {
            return StallVerdict::Stalled(self.stalled_polls);
        }

        // last_downloaded is kept: only a real increase clears the backoff
        self.stalled_polls = 0;
        self.threshold = self.threshold.saturating_mul(2).min(self.max_threshold);
        StallVerdict::Resume
    }
}
