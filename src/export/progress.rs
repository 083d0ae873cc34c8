/// Turns submitted media time into a non-decreasing 0-100 percentage.
///
/// The callback fires only when the integer percentage grows, so consumers
/// see each value at most once and never see it go down.
pub struct ProgressTracker<F: FnMut(u8)> {
    total: f64,
    submitted: f64,
    last: Option<u8>,
    callback: F,
}

impl<F: FnMut(u8)> ProgressTracker<F> {
    pub fn new(total: f64, callback: F) -> Self {
        Self {
            total,
            submitted: 0.0,
            last: None,
            callback,
        }
    }

    /// Report the starting value (0)
    pub fn start(&mut self) {
        self.emit(0);
    }

    /// Add `seconds` of submitted media
    pub fn advance(&mut self, seconds: f64) {
        self.submitted += seconds.max(0.0);
        let percent = if self.total > 0.0 {
            (self.submitted / self.total * 100.0).floor().clamp(0.0, 100.0) as u8
        } else {
            0
        };
        // 100 is reserved for a finalized artifact
        self.emit(percent.min(99));
    }

    pub fn complete(&mut self) {
        self.emit(100);
    }

    pub fn percent(&self) -> u8 {
        self.last.unwrap_or(0)
    }

    fn emit(&mut self, percent: u8) {
        if self.last.map_or(true, |last| percent > last) {
            self.last = Some(percent);
            (self.callback)(percent);
        }
    }
}
