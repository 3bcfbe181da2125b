//! Upload progress accounting.

/// Converts transmitted byte counts into percentages for a callback.
///
/// Reported values are strictly increasing. While bytes are in flight the
/// percentage is capped at 99; only [`UploadProgress::complete`] reports 100,
/// which the client calls once the store has acknowledged the upload.
pub struct UploadProgress<F> {
    total: u64,
    sent: u64,
    last: Option<u8>,
    callback: F,
}

impl<F: FnMut(u8)> UploadProgress<F> {
    pub fn new(total: u64, callback: F) -> Self {
        Self {
            total,
            sent: 0,
            last: None,
            callback,
        }
    }

    /// Report the starting point.
    pub fn start(&mut self) {
        self.report(0);
    }

    /// Account for `bytes` more bytes handed to the transport.
    pub fn advance(&mut self, bytes: u64) {
        self.sent = self.sent.saturating_add(bytes).min(self.total);
        let percent = if self.total == 0 {
            0
        } else {
            (self.sent.saturating_mul(100) / self.total) as u8
        };
        self.report(percent.min(99));
    }

    /// The store acknowledged the upload.
    pub fn complete(&mut self) {
        self.report(100);
    }

    fn report(&mut self, percent: u8) {
        if self.last.map_or(true, |last| percent > last) {
            self.last = Some(percent);
            (self.callback)(percent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic_and_capped() {
        let mut seen = Vec::new();
        {
            let mut progress = UploadProgress::new(1000, |p| seen.push(p));
            progress.start();
            progress.advance(250);
            progress.advance(0);
            progress.advance(750);
            progress.advance(10);
        }
        assert_eq!(seen, vec![0, 25, 99]);
    }

    #[test]
    fn test_complete_reports_hundred_once() {
        let mut seen = Vec::new();
        {
            let mut progress = UploadProgress::new(10, |p| seen.push(p));
            progress.advance(10);
            progress.complete();
            progress.complete();
        }
        assert_eq!(seen, vec![99, 100]);
    }

    #[test]
    fn test_empty_payload() {
        let mut seen = Vec::new();
        {
            let mut progress = UploadProgress::new(0, |p| seen.push(p));
            progress.start();
            progress.advance(0);
            progress.complete();
        }
        assert_eq!(seen, vec![0, 100]);
    }
}
