//! Upload progress reporting

use crate::ui::ProgressMessage;

/// Receives progress notifications during one upload pass.
///
/// `report` is called after each chunk is committed with the number of chunks
/// written so far; the values never decrease and the last call of a
/// successful pass has `completed == total`.
pub trait ProgressSink: Send {
    /// The pass is about to write `total` chunks
    fn started(&mut self, _total: usize) {}

    /// `completed` of `total` chunks are committed
    fn report(&mut self, completed: usize, total: usize);

    /// The pass wrote every chunk
    fn finished(&mut self) {}

    /// The pass was aborted
    fn failed(&mut self, _reason: &str) {}
}

/// Fraction of the pass that is done, in `[0, 1]`
pub fn fraction(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (completed as f64 / total as f64).clamp(0.0, 1.0)
}

/// Plain callbacks receive the completed fraction
impl<F> ProgressSink for F
where
    F: FnMut(f64) + Send,
{
    fn report(&mut self, completed: usize, total: usize) {
        self(fraction(completed, total))
    }
}

/// Forwards notifications over a channel, typically to a `ProgressReporter` thread
#[derive(Debug, Clone)]
pub struct ProgressChannel(pub crossbeam::channel::Sender<ProgressMessage>);

impl ProgressSink for ProgressChannel {
    fn started(&mut self, total: usize) {
        let _ = self.0.send(ProgressMessage::Started { total });
    }

    fn report(&mut self, completed: usize, total: usize) {
        let _ = self.0.send(ProgressMessage::Progress {
            current: completed,
            total,
        });
    }

    fn finished(&mut self) {
        let _ = self.0.send(ProgressMessage::Finished);
    }

    fn failed(&mut self, reason: &str) {
        let _ = self.0.send(ProgressMessage::Error(reason.to_string()));
    }
}

/// Discards all progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _completed: usize, _total: usize) {}
}
