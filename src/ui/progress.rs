use crate::progress::ProgressChannel;
use crate::ui::progress_message::ProgressMessage;
use indicatif::{ProgressBar, ProgressStyle};
use std::thread;

/// Terminal progress bar for an upload, fed over a channel from the writer.
pub struct ProgressReporter {
    bar: ProgressBar,
    handle: thread::JoinHandle<()>,
}

impl ProgressReporter {
    pub fn new() -> (Self, ProgressChannel) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();

        let bar = if console::Term::stdout().is_term() {
            ProgressBar::new(0).with_message("Uploading chunks")
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} chunks ({percent}%)") {
            bar.set_style(style);
        }

        let bar_clone = bar.clone();
        let handle = thread::spawn(move || {
            for msg in rx {
                match msg {
                    ProgressMessage::Started { total } => {
                        bar_clone.set_length(total as u64);
                        bar_clone.set_position(0);
                    }
                    ProgressMessage::Progress { current, total } => {
                        bar_clone.set_length(total as u64);
                        bar_clone.set_position(current as u64);
                    }
                    ProgressMessage::Finished => {
                        bar_clone.finish_with_message("Done");
                    }
                    ProgressMessage::Error(reason) => {
                        bar_clone.abandon_with_message(reason);
                    }
                }
            }
        });

        (Self { bar, handle }, ProgressChannel(tx))
    }

    /// Wait until every sender is dropped and the bar has its final state
    pub fn join(self) -> ProgressBar {
        if self.handle.join().is_err() {
            tracing::warn!("Progress reporter thread panicked");
        }
        self.bar
    }
}
