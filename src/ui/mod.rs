pub mod icons;
pub mod output;
pub mod progress;
pub mod progress_message;

pub use icons::Icons;
pub use output::{
    delete_error_message, error, file_deleted, human_bytes, playback_error_message,
    report_delete_error, report_playback_error, report_upload_error, stats, stats_line, success,
    upload_error_message, upload_saved, warn,
};
pub use progress::ProgressReporter;
pub use progress_message::ProgressMessage;
