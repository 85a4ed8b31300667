//! User-facing notifications for the vault operations.
//!
//! The `*_message` functions build the text; the `report_*` and status
//! functions print it.

use crate::storage::StoreStats;
use crate::ui::Icons;
use crate::Error;
use indicatif::HumanBytes;
use owo_colors::{OwoColorize, Style};
use std::sync::OnceLock;

struct Palette {
    success: Style,
    error: Style,
    warn: Style,
    info: Style,
}

static PALETTE: OnceLock<Palette> = OnceLock::new();

/// Colors on a terminal, plain text when output is redirected
fn palette() -> &'static Palette {
    PALETTE.get_or_init(|| {
        if console::Term::stdout().is_term() {
            Palette {
                success: Style::new().green().bold(),
                error: Style::new().red().bold(),
                warn: Style::new().yellow().bold(),
                info: Style::new().magenta(),
            }
        } else {
            Palette {
                success: Style::new(),
                error: Style::new(),
                warn: Style::new(),
                info: Style::new(),
            }
        }
    })
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(palette().success));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(palette().error));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(palette().warn));
}

pub fn human_bytes(bytes: u64) -> String {
    HumanBytes(bytes).to_string()
}

/// Text shown when an upload fails. Quota failures get their own message
/// because the user can act on them.
pub fn upload_error_message(err: &Error) -> String {
    match err {
        Error::QuotaExceeded(_) => "Error saving file: Storage quota exceeded".to_string(),
        Error::StorageUnavailable(msg) => format!("Error saving file: storage unavailable ({})", msg),
        Error::OperationFailed(msg) | Error::Config(msg) => format!("Error saving file: {}", msg),
        Error::Io(e) => format!("Error saving file: {}", e),
    }
}

pub fn playback_error_message(err: &Error) -> String {
    match err {
        Error::StorageUnavailable(msg) => format!("Error playing video: storage unavailable ({})", msg),
        Error::QuotaExceeded(msg) | Error::OperationFailed(msg) | Error::Config(msg) => {
            format!("Error playing video: {}", msg)
        }
        Error::Io(e) => format!("Error playing video: {}", e),
    }
}

pub fn delete_error_message(err: &Error) -> String {
    match err {
        Error::StorageUnavailable(msg) => format!("Error deleting video: storage unavailable ({})", msg),
        Error::QuotaExceeded(msg) | Error::OperationFailed(msg) | Error::Config(msg) => {
            format!("Error deleting video: {}", msg)
        }
        Error::Io(e) => format!("Error deleting video: {}", e),
    }
}

pub fn upload_saved(chunks: usize) {
    success(&format!("File uploaded and saved ({} chunks)", chunks));
}

pub fn file_deleted() {
    println!("{} {}", Icons::DEL, "Video deleted".style(palette().success));
}

pub fn report_upload_error(err: &Error) {
    if err.is_quota() {
        warn(&upload_error_message(err));
    } else {
        error(&upload_error_message(err));
    }
}

pub fn report_playback_error(err: &Error) {
    error(&playback_error_message(err));
}

pub fn report_delete_error(err: &Error) {
    error(&delete_error_message(err));
}

pub fn stats_line(stats: &StoreStats) -> String {
    format!(
        "{} {} chunks  {} {}",
        Icons::PACKAGE.style(palette().info),
        stats.chunks,
        Icons::DATABASE.style(palette().info),
        human_bytes(stats.bytes)
    )
}

pub fn stats(stats: &StoreStats) {
    println!("{}", stats_line(stats));
}
