
use chrono::Local;
use log::{error, info};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Converts a duration in seconds into a days/hours/minutes/seconds string.
/// Leading zero-valued units are omitted; the seconds component is always present.
/// # Examples
/// * `61.0` - renders as `1m:1s`
/// * `90000.0` - renders as `1d:1h:0s`
pub fn format_elapsed(seconds: f64) -> String {
    let total_seconds: u64 = seconds.round() as u64;
    let days: u64 = total_seconds / 86400;
    let hours: u64 = (total_seconds % 86400) / 3600;
    let minutes: u64 = (total_seconds % 3600) / 60;
    let remainder: u64 = total_seconds % 60;

    let mut formatted: String = String::new();
    if days > 0 {
        formatted.push_str(&format!("{days}d:"));
    }
    if hours > 0 {
        formatted.push_str(&format!("{hours}h:"));
    }
    if minutes > 0 {
        formatted.push_str(&format!("{minutes}m:"));
    }
    formatted.push_str(&format!("{remainder}s"));
    formatted
}

/// Current wall-clock time, rendered the way it appears in the run log.
pub fn timestamp() -> String {
    Local::now().format("%a %b %e %H:%M:%S %Y").to_string()
}

/// Derives the error sentinel path for a log file, e.g. `plink_conversion.log.error`.
pub fn error_sentinel_path(log_path: &Path) -> PathBuf {
    let mut extension_path = log_path.to_owned()
        .into_os_string();
    extension_path.push(".error");
    PathBuf::from(extension_path)
}

/// A run-scoped log that mirrors every message to the standard logger and a log file.
/// Fatal messages additionally overwrite an error sentinel file next to the log.
/// The file handle sits behind a `Mutex` so an `Arc<RunLog>` can be shared with worker threads.
pub struct RunLog {
    /// Path to the log file, `None` disables all file output
    log_path: Option<PathBuf>,
    /// Open handle for the log file
    log_file: Mutex<Option<File>>
}

impl RunLog {
    /// Creates a new run log, truncating any previous log file at the same path.
    /// Any error sentinel left behind by a previous run is deleted here.
    /// # Arguments
    /// * `log_path` - target for the log file; `None` skips file output entirely
    /// # Errors
    /// * if the log file cannot be created
    pub fn new(log_path: Option<&Path>) -> std::io::Result<RunLog> {
        let log_file: Option<File> = match log_path {
            Some(path) => {
                // remove the error file from a previous run if it exists
                match std::fs::remove_file(error_sentinel_path(path)) {
                    Ok(()) => {},
                    Err(_) => {}
                };
                Some(File::create(path)?)
            },
            None => None
        };
        Ok(RunLog {
            log_path: log_path.map(|p| p.to_path_buf()),
            log_file: Mutex::new(log_file)
        })
    }

    /// Logs a message to stderr and appends it to the log file.
    pub fn log(&self, message: &str) {
        info!("{message}");
        self.append(message);
    }

    /// Logs a fatal message and overwrites the error sentinel file with it.
    /// The sentinel always holds exactly the last message, never a history.
    pub fn error(&self, message: &str) {
        error!("{message}");
        self.append(message);
        if let Some(log_path) = self.log_path.as_ref() {
            let sentinel: PathBuf = error_sentinel_path(log_path);
            if let Err(e) = std::fs::write(&sentinel, format!("{}\n", message.trim_end())) {
                error!("Error while writing error sentinel {:?}: {}", sentinel, e);
            }
        }
    }

    /// Appends a stripped, newline-terminated message to the log file, flushing immediately.
    fn append(&self, message: &str) {
        let mut guard = self.log_file.lock().unwrap();
        if let Some(log_file) = guard.as_mut() {
            let write_result = writeln!(log_file, "{}", message.trim_end())
                .and_then(|_| log_file.flush());
            if let Err(e) = write_result {
                error!("Error while writing to log file: {}", e);
            }
        }
    }
}
