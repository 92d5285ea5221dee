use chrono::Utc;
use std::sync::Arc;

/// Logging port the navigation services write their operational trail to.
/// Never fails from the caller's point of view.
pub trait DomainLogger: Send + Sync + 'static {
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

pub type DynLogger = Arc<dyn DomainLogger>;

/// Writes through the `log` facade into the process-wide fast_log file appender.
pub struct FileLogger;

impl FileLogger {
    /// Installs fast_log as the `log` backend writing to `path`. Only the
    /// first call in a process succeeds.
    pub fn init(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        fast_log::init(
            fast_log::config::Config::new()
                .file(path)
                .level(log::LevelFilter::Info),
        )?;
        Ok(FileLogger)
    }
}

impl DomainLogger for FileLogger {
    fn info(&self, msg: &str) {
        log::info!("{} {}", Utc::now().to_rfc3339(), msg);
    }

    fn warn(&self, msg: &str) {
        log::warn!("{} {}", Utc::now().to_rfc3339(), msg);
    }

    fn error(&self, msg: &str) {
        log::error!("{} {}", Utc::now().to_rfc3339(), msg);
    }
}
