use crate::config::LoggingConfig;
use crate::domains::logger::{DomainLogger, DynLogger, FileLogger};
use std::sync::Arc;

/// Forwards domain log lines to `tracing`.
struct TracingBridge;

impl DomainLogger for TracingBridge {
    fn info(&self, msg: &str) {
        tracing::info!(target: "campus_guide::domain", "{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!(target: "campus_guide::domain", "{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!(target: "campus_guide::domain", "{}", msg);
    }
}

pub fn init_tracing_logger() -> DynLogger {
    Arc::new(TracingBridge)
}

struct NoOp;

impl DomainLogger for NoOp {
    fn info(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}

/// No-op logger, the default in tests.
pub fn init_noop_logger() -> DynLogger {
    Arc::new(NoOp)
}

/// Installs fast_log writing to `path` and returns a logger that feeds it.
pub fn init_file_logger(path: &str) -> Result<DynLogger, String> {
    let logger = FileLogger::init(path).map_err(|e| format!("Failed to initialize fast_log: {}", e))?;
    Ok(Arc::new(logger))
}

/// Writes every line to all of its targets.
pub struct MultiLogger {
    targets: Vec<DynLogger>,
}

impl MultiLogger {
    pub fn new(targets: Vec<DynLogger>) -> Self {
        Self { targets }
    }
}

impl DomainLogger for MultiLogger {
    fn info(&self, msg: &str) {
        self.targets.iter().for_each(|t| t.info(msg));
    }

    fn warn(&self, msg: &str) {
        self.targets.iter().for_each(|t| t.warn(msg));
    }

    fn error(&self, msg: &str) {
        self.targets.iter().for_each(|t| t.error(msg));
    }
}

/// Logger for the service binary: tracing always, plus the fast_log file when
/// `logging.file` is set and can be opened.
pub fn init_logger(config: &LoggingConfig) -> DynLogger {
    let tracing_logger = init_tracing_logger();
    let Some(path) = config.file.as_deref() else {
        return tracing_logger;
    };

    match init_file_logger(path) {
        Ok(file_logger) => Arc::new(MultiLogger::new(vec![tracing_logger, file_logger])),
        Err(e) => {
            tracing::warn!("File logging to {} disabled: {}", path, e);
            tracing_logger
        }
    }
}
