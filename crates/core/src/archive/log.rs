//! Minimal logging capability required by the engine and the scheduler.

use tracing::{error, info};

/// Info/error sink for run progress messages.
pub trait ArchiveLog: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards to `tracing` when enabled, otherwise discards.
#[derive(Debug, Clone, Copy)]
pub struct TracingLog {
    enabled: bool,
}

impl TracingLog {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for TracingLog {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ArchiveLog for TracingLog {
    fn info(&self, message: &str) {
        if self.enabled {
            info!(target: "dbarchive", "{message}");
        }
    }

    fn error(&self, message: &str) {
        if self.enabled {
            error!(target: "dbarchive", "{message}");
        }
    }
}
