use std::fmt;
use tracing::{error, info, warn};

/// User-facing notification emitted by the loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A library version was activated from the network
    Loaded { version: String },
    /// A newer version could not be loaded; the cached one stays active
    UpdateFailed { retained: String },
    /// No usable library; initialization failed
    InitFailed { reason: String },
}

impl Notice {
    /// Blocking notices need the user's attention before rendering works
    pub fn is_blocking(&self) -> bool {
        matches!(self, Notice::InitFailed { .. })
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Loaded { version } => write!(f, "Mermaid v{} loaded", version),
            Notice::UpdateFailed { retained } => {
                write!(f, "Mermaid update failed, using version {}", retained)
            }
            Notice::InitFailed { reason } => {
                write!(f, "Cannot load Mermaid, cannot reach network: {}", reason)
            }
        }
    }
}

/// Sink for loader notices (the host glue shows them to the user)
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::Loaded { .. } => info!("✅ {}", notice),
            Notice::UpdateFailed { .. } => warn!("⚠️  {}", notice),
            Notice::InitFailed { .. } => error!("❌ {}", notice),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_display() {
        let notice = Notice::UpdateFailed {
            retained: "9.0.0".to_string(),
        };
        assert_eq!(notice.to_string(), "Mermaid update failed, using version 9.0.0");
        assert!(!notice.is_blocking());

        let notice = Notice::InitFailed {
            reason: "timed out".to_string(),
        };
        assert!(notice.is_blocking());
        assert!(notice.to_string().contains("cannot reach network"));
    }
}
