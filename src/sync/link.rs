//! Push-channel connection state

use serde::{Deserialize, Serialize};

/// Where the event stream connection currently is
///
/// ```text
/// Connecting ──ok──▶ Live ──drop/error──▶ OfflinePendingRetry ──delay──▶ Connecting
///      └──────────fail───────────────────────────▲
/// ```
///
/// `Closed` is entered once, on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkState {
    /// Attempt number since the last live connection (1-based)
    Connecting { attempt: u32 },
    /// Connected; `epoch` identifies this connection
    Live { epoch: u64 },
    /// Disconnected, waiting out the reconnect delay before `attempt`
    OfflinePendingRetry { attempt: u32 },
    Closed,
}

impl LinkState {
    /// The binary live/offline indicator
    pub fn is_live(&self) -> bool {
        matches!(self, LinkState::Live { .. })
    }

    /// Whether messages from connection `epoch` may still be applied
    pub fn accepts(&self, epoch: u64) -> bool {
        matches!(self, LinkState::Live { epoch: current } if *current == epoch)
    }
}

impl Default for LinkState {
    fn default() -> Self {
        LinkState::Connecting { attempt: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_live_is_live() {
        assert!(LinkState::Live { epoch: 1 }.is_live());
        assert!(!LinkState::default().is_live());
        assert!(!LinkState::OfflinePendingRetry { attempt: 2 }.is_live());
        assert!(!LinkState::Closed.is_live());
    }

    #[test]
    fn test_accepts_current_epoch_only() {
        let link = LinkState::Live { epoch: 3 };
        assert!(link.accepts(3));
        assert!(!link.accepts(2));
        assert!(!LinkState::OfflinePendingRetry { attempt: 1 }.accepts(3));
    }
}
