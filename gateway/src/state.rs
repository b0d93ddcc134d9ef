use std::sync::Arc;

use relay_catalog::ToolCatalog;
use relay_db::TaskStore;
use relay_progress::ProgressBus;
use relay_queue::QueueBroker;
use relay_types::UserKind;

/// Shared application state, handed to every handler via `axum`'s
/// `State` extractor — the same shape as the teacher's `AppStateData`
/// (one `Clone`-able struct of `Arc`s, no interior locking beyond what
/// each adapter already does).
#[derive(Clone)]
pub struct AppState {
    pub task_store: Arc<dyn TaskStore>,
    pub queue_broker: Arc<dyn QueueBroker>,
    pub catalog: Arc<dyn ToolCatalog>,
    pub progress_bus: Arc<dyn ProgressBus>,
    pub config: Arc<GatewayConfig>,
}

/// Which owner kinds this gateway process accepts intake for. A deployment
/// runs one gateway for the web-facing surface and, optionally, a second
/// instance configured with `admin` for the admin console — mirroring the
/// worker's own `QUEUE_PREFIX` split (§4.5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptedOwners {
    WebOnly,
    AdminOnly,
    Both,
}

impl AcceptedOwners {
    pub fn accepts(self, kind: UserKind) -> bool {
        match self {
            AcceptedOwners::WebOnly => kind == UserKind::Web,
            AcceptedOwners::AdminOnly => kind == UserKind::Admin,
            AcceptedOwners::Both => true,
        }
    }
}

pub struct GatewayConfig {
    pub accepted_owners: AcceptedOwners,
    pub sweeper_interval_ms: u64,
    pub sweeper_orphan_age_ms: i64,
    pub default_max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_only_rejects_admin() {
        assert!(AcceptedOwners::WebOnly.accepts(UserKind::Web));
        assert!(!AcceptedOwners::WebOnly.accepts(UserKind::Admin));
    }

    #[test]
    fn admin_only_rejects_web() {
        assert!(AcceptedOwners::AdminOnly.accepts(UserKind::Admin));
        assert!(!AcceptedOwners::AdminOnly.accepts(UserKind::Web));
    }

    #[test]
    fn both_accepts_everything() {
        assert!(AcceptedOwners::Both.accepts(UserKind::Web));
        assert!(AcceptedOwners::Both.accepts(UserKind::Admin));
    }
}
