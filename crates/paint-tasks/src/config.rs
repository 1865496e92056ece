//! Scheduler configuration

use serde::{Deserialize, Serialize};

/// Default cap on queued (not yet running) tasks per mesh.
pub const DEFAULT_MAX_PENDING_PER_MESH: usize = 20;

/// Tuning knobs for the paint task scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Queued tasks allowed per mesh before further submissions are
    /// rejected. Submissions flagged `bypass_queue_limit` are exempt.
    pub max_pending_per_mesh: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_pending_per_mesh: DEFAULT_MAX_PENDING_PER_MESH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_pending_per_mesh, DEFAULT_MAX_PENDING_PER_MESH);
    }
}
