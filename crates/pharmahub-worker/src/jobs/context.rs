use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use pharmahub_core::result::AppResult;
use pharmahub_service::WorkspaceContextResolver;

use crate::job::JobHandler;

/// Evicts stale workspace context entries.
#[derive(Debug)]
pub struct ContextSweepJob {
    resolver: Arc<WorkspaceContextResolver>,
}

impl ContextSweepJob {
    pub fn new(resolver: Arc<WorkspaceContextResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl JobHandler for ContextSweepJob {
    async fn run(&self) -> AppResult<Value> {
        let evicted = self.resolver.sweep();
        let stats = self.resolver.stats();
        Ok(json!({ "evicted": evicted, "cache": stats }))
    }
}

/// Cron expression firing every `seconds`, rounded to whole minutes above one minute.
pub fn sweep_schedule(seconds: u64) -> String {
    match seconds {
        0..60 => format!("*/{} * * * * *", seconds.max(1)),
        _ => format!("0 */{} * * * *", (seconds / 60).min(59)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_schedule() {
        assert_eq!(sweep_schedule(600), "0 */10 * * * *");
        assert_eq!(sweep_schedule(90), "0 */1 * * * *");
        assert_eq!(sweep_schedule(15), "*/15 * * * * *");
        assert_eq!(sweep_schedule(0), "*/1 * * * * *");
    }
}
