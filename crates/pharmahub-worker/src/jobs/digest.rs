//! Digest job, one instance per frequency.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use pharmahub_core::result::AppResult;
use pharmahub_entity::notification::DigestFrequency;
use pharmahub_service::DigestService;

use crate::job::JobHandler;

#[derive(Debug)]
pub struct DigestJob {
    digests: Arc<DigestService>,
    frequency: DigestFrequency,
}

impl DigestJob {
    pub fn new(digests: Arc<DigestService>, frequency: DigestFrequency) -> Self {
        Self { digests, frequency }
    }
}

#[async_trait]
impl JobHandler for DigestJob {
    async fn run(&self) -> AppResult<Value> {
        let report = self.digests.run(self.frequency).await?;
        let mut summary = serde_json::to_value(report)?;
        summary["frequency"] = serde_json::to_value(self.frequency)?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing;

    #[tokio::test]
    async fn test_digest_without_subscribers() {
        let (services, _) = testing::services();
        let summary = DigestJob::new(services.digests, DigestFrequency::Weekly)
            .run()
            .await
            .unwrap();
        assert_eq!(summary["frequency"], "weekly");
        assert_eq!(summary["digests"], 0);
    }
}
