//! In-process provider that records what it was asked to send.
//!
//! Outcomes can be scripted per call so tests can drive failures,
//! bounces and successes in a fixed order.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::channel::{ChannelProvider, DeliveryFailure, OutboundMessage};

/// Recording provider.
#[derive(Debug, Default)]
pub struct RecordingChannelProvider {
    sent: Mutex<Vec<OutboundMessage>>,
    script: Mutex<VecDeque<Result<(), DeliveryFailure>>>,
    fallback: Mutex<Option<DeliveryFailure>>,
    delay: Option<Duration>,
}

impl RecordingChannelProvider {
    /// A provider that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Queue the outcome of the next unanswered call.
    pub fn push_outcome(&self, outcome: Result<(), DeliveryFailure>) {
        lock(&self.script).push_back(outcome);
    }

    /// Answer every unscripted call with `failure`.
    pub fn fail_always(&self, failure: DeliveryFailure) {
        *lock(&self.fallback) = Some(failure);
    }

    /// Messages received so far, failed ones included.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        lock(&self.sent).clone()
    }

    /// Number of calls received.
    pub fn calls(&self) -> usize {
        lock(&self.sent).len()
    }
}

#[async_trait]
impl ChannelProvider for RecordingChannelProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryFailure> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.sent).push(message.clone());
        let scripted = lock(&self.script).pop_front();
        match scripted {
            Some(outcome) => outcome,
            None => match lock(&self.fallback).clone() {
                Some(failure) => Err(failure),
                None => Ok(()),
            },
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
