//! Per-address protocol classification

use crate::proxy::models::{ProxyAddress, ProxyType};
use crate::proxy::prober::Prober;
use futures::stream::{FuturesOrdered, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// How the four protocol attempts for one address are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStrategy {
    /// One attempt at a time, stop at the first success
    #[default]
    Sequential,
    /// All attempts at once, results accepted in priority order.
    /// Holds up to four sockets per classification.
    Race,
}

/// Finds the highest-priority protocol a candidate accepts
#[derive(Clone)]
pub struct ProxyClassifier {
    prober: Arc<dyn Prober>,
    timeout: Duration,
    strategy: ProbeStrategy,
}

impl ProxyClassifier {
    pub fn new(prober: Arc<dyn Prober>, timeout: Duration, strategy: ProbeStrategy) -> Self {
        Self {
            prober,
            timeout,
            strategy,
        }
    }

    /// Returns the winning protocol, or `None` if every attempt failed.
    /// Never fails.
    pub async fn classify(&self, address: &ProxyAddress) -> Option<ProxyType> {
        match self.strategy {
            ProbeStrategy::Sequential => self.classify_sequential(address).await,
            ProbeStrategy::Race => self.classify_race(address).await,
        }
    }

    async fn classify_sequential(&self, address: &ProxyAddress) -> Option<ProxyType> {
        for protocol in ProxyType::PRIORITY {
            if self.prober.probe(address, protocol, self.timeout).await {
                return Some(protocol);
            }
        }
        None
    }

    async fn classify_race(&self, address: &ProxyAddress) -> Option<ProxyType> {
        // FuturesOrdered polls every attempt concurrently but yields in
        // priority order, so a lower-priority success is only seen once all
        // higher-priority attempts have failed. Returning drops the rest.
        let mut attempts: FuturesOrdered<_> = ProxyType::PRIORITY
            .into_iter()
            .map(|protocol| async move {
                self.prober
                    .probe(address, protocol, self.timeout)
                    .await
                    .then_some(protocol)
            })
            .collect();

        while let Some(outcome) = attempts.next().await {
            if outcome.is_some() {
                return outcome;
            }
        }
        None
    }
}
