//! Bounded-concurrency validation runs

use crate::proxy::classifier::{ProbeStrategy, ProxyClassifier};
use crate::proxy::dedup::Deduplicator;
use crate::proxy::models::{ClassificationResult, ProxyAddress};
use crate::proxy::parser::ProxyParser;
use crate::proxy::prober::{NetworkProber, Prober};
use crate::proxy::progress::{ProgressReporter, RunCounters};
use crate::proxy::sink::ResultSink;
use crate::Result;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default deadline for one protocol attempt
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default number of classifications in flight
const DEFAULT_CONCURRENCY: usize = 5000;

/// Default progress redraw interval
const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// Default URL fetched through SOCKS candidates
const DEFAULT_SOCKS_TARGET: &str = "http://example.com/";

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Deadline for each protocol attempt
    pub timeout: Duration,
    /// Maximum number of classifications running at once
    pub concurrency: usize,
    pub strategy: ProbeStrategy,
    /// Plain-HTTP URL requested through SOCKS candidates
    pub socks_target: String,
    /// Skip certificate checks on TLS probes
    pub accept_invalid_certs: bool,
    /// Progress redraw interval; `None` disables rendering
    pub progress_interval: Option<Duration>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            concurrency: DEFAULT_CONCURRENCY,
            strategy: ProbeStrategy::default(),
            socks_target: DEFAULT_SOCKS_TARGET.to_string(),
            accept_invalid_certs: true,
            progress_interval: Some(Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS)),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A ceiling of zero is treated as one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_strategy(mut self, strategy: ProbeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_socks_target(mut self, url: String) -> Self {
        self.socks_target = url;
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn with_progress_interval(mut self, interval: Option<Duration>) -> Self {
        self.progress_interval = interval;
        self
    }
}

/// Totals reported at the end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Unique, well-formed candidates dispatched
    pub total: u64,
    pub processed: u64,
    pub valid: u64,
    pub invalid: u64,
    /// Valid results whose output line could not be written
    pub unwritten: u64,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Checked {} proxies in {:.1}s: {} valid, {} invalid",
            self.total,
            self.elapsed.as_secs_f64(),
            self.valid,
            self.invalid
        )?;
        if self.unwritten > 0 {
            write!(f, " ({} could not be written)", self.unwritten)?;
        }
        Ok(())
    }
}

/// Validates candidate lists under a global concurrency ceiling
pub struct ProxyChecker {
    config: CheckerConfig,
    classifier: ProxyClassifier,
}

impl ProxyChecker {
    /// Create a checker that probes the network with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CheckerConfig::default())
    }

    /// Create a checker that probes the network
    pub fn with_config(config: CheckerConfig) -> Result<Self> {
        let prober = NetworkProber::from_config(&config)?;
        Ok(Self::with_prober(config, Arc::new(prober)))
    }

    /// Create a checker backed by any [`Prober`]
    pub fn with_prober(config: CheckerConfig, prober: Arc<dyn Prober>) -> Self {
        let classifier = ProxyClassifier::new(prober, config.timeout, config.strategy);
        Self { config, classifier }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Drop repeats (first seen wins), then malformed tokens
    pub fn admit<I>(candidates: I, dedup: &Deduplicator) -> Vec<ProxyAddress>
    where
        I: IntoIterator<Item = String>,
    {
        candidates
            .into_iter()
            .filter(|candidate| dedup.admit(candidate))
            .filter_map(|candidate| ProxyParser::parse_address(&candidate))
            .collect()
    }

    /// Check the list at `input` and write working proxies to `output`.
    ///
    /// An unreadable input or an output that cannot be created aborts before
    /// any candidate is processed.
    pub async fn check_file<P, Q>(&self, input: P, output: Q) -> Result<RunSummary>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let candidates = ProxyParser::load_candidates(&input)?;
        info!(
            "Loaded {} candidates from {}",
            candidates.len(),
            input.as_ref().display()
        );
        let sink = ResultSink::create(&output).await?;
        Ok(self.run(candidates, sink).await)
    }

    /// Classify every unique, well-formed candidate once and stream the
    /// working ones into `sink`. Returns when all admitted work is done.
    pub async fn run(&self, candidates: Vec<String>, sink: ResultSink) -> RunSummary {
        let start = Instant::now();
        let received = candidates.len();

        let dedup = Deduplicator::new();
        let addresses = Self::admit(candidates, &dedup);
        debug!(
            "{} candidates, {} unique, {} well-formed",
            received,
            dedup.len(),
            addresses.len()
        );

        let counters = Arc::new(RunCounters::new(addresses.len()));
        info!(
            "Checking {} proxies (concurrency {}, timeout {}ms, {:?})",
            addresses.len(),
            self.config.concurrency,
            self.config.timeout.as_millis(),
            self.config.strategy
        );

        let progress = self
            .config
            .progress_interval
            .map(|interval| ProgressReporter::new(Arc::clone(&counters), interval).spawn(std::io::stderr()));

        let unwritten = self.dispatch(addresses, sink, Arc::clone(&counters)).await;

        if let Some(progress) = progress {
            progress.finish().await;
        }

        let snapshot = counters.snapshot();
        RunSummary {
            total: snapshot.total,
            processed: snapshot.processed,
            valid: snapshot.valid,
            invalid: snapshot.invalid,
            unwritten,
            elapsed: start.elapsed(),
        }
    }

    /// Admission window: at most `concurrency` classifications are in flight
    /// and each completion immediately admits the next address. Results flow
    /// over a bounded channel to one aggregator, the only writer of the
    /// counters and the sink.
    async fn dispatch(
        &self,
        addresses: Vec<ProxyAddress>,
        sink: ResultSink,
        counters: Arc<RunCounters>,
    ) -> u64 {
        let ceiling = self.config.concurrency.max(1);
        let (tx, mut rx) = mpsc::channel::<ClassificationResult>(ceiling);

        let aggregator = tokio::spawn(async move {
            let mut unwritten = 0u64;
            while let Some(result) = rx.recv().await {
                if let Err(e) = sink.write(&result).await {
                    warn!("Failed to write {}: {}", result.address, e);
                    unwritten += 1;
                }
                counters.record(result.succeeded());
            }
            unwritten
        });

        stream::iter(addresses)
            .map(|address| {
                let classifier = self.classifier.clone();
                async move {
                    let fallback = address.clone();
                    let task = tokio::spawn(async move {
                        let protocol = classifier.classify(&address).await;
                        ClassificationResult::new(address, protocol)
                    });
                    match task.await {
                        Ok(result) => result,
                        Err(e) => {
                            warn!("Classification of {} aborted: {}", fallback, e);
                            ClassificationResult::new(fallback, None)
                        }
                    }
                }
            })
            .buffer_unordered(ceiling)
            .for_each(|result| {
                let tx = tx.clone();
                async move {
                    // The aggregator only stops once every sender is gone
                    let _ = tx.send(result).await;
                }
            })
            .await;

        drop(tx);
        match aggregator.await {
            Ok(unwritten) => unwritten,
            Err(e) => {
                warn!("Result aggregator failed: {}", e);
                0
            }
        }
    }
}
