//! Proxy validation engine
//!
//! This module provides functionality for:
//! - Validating and deduplicating `ip:port` candidates
//! - Probing each candidate for HTTP, HTTPS, SOCKS4 and SOCKS5
//! - Running classifications under a global concurrency ceiling
//! - Live progress and incremental output of working proxies
//! - Loading candidate lists from remote sources

pub mod checker;
pub mod classifier;
pub mod crawler;
pub mod dedup;
pub mod models;
pub mod parser;
pub mod prober;
pub mod progress;
pub mod sink;
pub mod socks;

pub use checker::{CheckerConfig, ProxyChecker, RunSummary};
pub use classifier::{ProbeStrategy, ProxyClassifier};
pub use crawler::{CrawlerConfig, ProxyCrawler, SourceReport};
pub use dedup::Deduplicator;
pub use models::{ClassificationResult, ProxyAddress, ProxyType};
pub use parser::ProxyParser;
pub use prober::{NetworkProber, Prober};
pub use progress::{ProgressReporter, ProgressSnapshot, RunCounters};
pub use sink::ResultSink;
