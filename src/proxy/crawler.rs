//! Source list loader
//!
//! Fetches a list of source URLs, pulls `ip:port` tokens out of whatever text
//! they return and merges them into one candidate list.

use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Unanchored: tokens may sit anywhere in HTML, JSON or plain text
static TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([0-9]{1,3}(?:\.[0-9]{1,3}){3}):([0-9]{1,5})\b")
        .expect("Invalid source token regex")
});

/// What one source yielded
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub url: String,
    /// Tokens in order of first appearance
    pub tokens: Vec<String>,
    pub error: Option<String>,
}

impl SourceReport {
    fn fetched(url: &str, tokens: Vec<String>) -> Self {
        Self {
            url: url.to_string(),
            tokens,
            error: None,
        }
    }

    fn failed(url: &str, error: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            tokens: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Whole-request deadline per source
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Collects candidates from remote lists
pub struct ProxyCrawler {
    client: Client,
}

impl ProxyCrawler {
    pub fn new() -> Result<Self> {
        Self::with_config(CrawlerConfig::default())
    }

    pub fn with_config(config: CrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .no_proxy()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Read source URLs, one per line; blank lines and `#` comments are skipped
    pub fn load_sources<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
        Ok(Self::parse_sources(&fs::read_to_string(path)?))
    }

    pub fn parse_sources(content: &str) -> Vec<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()
    }

    /// Fetch one source. Non-2xx answers count as failures.
    pub async fn fetch(&self, url: &str) -> Result<Vec<String>> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(Self::extract_tokens(&body))
    }

    /// Fetch every source in list order. A failing source never stops the rest.
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<SourceReport> {
        let mut reports = Vec::with_capacity(urls.len());
        for url in urls {
            let report = match self.fetch(url).await {
                Ok(tokens) => {
                    info!("{}: {} candidates", url, tokens.len());
                    SourceReport::fetched(url, tokens)
                }
                Err(e) => {
                    warn!("{}: {}", url, e);
                    SourceReport::failed(url, e)
                }
            };
            reports.push(report);
        }
        reports
    }

    /// Fetch all sources and merge their tokens; the first occurrence wins
    pub async fn scrape(&self, urls: &[String]) -> Vec<String> {
        let reports = self.fetch_all(urls).await;
        let failed = reports.iter().filter(|r| !r.is_ok()).count();
        let merged = merge(&reports);
        info!(
            "Scraped {} unique candidates from {} sources ({} failed)",
            merged.len(),
            urls.len(),
            failed
        );
        merged
    }

    /// Pull `ip:port` tokens out of arbitrary text.
    ///
    /// Stricter than the checker's format test: octets must fit in a byte and
    /// the port must be 1-65535. Anything else is page noise.
    pub fn extract_tokens(content: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        for cap in TOKEN_REGEX.captures_iter(content) {
            let (host, port) = (&cap[1], &cap[2]);
            let plausible = host.parse::<Ipv4Addr>().is_ok()
                && port.parse::<u16>().map_or(false, |p| p != 0);
            if !plausible {
                debug!("Skipping {}:{}", host, port);
                continue;
            }
            let token = format!("{host}:{port}");
            if seen.insert(token.clone()) {
                tokens.push(token);
            }
        }
        tokens
    }
}

fn merge(reports: &[SourceReport]) -> Vec<String> {
    let mut seen = HashSet::new();
    reports
        .iter()
        .flat_map(|report| report.tokens.iter())
        .filter(|token| seen.insert(*token))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `body` with `status_line` to every connection
    async fn serve(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}/list.txt")
    }

    #[test]
    fn test_parse_sources_skips_comments() {
        let content = "# free lists\nhttps://example.com/http.txt\n\n  https://example.com/socks5.txt \n";
        assert_eq!(
            ProxyCrawler::parse_sources(content),
            vec![
                "https://example.com/http.txt",
                "https://example.com/socks5.txt"
            ]
        );
    }

    #[test]
    fn test_load_sources_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProxyCrawler::load_sources(dir.path().join("nope.txt")).is_err());
    }

    #[test]
    fn test_extract_from_markup() {
        let content = r#"
<table>
<tr><td>192.168.1.1</td><td>8080</td></tr>
</table>
{"proxy": "10.0.0.1:3128"} and 172.16.0.5:1080, trailing text
"#;
        assert_eq!(
            ProxyCrawler::extract_tokens(content),
            vec!["10.0.0.1:3128", "172.16.0.5:1080"]
        );
    }

    #[test]
    fn test_extract_keeps_first_occurrence_order() {
        let content = "5.5.5.5:80 1.1.1.1:80 5.5.5.5:80 2.2.2.2:80 1.1.1.1:80";
        assert_eq!(
            ProxyCrawler::extract_tokens(content),
            vec!["5.5.5.5:80", "1.1.1.1:80", "2.2.2.2:80"]
        );
    }

    #[test]
    fn test_extract_rejects_noise() {
        assert!(ProxyCrawler::extract_tokens("999.1.1.1:8080").is_empty());
        assert!(ProxyCrawler::extract_tokens("192.168.1.1:0").is_empty());
        assert!(ProxyCrawler::extract_tokens("192.168.1.1:70000").is_empty());
        assert!(ProxyCrawler::extract_tokens("version 1.2.3 port 80").is_empty());
    }

    #[test]
    fn test_merge_across_sources() {
        let reports = vec![
            SourceReport::fetched("a", vec!["1.1.1.1:80".into(), "2.2.2.2:80".into()]),
            SourceReport::failed("b", "timeout"),
            SourceReport::fetched("c", vec!["2.2.2.2:80".into(), "3.3.3.3:80".into()]),
        ];
        assert_eq!(merge(&reports), vec!["1.1.1.1:80", "2.2.2.2:80", "3.3.3.3:80"]);
    }

    #[tokio::test]
    async fn test_scrape_survives_failing_sources() {
        let good = serve("HTTP/1.1 200 OK", "1.2.3.4:80\n5.6.7.8:1080\n").await;
        let not_found = serve("HTTP/1.1 404 Not Found", "9.9.9.9:80\n").await;
        let unreachable = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            format!("http://{}/list.txt", listener.local_addr().unwrap())
        };

        let crawler = ProxyCrawler::with_config(
            CrawlerConfig::new().with_timeout(Duration::from_secs(5)),
        )
        .unwrap();
        let urls = vec![unreachable, not_found, good];

        let reports = crawler.fetch_all(&urls).await;
        assert_eq!(
            reports.iter().map(SourceReport::is_ok).collect::<Vec<_>>(),
            vec![false, false, true]
        );

        let candidates = crawler.scrape(&urls).await;
        assert_eq!(candidates, vec!["1.2.3.4:80", "5.6.7.8:1080"]);
    }
}
