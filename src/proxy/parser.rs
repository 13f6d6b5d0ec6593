//! Candidate address validation and list loading

use crate::proxy::models::ProxyAddress;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Structural `a.b.c.d:port` check. Octet ranges are not enforced.
static ADDRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}):([0-9]+)$")
        .expect("Invalid address regex")
});

/// Parser for candidate address tokens and lists
pub struct ProxyParser;

impl ProxyParser {
    /// Whether `candidate` has the shape `d.d.d.d:d+` (1-3 digits per group)
    pub fn is_valid(candidate: &str) -> bool {
        ADDRESS_REGEX.is_match(candidate)
    }

    /// Split a valid candidate into host and port
    pub fn parse_address(candidate: &str) -> Option<ProxyAddress> {
        let caps = ADDRESS_REGEX.captures(candidate)?;
        Some(ProxyAddress::new(&caps[1], &caps[2]))
    }

    /// Split text into candidate tokens, one per non-empty line
    pub fn parse_candidates(content: &str) -> Vec<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Read the candidate list from a file
    pub fn load_candidates<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse_candidates(&content))
    }

    /// Write a candidate list, replacing the file contents
    pub fn save_candidates<P: AsRef<Path>>(candidates: &[String], path: P) -> Result<()> {
        let mut content = candidates.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(path, content)?;
        Ok(())
    }
}
