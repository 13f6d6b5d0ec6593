//! Proxy data models

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Protocol a candidate was found to accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyType {
    /// Order in which protocols are tried; earlier entries win ties
    pub const PRIORITY: [ProxyType; 4] = [
        ProxyType::Http,
        ProxyType::Https,
        ProxyType::Socks4,
        ProxyType::Socks5,
    ];

    /// URL scheme used in output lines
    pub fn scheme(&self) -> &'static str {
        match self {
            ProxyType::Http => "http",
            ProxyType::Https => "https",
            ProxyType::Socks4 => "socks4",
            ProxyType::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A syntactically valid `ip:port` candidate.
///
/// Octets and port are kept as written: `999.1.1.1:80` passes the format
/// check and only fails once something tries to connect to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyAddress {
    pub host: String,
    pub port: String,
}

impl ProxyAddress {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    /// Resolve to a connectable socket address.
    ///
    /// Each octet is read as a number, so zero-padded forms such as
    /// `010.001.002.003` resolve to `10.1.2.3`.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let invalid = || Error::InvalidAddress(self.to_string());
        let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

        let mut octets = [0u8; 4];
        let mut parts = self.host.split('.');
        for octet in octets.iter_mut() {
            *octet = parts
                .next()
                .filter(|part| numeric(part))
                .and_then(|part| part.parse().ok())
                .ok_or_else(invalid)?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        if !numeric(&self.port) {
            return Err(invalid());
        }
        let port: u16 = self.port.parse().map_err(|_| invalid())?;

        Ok(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(octets), port)))
    }

    /// Output form, e.g. `socks5://1.2.3.4:1080`
    pub fn url(&self, proxy_type: ProxyType) -> String {
        format!("{}://{}:{}", proxy_type, self.host, self.port)
    }
}

impl fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Outcome of classifying one unique address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub address: ProxyAddress,
    /// First protocol that worked, `None` when every attempt failed
    pub protocol: Option<ProxyType>,
}

impl ClassificationResult {
    pub fn new(address: ProxyAddress, protocol: Option<ProxyType>) -> Self {
        Self { address, protocol }
    }

    pub fn succeeded(&self) -> bool {
        self.protocol.is_some()
    }

    /// Line written to the result file, only for successful results
    pub fn output_line(&self) -> Option<String> {
        self.protocol.map(|p| self.address.url(p))
    }
}
