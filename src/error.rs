//! Error type shared by the validation engine and its collaborators

use std::io;

/// Error type for proxy-sieve operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Configuration encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid proxy address: {0}")]
    InvalidAddress(String),

    #[error("Invalid reachability target: {0}")]
    InvalidTarget(String),

    /// The SOCKS server answered but refused the CONNECT request
    #[error("SOCKS request rejected with code {0:#04x}")]
    SocksRejected(u8),

    #[error("Malformed SOCKS reply: {0}")]
    SocksProtocol(String),

    #[error("Unexpected HTTP status: {0}")]
    HttpStatus(u16),

    #[error("Malformed HTTP response: {0}")]
    HttpResponse(String),
}

/// Result type for proxy-sieve operations
pub type Result<T> = std::result::Result<T, Error>;
