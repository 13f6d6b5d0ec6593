//! Proxy Sieve - concurrent proxy validator
//!
//! Takes a large list of `ip:port` candidates, probes each one for plain
//! HTTP, HTTPS, SOCKS4 and SOCKS5 under a global concurrency ceiling, and
//! writes out the ones that answered, tagged with the protocol that worked.

pub mod config;
pub mod error;
pub mod logging;
pub mod menu;
pub mod proxy;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use proxy::*;
