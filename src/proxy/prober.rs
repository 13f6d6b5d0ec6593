//! Single-protocol reachability probes

use crate::proxy::checker::CheckerConfig;
use crate::proxy::models::{ProxyAddress, ProxyType};
use crate::proxy::socks::{self, ProbeTarget};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{redirect, Client};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Attempts one protocol against one candidate.
///
/// Implementors only provide [`Prober::attempt`]; [`Prober::probe`] adds the
/// hard deadline and folds every failure mode into `false`. Dropping the
/// attempt future on timeout must release whatever it opened.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn attempt(&self, address: &ProxyAddress, protocol: ProxyType) -> Result<()>;

    async fn probe(&self, address: &ProxyAddress, protocol: ProxyType, deadline: Duration) -> bool {
        matches!(
            timeout(deadline, self.attempt(address, protocol)).await,
            Ok(Ok(()))
        )
    }
}

/// Prober that talks to the network.
///
/// HTTP and HTTPS candidates are requested directly (`GET /` on the candidate
/// itself), so a positive result means "answers like an HTTP(S) server", not
/// "forwards traffic". SOCKS candidates are asked to CONNECT to the configured
/// target and relay one `GET`.
pub struct NetworkProber {
    client: Client,
    socks_target: ProbeTarget,
}

impl NetworkProber {
    pub fn from_config(config: &CheckerConfig) -> Result<Self> {
        let client = Client::builder()
            .no_proxy()
            .redirect(redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            socks_target: ProbeTarget::parse(&config.socks_target)?,
        })
    }

    async fn attempt_http(&self, address: &ProxyAddress, protocol: ProxyType) -> Result<()> {
        // Out-of-range octets or ports fail here rather than inside the client.
        // The URL uses the resolved form; URL parsing would read `010` as octal.
        let socket_addr = address.socket_addr()?;

        let url = format!("{}://{}/", protocol.scheme(), socket_addr);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::HttpStatus(status.as_u16()))
        }
    }

    async fn attempt_socks(&self, address: &ProxyAddress, protocol: ProxyType) -> Result<()> {
        let mut stream = TcpStream::connect(address.socket_addr()?).await?;
        match protocol {
            ProxyType::Socks4 => socks::socks4_connect(&mut stream, &self.socks_target).await?,
            _ => socks::socks5_connect(&mut stream, &self.socks_target).await?,
        }

        let status = socks::http_get(&mut stream, &self.socks_target).await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(Error::HttpStatus(status))
        }
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn attempt(&self, address: &ProxyAddress, protocol: ProxyType) -> Result<()> {
        match protocol {
            ProxyType::Http | ProxyType::Https => self.attempt_http(address, protocol).await,
            ProxyType::Socks4 | ProxyType::Socks5 => self.attempt_socks(address, protocol).await,
        }
    }
}
