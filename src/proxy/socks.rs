//! Minimal SOCKS4/4a/5 client handshakes and a one-shot HTTP request
//!
//! Only what a reachability probe needs: a no-auth CONNECT to a fixed target,
//! then a single `GET` whose status line decides the outcome.

use crate::{Error, Result};
use reqwest::Url;
use std::net::Ipv4Addr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const SOCKS4_VERSION: u8 = 0x04;
const SOCKS5_VERSION: u8 = 0x05;
const CMD_CONNECT: u8 = 0x01;
const SOCKS4_REPLY_VERSION: u8 = 0x00;
const SOCKS4_GRANTED: u8 = 0x5a;
const SOCKS5_NO_AUTH: u8 = 0x00;
const SOCKS5_SUCCEEDED: u8 = 0x00;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Longest status line we are willing to buffer
const MAX_STATUS_LINE: usize = 1024;

/// Host part of a reachability target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetHost {
    Ip(Ipv4Addr),
    Domain(String),
}

/// Plain-HTTP URL requested through a SOCKS candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: TargetHost,
    pub port: u16,
    pub path: String,
    host_header: String,
}

impl ProbeTarget {
    /// Parse an `http://host[:port]/path` URL
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::InvalidTarget(format!("{url}: {e}")))?;
        if parsed.scheme() != "http" {
            return Err(Error::InvalidTarget(format!(
                "{url}: only http:// targets can be fetched through SOCKS"
            )));
        }

        let host_str = parsed
            .host_str()
            .ok_or_else(|| Error::InvalidTarget(format!("{url}: missing host")))?;
        let port = parsed.port_or_known_default().unwrap_or(80);
        let host = match host_str.parse::<Ipv4Addr>() {
            Ok(ip) => TargetHost::Ip(ip),
            Err(_) if host_str.len() <= u8::MAX as usize => TargetHost::Domain(host_str.to_string()),
            Err(_) => return Err(Error::InvalidTarget(format!("{url}: host name too long"))),
        };

        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        let host_header = match parsed.port() {
            Some(port) => format!("{host_str}:{port}"),
            None => host_str.to_string(),
        };

        Ok(Self {
            host,
            port,
            path,
            host_header,
        })
    }
}

/// SOCKS4 CONNECT (4a when the target is a domain name)
pub async fn socks4_connect<S>(stream: &mut S, target: &ProbeTarget) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = vec![SOCKS4_VERSION, CMD_CONNECT];
    request.extend_from_slice(&target.port.to_be_bytes());
    match &target.host {
        TargetHost::Ip(ip) => {
            request.extend_from_slice(&ip.octets());
            request.push(0x00); // empty user id
        }
        TargetHost::Domain(name) => {
            request.extend_from_slice(&[0, 0, 0, 1]);
            request.push(0x00);
            request.extend_from_slice(name.as_bytes());
            request.push(0x00);
        }
    }
    stream.write_all(&request).await?;

    let mut reply = [0u8; 8];
    stream.read_exact(&mut reply).await?;
    if reply[0] != SOCKS4_REPLY_VERSION {
        return Err(Error::SocksProtocol(format!(
            "unexpected reply version {:#04x}",
            reply[0]
        )));
    }

    match reply[1] {
        SOCKS4_GRANTED => Ok(()),
        code => Err(Error::SocksRejected(code)),
    }
}

/// SOCKS5 no-auth CONNECT
pub async fn socks5_connect<S>(stream: &mut S, target: &ProbeTarget) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(&[SOCKS5_VERSION, 0x01, SOCKS5_NO_AUTH])
        .await?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice[0] != SOCKS5_VERSION {
        return Err(Error::SocksProtocol(format!(
            "unexpected version {:#04x}",
            choice[0]
        )));
    }
    if choice[1] != SOCKS5_NO_AUTH {
        return Err(Error::SocksProtocol(format!(
            "server requires auth method {:#04x}",
            choice[1]
        )));
    }

    let mut request = vec![SOCKS5_VERSION, CMD_CONNECT, 0x00];
    match &target.host {
        TargetHost::Ip(ip) => {
            request.push(ATYP_IPV4);
            request.extend_from_slice(&ip.octets());
        }
        TargetHost::Domain(name) => {
            request.push(ATYP_DOMAIN);
            request.push(name.len() as u8);
            request.extend_from_slice(name.as_bytes());
        }
    }
    request.extend_from_slice(&target.port.to_be_bytes());
    stream.write_all(&request).await?;

    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await?;
    if head[0] != SOCKS5_VERSION {
        return Err(Error::SocksProtocol(format!(
            "unexpected version {:#04x}",
            head[0]
        )));
    }
    if head[1] != SOCKS5_SUCCEEDED {
        return Err(Error::SocksRejected(head[1]));
    }

    // BND.ADDR + BND.PORT
    let remaining = match head[3] {
        ATYP_IPV4 => 4 + 2,
        ATYP_IPV6 => 16 + 2,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            len[0] as usize + 2
        }
        other => {
            return Err(Error::SocksProtocol(format!(
                "unknown address type {:#04x}",
                other
            )))
        }
    };
    let mut bound = vec![0u8; remaining];
    stream.read_exact(&mut bound).await?;

    Ok(())
}

/// Send one `GET` for `target` over an established tunnel and return the status code
pub async fn http_get<S>(stream: &mut S, target: &ProbeTarget) -> Result<u16>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: proxy-sieve\r\nAccept: */*\r\nConnection: close\r\n\r\n",
        target.path, target.host_header
    );
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;
    read_status(stream).await
}

/// Read an HTTP status line and return its code
pub async fn read_status<S>(stream: &mut S) -> Result<u16>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(128);
    let mut chunk = [0u8; 256];

    let line_end = loop {
        if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
            break pos;
        }
        if buf.len() > MAX_STATUS_LINE {
            return Err(Error::HttpResponse("status line too long".to_string()));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::HttpResponse(
                "connection closed before status line".to_string(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let line = String::from_utf8_lossy(&buf[..line_end]);
    parse_status_line(&line)
}

fn parse_status_line(line: &str) -> Result<u16> {
    let mut parts = line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(Error::HttpResponse(format!("not an HTTP response: {line}")));
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..=599).contains(code))
        .ok_or_else(|| Error::HttpResponse(format!("bad status line: {line}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn test_parse_ip_target() {
        let target = ProbeTarget::parse("http://1.1.1.1/").unwrap();
        assert_eq!(target.host, TargetHost::Ip(Ipv4Addr::new(1, 1, 1, 1)));
        assert_eq!(target.port, 80);
        assert_eq!(target.path, "/");
        assert_eq!(target.host_header, "1.1.1.1");
    }

    #[test]
    fn test_parse_domain_target_with_port_and_query() {
        let target = ProbeTarget::parse("http://example.com:8080/ip?format=text").unwrap();
        assert_eq!(target.host, TargetHost::Domain("example.com".to_string()));
        assert_eq!(target.port, 8080);
        assert_eq!(target.path, "/ip?format=text");
        assert_eq!(target.host_header, "example.com:8080");
    }

    #[test]
    fn test_reject_non_http_target() {
        assert!(ProbeTarget::parse("https://example.com/").is_err());
        assert!(ProbeTarget::parse("not a url").is_err());
    }

    #[test]
    fn test_parse_status_line() {
        assert_eq!(parse_status_line("HTTP/1.1 200 OK").unwrap(), 200);
        assert_eq!(parse_status_line("HTTP/1.0 404 Not Found").unwrap(), 404);
        assert!(parse_status_line("SSH-2.0-OpenSSH").is_err());
        assert!(parse_status_line("HTTP/1.1 abc").is_err());
        assert!(parse_status_line("HTTP/1.1 999 Weird").is_err());
    }

    #[tokio::test]
    async fn test_socks4_handshake_granted() {
        let (mut client, mut server) = duplex(256);
        let target = ProbeTarget::parse("http://1.2.3.4:8080/").unwrap();

        let server_task = tokio::spawn(async move {
            let mut request = [0u8; 9];
            server.read_exact(&mut request).await.unwrap();
            server
                .write_all(&[0x00, SOCKS4_GRANTED, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
            request
        });

        socks4_connect(&mut client, &target).await.unwrap();
        let request = server_task.await.unwrap();
        assert_eq!(request, [0x04, 0x01, 0x1f, 0x90, 1, 2, 3, 4, 0x00]);
    }

    #[tokio::test]
    async fn test_socks4a_sends_domain() {
        let (mut client, mut server) = duplex(256);
        let target = ProbeTarget::parse("http://example.com/").unwrap();

        let server_task = tokio::spawn(async move {
            let mut request = vec![0u8; 9 + "example.com".len() + 1];
            server.read_exact(&mut request).await.unwrap();
            server
                .write_all(&[0x00, SOCKS4_GRANTED, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
            request
        });

        socks4_connect(&mut client, &target).await.unwrap();
        let request = server_task.await.unwrap();
        assert_eq!(&request[4..8], &[0, 0, 0, 1]);
        assert_eq!(&request[9..20], b"example.com");
        assert_eq!(request[20], 0x00);
    }

    #[tokio::test]
    async fn test_socks4_rejected() {
        let (mut client, mut server) = duplex(256);
        let target = ProbeTarget::parse("http://1.2.3.4/").unwrap();

        tokio::spawn(async move {
            let mut request = [0u8; 9];
            server.read_exact(&mut request).await.unwrap();
            server
                .write_all(&[0x00, 0x5b, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let err = socks4_connect(&mut client, &target).await.unwrap_err();
        assert!(matches!(err, Error::SocksRejected(0x5b)));
    }

    #[tokio::test]
    async fn test_socks4_reply_with_wrong_version() {
        let (mut client, mut server) = duplex(256);
        let target = ProbeTarget::parse("http://1.2.3.4/").unwrap();

        // Grant code in the right place, but the peer is not speaking SOCKS4
        tokio::spawn(async move {
            let mut request = [0u8; 9];
            server.read_exact(&mut request).await.unwrap();
            server
                .write_all(&[0x48, SOCKS4_GRANTED, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let err = socks4_connect(&mut client, &target).await.unwrap_err();
        assert!(matches!(err, Error::SocksProtocol(_)));
    }

    #[tokio::test]
    async fn test_socks5_handshake() {
        let (mut client, mut server) = duplex(256);
        let target = ProbeTarget::parse("http://1.2.3.4/").unwrap();

        let server_task = tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            server.read_exact(&mut greeting).await.unwrap();
            server.write_all(&[0x05, 0x00]).await.unwrap();

            let mut request = [0u8; 10];
            server.read_exact(&mut request).await.unwrap();
            server
                .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
            (greeting, request)
        });

        socks5_connect(&mut client, &target).await.unwrap();
        let (greeting, request) = server_task.await.unwrap();
        assert_eq!(greeting, [0x05, 0x01, 0x00]);
        assert_eq!(request, [0x05, 0x01, 0x00, 0x01, 1, 2, 3, 4, 0x00, 0x50]);
    }

    #[tokio::test]
    async fn test_socks5_auth_required() {
        let (mut client, mut server) = duplex(256);
        let target = ProbeTarget::parse("http://1.2.3.4/").unwrap();

        tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            server.read_exact(&mut greeting).await.unwrap();
            server.write_all(&[0x05, 0xff]).await.unwrap();
        });

        let err = socks5_connect(&mut client, &target).await.unwrap_err();
        assert!(matches!(err, Error::SocksProtocol(_)));
    }

    #[tokio::test]
    async fn test_socks5_connect_refused() {
        let (mut client, mut server) = duplex(256);
        let target = ProbeTarget::parse("http://1.2.3.4/").unwrap();

        tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            server.read_exact(&mut greeting).await.unwrap();
            server.write_all(&[0x05, 0x00]).await.unwrap();
            let mut request = [0u8; 10];
            server.read_exact(&mut request).await.unwrap();
            server
                .write_all(&[0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let err = socks5_connect(&mut client, &target).await.unwrap_err();
        assert!(matches!(err, Error::SocksRejected(0x05)));
    }

    #[tokio::test]
    async fn test_http_get_reads_status() {
        let (mut client, mut server) = duplex(1024);
        let target = ProbeTarget::parse("http://example.com/").unwrap();

        let server_task = tokio::spawn(async move {
            let mut buf = vec![0u8; 512];
            let n = server.read(&mut buf).await.unwrap();
            server
                .write_all(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        let status = http_get(&mut client, &target).await.unwrap();
        assert_eq!(status, 204);
        let request = server_task.await.unwrap();
        assert!(request.starts_with("GET / HTTP/1.1\r\n"));
        assert!(request.contains("Host: example.com\r\n"));
    }

    #[tokio::test]
    async fn test_read_status_split_across_reads() {
        let (mut client, mut server) = duplex(64);

        tokio::spawn(async move {
            server.write_all(b"HTTP/1.").await.unwrap();
            server.flush().await.unwrap();
            server.write_all(b"0 200 OK\r\n\r\n").await.unwrap();
        });

        assert_eq!(read_status(&mut client).await.unwrap(), 200);
    }

    #[tokio::test]
    async fn test_read_status_eof() {
        let (mut client, server) = duplex(64);
        drop(server);
        assert!(read_status(&mut client).await.is_err());
    }
}
