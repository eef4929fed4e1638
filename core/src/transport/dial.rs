//! Connection establishment
//!
//! Dialing is explicit — resolve, connect, optionally tunnel and handshake
//! TLS, then hand the stream to hyper — so every phase boundary lands in
//! the attempt's `TraceState` as it happens.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Empty;
use hyper::client::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use url::Url;

use crate::config::Config;
use crate::error::{AttemptError, Error};
use crate::trace::TraceState;

use super::pool::{Origin, ProtocolSender};
use super::tls;

const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Establishes new connections for the pool.
pub(crate) struct Dialer {
    tls: TlsConnector,
    proxies: ProxySelector,
}

impl Dialer {
    pub(crate) fn new(cfg: &Config) -> Result<Self, Error> {
        let tls_config = tls::client_config(cfg.insecure_tls, cfg.http2)?;
        Ok(Self {
            tls: TlsConnector::from(Arc::new(tls_config)),
            proxies: ProxySelector::from_env(),
        })
    }

    /// Whether requests to this origin go through a plain-http proxy and
    /// must therefore use absolute-form URIs.
    pub(crate) fn http_proxied(&self, origin: &Origin) -> bool {
        !origin.https && self.proxies.proxy_for(origin).is_some()
    }

    /// Dial the origin, stamping dns/connect/tls spans into `trace`.
    pub(crate) async fn dial(
        &self,
        origin: &Origin,
        trace: &mut TraceState,
    ) -> Result<ProtocolSender, AttemptError> {
        let proxy = self.proxies.proxy_for(origin);
        let (host, port) = match proxy {
            Some(proxy) => (proxy.host.as_str(), proxy.port),
            None => (origin.host.as_str(), origin.port),
        };

        let addr = resolve(host, port, trace).await?;

        trace.connect_start();
        let connected = TcpStream::connect(addr).await;
        trace.connect_done();
        let stream = connected.map_err(|e| AttemptError::Connect(e.to_string()))?;
        let _ = stream.set_nodelay(true);

        if !origin.https {
            return handshake_http1(stream).await;
        }

        let mut stream = stream;
        if proxy.is_some() {
            tunnel(&mut stream, origin).await?;
        }

        let server_name = ServerName::try_from(origin.host.clone())
            .map_err(|e| AttemptError::Tls(e.to_string()))?;
        trace.tls_start();
        let handshake = timeout(TLS_HANDSHAKE_TIMEOUT, self.tls.connect(server_name, stream)).await;
        trace.tls_done();
        let tls_stream = handshake
            .map_err(|_| AttemptError::Tls("handshake timed out".into()))?
            .map_err(|e| AttemptError::Tls(e.to_string()))?;

        let negotiated_h2 = tls_stream.get_ref().1.alpn_protocol() == Some(b"h2".as_slice());
        if negotiated_h2 {
            handshake_http2(tls_stream).await
        } else {
            handshake_http1(tls_stream).await
        }
    }
}

/// Resolve `host:port`, skipping the DNS phase for IP literals.
async fn resolve(host: &str, port: u16, trace: &mut TraceState) -> Result<SocketAddr, AttemptError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    trace.dns_start();
    let resolved = lookup_host((host, port)).await;
    trace.dns_done();
    resolved
        .map_err(|e| AttemptError::Dns(e.to_string()))?
        .next()
        .ok_or_else(|| AttemptError::Dns(format!("no addresses for {host}")))
}

async fn handshake_http1<S>(io: S) -> Result<ProtocolSender, AttemptError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sender, conn): (http1::SendRequest<Empty<Bytes>>, _) =
        http1::handshake(TokioIo::new(io))
            .await
            .map_err(|e| AttemptError::Connect(e.to_string()))?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "http1 connection ended");
        }
    });
    Ok(ProtocolSender::Http1(sender))
}

async fn handshake_http2<S>(io: S) -> Result<ProtocolSender, AttemptError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sender, conn): (http2::SendRequest<Empty<Bytes>>, _) =
        http2::handshake(TokioExecutor::new(), TokioIo::new(io))
            .await
            .map_err(|e| AttemptError::Connect(e.to_string()))?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "http2 connection ended");
        }
    });
    Ok(ProtocolSender::Http2(sender))
}

/// Open a tunnel through the proxy with an HTTP CONNECT exchange.
async fn tunnel(stream: &mut TcpStream, origin: &Origin) -> Result<(), AttemptError> {
    let authority = origin.authority();
    let request = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| AttemptError::Connect(e.to_string()))?;

    let mut response = Vec::with_capacity(256);
    let mut buf = [0u8; 1024];
    loop {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| AttemptError::Connect(e.to_string()))?;
        if n == 0 {
            return Err(AttemptError::Connect("proxy closed during CONNECT".into()));
        }
        response.extend_from_slice(&buf[..n]);
        if response.windows(4).any(|window| window == b"\r\n\r\n") {
            break;
        }
        if response.len() > 8192 {
            return Err(AttemptError::Connect("oversized CONNECT response".into()));
        }
    }

    let accepted =
        response.starts_with(b"HTTP/1.") && response.get(9..12) == Some(b"200".as_slice());
    if accepted {
        Ok(())
    } else {
        let head = String::from_utf8_lossy(&response);
        Err(AttemptError::Connect(format!(
            "proxy refused CONNECT: {}",
            head.lines().next().unwrap_or_default()
        )))
    }
}

/// Proxy targets resolved from the standard environment variables.
#[derive(Debug, Default)]
struct ProxySelector {
    http: Option<ProxyAddr>,
    https: Option<ProxyAddr>,
    no_proxy: Vec<String>,
}

#[derive(Debug, Clone)]
struct ProxyAddr {
    host: String,
    port: u16,
}

impl ProxySelector {
    fn from_env() -> Self {
        let no_proxy = std::env::var("NO_PROXY")
            .or_else(|_| std::env::var("no_proxy"))
            .map(|value| {
                value
                    .split(',')
                    .map(|entry| entry.trim().to_string())
                    .filter(|entry| !entry.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            http: proxy_from_env(&["HTTP_PROXY", "http_proxy"]),
            https: proxy_from_env(&["HTTPS_PROXY", "https_proxy"]),
            no_proxy,
        }
    }

    fn proxy_for(&self, origin: &Origin) -> Option<&ProxyAddr> {
        if self.excluded(&origin.host) {
            return None;
        }
        if origin.https {
            self.https.as_ref()
        } else {
            self.http.as_ref()
        }
    }

    fn excluded(&self, host: &str) -> bool {
        self.no_proxy.iter().any(|entry| {
            entry == "*" || host == entry || host.ends_with(&format!(".{entry}"))
        })
    }
}

fn proxy_from_env(names: &[&str]) -> Option<ProxyAddr> {
    for name in names {
        let Ok(value) = std::env::var(name) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        if let Ok(url) = Url::parse(&value) {
            if let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) {
                return Some(ProxyAddr {
                    host: host.to_string(),
                    port,
                });
            }
        }
    }
    None
}
