//! Pooled HTTP client

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderValue, HOST, LOCATION};
use http::{Request, Uri};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use url::Url;

use crate::config::Config;
use crate::error::{AttemptError, Error};
use crate::template::RequestTemplate;
use crate::trace::TraceState;

use super::dial::Dialer;
use super::pool::{Conn, Origin, Pool};
use super::{BodyError, Exchange, ResponseBody, Transport};

const MAX_REDIRECTS: usize = 10;

/// Connection-pooled HTTP(S) transport.
///
/// Shared by every worker; the pool is internally synchronised. Each
/// attempt checks a connection out (stamping the acquisition span and reuse
/// flag), dispatches the prepared request, and hands the un-drained body
/// back to the caller. Draining to a clean end returns the connection to
/// the pool; any failure drops it.
pub struct HttpClient {
    pool: Arc<Pool>,
    dialer: Dialer,
    follow_redirects: bool,
}

impl HttpClient {
    /// Build the client from the run configuration.
    ///
    /// Fails fast on TLS setup problems so a broken environment surfaces
    /// before any attempt is admitted.
    pub fn new(cfg: &Config) -> Result<Self, Error> {
        Ok(Self {
            pool: Arc::new(Pool::new(cfg.max_connections)),
            dialer: Dialer::new(cfg)?,
            follow_redirects: cfg.follow_redirects,
        })
    }

    /// Acquire a connection for the origin, dialing when the pool misses.
    async fn acquire(
        &self,
        origin: &Origin,
        trace: &mut TraceState,
    ) -> Result<Conn, AttemptError> {
        trace.get_conn();
        if let Some(conn) = self.pool.checkout(origin) {
            trace.got_conn(true);
            return Ok(conn);
        }
        let permit = self.pool.reserve().await;
        let sender = self.dialer.dial(origin, trace).await?;
        trace.got_conn(false);
        Ok(Conn::new(sender, permit))
    }

    fn build_request(
        &self,
        template: &RequestTemplate,
        url: &Url,
        hop: usize,
        proxied: bool,
        h2: bool,
    ) -> Result<Request<Empty<Bytes>>, AttemptError> {
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        // The first hop carries the prepared Host (which may be an
        // override); redirect hops derive it from the target URL.
        let host_value = if hop == 0 {
            template.host().to_string()
        } else {
            match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{host}:{port}"),
                (Some(host), None) => host.to_string(),
                (None, _) => {
                    return Err(AttemptError::Http("redirect target has no host".into()));
                }
            }
        };

        let uri: Uri = if h2 {
            Uri::builder()
                .scheme(url.scheme())
                .authority(host_value.clone())
                .path_and_query(path)
                .build()
                .map_err(|e| AttemptError::Http(e.to_string()))?
        } else if proxied {
            url.as_str()
                .parse()
                .map_err(|e| AttemptError::Http(format!("proxy uri: {e}")))?
        } else {
            path.parse()
                .map_err(|e| AttemptError::Http(format!("request path: {e}")))?
        };

        let mut request = Request::builder()
            .method(template.method().clone())
            .uri(uri)
            .body(Empty::new())
            .map_err(|e| AttemptError::Http(e.to_string()))?;

        *request.headers_mut() = template.headers().clone();
        if !h2 {
            let value = HeaderValue::from_str(&host_value)
                .map_err(|e| AttemptError::Http(format!("host header: {e}")))?;
            request.headers_mut().insert(HOST, value);
        }
        Ok(request)
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn round_trip(
        &self,
        template: &RequestTemplate,
        trace: &mut TraceState,
    ) -> Result<Exchange, AttemptError> {
        let mut url = template.url().clone();
        let mut hop = 0usize;

        loop {
            let origin = Origin::of(&url)?;
            let mut conn = self.acquire(&origin, trace).await?;

            let proxied = self.dialer.http_proxied(&origin);
            let request =
                self.build_request(template, &url, hop, proxied, conn.sender.is_http2())?;
            let response = conn
                .sender
                .send(request)
                .await
                .map_err(|e| AttemptError::Http(e.to_string()))?;
            let status = response.status().as_u16();

            if self.follow_redirects
                && matches!(status, 301 | 302 | 303 | 307 | 308)
                && hop < MAX_REDIRECTS
            {
                if let Some(next) = redirect_target(&url, response.headers()) {
                    // Discard the intermediate body so the connection can
                    // go back to the pool before the next hop.
                    let body = StreamingBody::new(
                        response.into_body(),
                        conn,
                        origin,
                        Arc::clone(&self.pool),
                    );
                    let _ = body.drain().await;
                    url = next;
                    hop += 1;
                    continue;
                }
            }

            return Ok(Exchange {
                status,
                bytes_sent: template.head_bytes(),
                body: ResponseBody::Streaming(StreamingBody::new(
                    response.into_body(),
                    conn,
                    origin,
                    Arc::clone(&self.pool),
                )),
            });
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("follow_redirects", &self.follow_redirects)
            .finish_non_exhaustive()
    }
}

fn redirect_target(url: &Url, headers: &http::HeaderMap) -> Option<Url> {
    let location = headers.get(LOCATION)?.to_str().ok()?;
    url.join(location).ok()
}

/// Response body streaming off a pooled connection.
pub struct StreamingBody {
    incoming: Incoming,
    conn: Conn,
    origin: Origin,
    pool: Arc<Pool>,
}

impl StreamingBody {
    fn new(incoming: Incoming, conn: Conn, origin: Origin, pool: Arc<Pool>) -> Self {
        Self {
            incoming,
            conn,
            origin,
            pool,
        }
    }

    /// Read the body to its end, counting data bytes.
    ///
    /// A clean end checks the connection back into the pool; a mid-stream
    /// failure drops it and reports the bytes read so far.
    pub async fn drain(self) -> Result<u64, BodyError> {
        let StreamingBody {
            mut incoming,
            conn,
            origin,
            pool,
        } = self;

        let mut read = 0u64;
        loop {
            match incoming.frame().await {
                Some(Ok(frame)) => {
                    if let Some(data) = frame.data_ref() {
                        read += data.len() as u64;
                    }
                }
                Some(Err(e)) => {
                    return Err(BodyError {
                        bytes_read: read,
                        error: AttemptError::Http(e.to_string()),
                    });
                }
                None => break,
            }
        }

        pool.checkin(origin, conn);
        Ok(read)
    }
}

impl std::fmt::Debug for StreamingBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingBody")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> (HttpClient, RequestTemplate, Url) {
        let parsed = Url::parse(url).unwrap();
        let cfg = Config::new(parsed.clone());
        let template = RequestTemplate::from_config(&cfg).unwrap();
        (HttpClient::new(&cfg).unwrap(), template, parsed)
    }

    #[test]
    fn origin_form_request_carries_host_header() {
        let (client, template, url) = client("http://example.com:8080/status/200?x=1");
        let request = client
            .build_request(&template, &url, 0, false, false)
            .unwrap();
        assert_eq!(request.uri().to_string(), "/status/200?x=1");
        assert_eq!(
            request.headers().get(HOST).unwrap(),
            "example.com:8080"
        );
    }

    #[test]
    fn http2_request_uses_absolute_uri_without_host_header() {
        let (client, template, url) = client("https://example.com/load");
        let request = client.build_request(&template, &url, 0, false, true).unwrap();
        assert_eq!(request.uri().scheme_str(), Some("https"));
        assert_eq!(
            request.uri().authority().map(|a| a.as_str()),
            Some("example.com")
        );
        assert!(request.headers().get(HOST).is_none());
    }

    #[test]
    fn proxied_http_request_uses_absolute_form() {
        let (client, template, url) = client("http://example.com/path");
        let request = client.build_request(&template, &url, 0, true, false).unwrap();
        assert_eq!(request.uri().to_string(), "http://example.com/path");
    }

    #[test]
    fn redirect_hop_derives_host_from_target() {
        let (client, template, _) = client("http://example.com/");
        let next = Url::parse("http://other.example:9999/moved").unwrap();
        let request = client
            .build_request(&template, &next, 1, false, false)
            .unwrap();
        assert_eq!(
            request.headers().get(HOST).unwrap(),
            "other.example:9999"
        );
    }

    #[test]
    fn redirect_target_resolves_relative_locations() {
        let base = Url::parse("http://example.com/a/b").unwrap();
        let mut headers = http::HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("/moved"));
        let next = redirect_target(&base, &headers).unwrap();
        assert_eq!(next.as_str(), "http://example.com/moved");
    }
}
