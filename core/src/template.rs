//! Prepared request template
//!
//! The template is built once from the config and cloned (by `Arc`) for
//! every attempt. All header assembly — user headers, basic auth, the
//! user-agent suffix — happens here so the hot path only stamps a context
//! onto an already-complete request.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION, HOST, USER_AGENT};
use http::{HeaderMap, Method};
use url::Url;

use crate::config::Config;
use crate::error::Error;

/// Immutable request prototype shared by all workers.
#[derive(Debug)]
pub struct RequestTemplate {
    method: Method,
    url: Url,
    headers: HeaderMap,
    host: String,
    head_bytes: u64,
}

impl RequestTemplate {
    /// Build the template from a validated config.
    ///
    /// Header precedence: user headers first, then the basic-auth
    /// `Authorization` and the `User-Agent` (both overwrite any user-supplied
    /// value for the same name). The `Host` value is kept separate from the
    /// header map because HTTP/2 carries it as the `:authority`
    /// pseudo-header instead.
    pub fn from_config(cfg: &Config) -> Result<Self, Error> {
        let host_str = cfg
            .endpoint
            .host_str()
            .ok_or_else(|| Error::Template("endpoint has no host".into()))?;

        let host = match (&cfg.host_override, cfg.endpoint.port()) {
            (Some(custom), _) => custom.clone(),
            (None, Some(port)) => format!("{host_str}:{port}"),
            (None, None) => host_str.to_string(),
        };

        let mut headers = cfg.headers.clone();

        if let Some((user, pass)) = &cfg.basic_auth {
            let encoded = BASE64.encode(format!("{user}:{pass}"));
            let value = HeaderValue::from_str(&format!("Basic {encoded}"))
                .map_err(|e| Error::Template(format!("basic auth: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let agent = HeaderValue::from_str(&cfg.user_agent)
            .map_err(|e| Error::Template(format!("user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);

        let mut template = Self {
            method: cfg.method.clone(),
            url: cfg.endpoint.clone(),
            headers,
            host,
            head_bytes: 0,
        };
        template.head_bytes = template.estimate_head_bytes();
        Ok(template)
    }

    /// HTTP verb of the prepared request.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Prepared headers (excluding `Host`).
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value for the `Host` header / `:authority`.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Request path plus query string, origin form.
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    /// Serialized size of the request head, recorded as `bytes_sent`.
    pub fn head_bytes(&self) -> u64 {
        self.head_bytes
    }

    /// Approximate the wire size of the request line and headers.
    fn estimate_head_bytes(&self) -> u64 {
        // "<METHOD> <path> HTTP/1.1\r\n" plus "name: value\r\n" per header,
        // the Host line, and the terminating blank line.
        let mut bytes = self.method.as_str().len() as u64 + self.path_and_query().len() as u64 + 12;
        bytes += HOST.as_str().len() as u64 + self.host.len() as u64 + 4;
        for (name, value) in &self.headers {
            bytes += name.as_str().len() as u64 + value.as_bytes().len() as u64 + 4;
        }
        bytes + 2
    }
}

/// Parse a user-supplied header into a typed name/value pair.
///
/// Returns `None` for anything that cannot become a header: no `:`
/// separator, empty name or value, or invalid characters. Callers drop such
/// entries.
pub fn parse_header(raw: &str) -> Option<(HeaderName, HeaderValue)> {
    let (name, value) = raw.split_once(':')?;
    let name = name.trim();
    let value = value.trim();
    if name.is_empty() || value.is_empty() {
        return None;
    }
    let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
    let value = HeaderValue::from_str(value).ok()?;
    Some((name, value))
}
