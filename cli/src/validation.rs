//! Input validation for raw flag values

use anyhow::{anyhow, bail, Result};
use http::Method;

/// Split colon-separated basic-auth credentials.
///
/// Empty user or password are allowed per RFC 7617; a missing separator is
/// a fatal setup error.
pub fn parse_basic_auth(raw: &str) -> Result<(String, String)> {
    let (user, pass) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("basic auth missing ':' separator"))?;
    Ok((user.to_string(), pass.to_string()))
}

/// Parse and normalise the HTTP verb, rejecting anything outside the
/// standard set.
pub fn parse_method(raw: &str) -> Result<Method> {
    let method = Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|e| anyhow!("invalid method '{raw}': {e}"))?;
    if !is_standard(&method) {
        bail!("unsupported method '{raw}'");
    }
    Ok(method)
}

fn is_standard(method: &Method) -> bool {
    [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::HEAD,
        Method::OPTIONS,
        Method::TRACE,
        Method::CONNECT,
    ]
    .contains(method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_splits_on_first_colon() {
        let (user, pass) = parse_basic_auth("user:pa:ss").unwrap();
        assert_eq!(user, "user");
        assert_eq!(pass, "pa:ss");
    }

    #[test]
    fn basic_auth_allows_empty_credentials() {
        let (user, pass) = parse_basic_auth(":").unwrap();
        assert!(user.is_empty());
        assert!(pass.is_empty());
    }

    #[test]
    fn basic_auth_requires_separator() {
        assert!(parse_basic_auth("userpass").is_err());
    }

    #[test]
    fn methods_are_uppercased() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method("Post").unwrap(), Method::POST);
    }

    #[test]
    fn nonstandard_methods_are_rejected() {
        assert!(parse_method("BREW").is_err());
        assert!(parse_method("").is_err());
    }
}
