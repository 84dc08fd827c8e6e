//! Backend URL validation.
//!
//! The GraphRAG base URL is operator-configured, but it is still fetched
//! server-side on behalf of browser requests, so it gets the same SSRF
//! treatment as any outbound URL: http/https only, a real host, and no
//! private/loopback/link-local addresses unless explicitly allowed for
//! local development.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};
use url::Url;

#[derive(Debug, Clone)]
pub enum UrlGuardError {
    /// URL is malformed or cannot be parsed
    InvalidUrl(String),
    /// URL uses a scheme other than http/https
    UnsupportedScheme(String),
    /// URL has no host component
    MissingHost,
    /// Resolved IP is a private/internal address
    PrivateAddress(String),
    /// DNS resolution failed
    DnsResolutionFailed(String),
}

impl std::fmt::Display for UrlGuardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlGuardError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            UrlGuardError::UnsupportedScheme(scheme) => {
                write!(f, "Unsupported scheme: {}", scheme)
            }
            UrlGuardError::MissingHost => write!(f, "URL has no host"),
            UrlGuardError::PrivateAddress(ip) => {
                write!(f, "Backend resolves to a private address: {}", ip)
            }
            UrlGuardError::DnsResolutionFailed(msg) => {
                write!(f, "DNS resolution failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for UrlGuardError {}

/// Check if an IPv4 address is internal/private
fn is_internal_ipv4(ip: &Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        // Documentation ranges (192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24)
        || (ip.octets()[0] == 192 && ip.octets()[1] == 0 && ip.octets()[2] == 2)
        || (ip.octets()[0] == 198 && ip.octets()[1] == 51 && ip.octets()[2] == 100)
        || (ip.octets()[0] == 203 && ip.octets()[1] == 0 && ip.octets()[2] == 113)
        // Shared address space (100.64.0.0/10)
        || (ip.octets()[0] == 100 && (ip.octets()[1] & 0xC0) == 64)
        // Benchmarking (198.18.0.0/15)
        || (ip.octets()[0] == 198 && (ip.octets()[1] == 18 || ip.octets()[1] == 19))
}

/// Check if an IPv6 address is internal/private
fn is_internal_ipv6(ip: &Ipv6Addr) -> bool {
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.to_ipv4_mapped().map(|v4| is_internal_ipv4(&v4)).unwrap_or(false)
        // Unique local addresses (fc00::/7)
        || (ip.segments()[0] & 0xFE00) == 0xFC00
        // Link-local (fe80::/10)
        || (ip.segments()[0] & 0xFFC0) == 0xFE80
}

fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_ipv4(v4),
        IpAddr::V6(v6) => is_internal_ipv6(v6),
    }
}

/// Validate the configured GraphRAG base URL.
///
/// With `allow_private` set (local development against a backend on
/// localhost), scheme and host are still required but the address-range
/// check is skipped.
pub fn validate_backend_url(url_str: &str, allow_private: bool) -> Result<Url, UrlGuardError> {
    let url = Url::parse(url_str).map_err(|e| UrlGuardError::InvalidUrl(e.to_string()))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(UrlGuardError::UnsupportedScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlGuardError::MissingHost)?;

    if allow_private {
        return Ok(url);
    }

    let port = url
        .port()
        .unwrap_or(if url.scheme() == "https" { 443 } else { 80 });
    let socket_addr = format!("{}:{}", host, port);

    match socket_addr.to_socket_addrs() {
        Ok(addrs) => {
            for addr in addrs {
                if is_internal_ip(&addr.ip()) {
                    return Err(UrlGuardError::PrivateAddress(addr.ip().to_string()));
                }
            }
        }
        Err(e) => {
            return Err(UrlGuardError::DnsResolutionFailed(e.to_string()));
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_ips() {
        assert!(is_internal_ipv4(&Ipv4Addr::new(127, 0, 0, 1)));
        assert!(is_internal_ipv4(&Ipv4Addr::new(10, 0, 0, 1)));
        assert!(is_internal_ipv4(&Ipv4Addr::new(192, 168, 1, 1)));
        assert!(is_internal_ipv4(&Ipv4Addr::new(172, 16, 0, 1)));
        assert!(is_internal_ipv4(&Ipv4Addr::new(169, 254, 1, 1)));
        assert!(!is_internal_ipv4(&Ipv4Addr::new(8, 8, 8, 8)));

        assert!(is_internal_ipv6(&Ipv6Addr::LOCALHOST));
        assert!(is_internal_ipv6(&Ipv6Addr::UNSPECIFIED));
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        let result = validate_backend_url("ftp://example.org/graphrag", false);
        assert!(matches!(result, Err(UrlGuardError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_rejects_private_addresses_by_default() {
        let result = validate_backend_url("http://127.0.0.1:5000", false);
        assert!(matches!(result, Err(UrlGuardError::PrivateAddress(_))));

        let result = validate_backend_url("http://10.1.2.3", false);
        assert!(matches!(result, Err(UrlGuardError::PrivateAddress(_))));
    }

    #[test]
    fn test_allows_private_addresses_when_opted_in() {
        assert!(validate_backend_url("http://127.0.0.1:5000", true).is_ok());
        assert!(validate_backend_url("http://localhost:5000", true).is_ok());
    }

    #[test]
    fn test_accepts_public_addresses() {
        assert!(validate_backend_url("https://8.8.8.8/api", false).is_ok());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(
            validate_backend_url("not a url", false),
            Err(UrlGuardError::InvalidUrl(_))
        ));
        // The url crate already refuses host-less http(s) URLs at parse time.
        assert!(validate_backend_url("https:///path-only", false).is_err());
    }
}
