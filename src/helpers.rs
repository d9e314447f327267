//! Helper functions.

use core::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use url::{Host, Url};

/// Extract the IP address from the given `url`.
pub(crate) fn url_ip_addr(url: &str) -> Option<IpAddr> {
    match Url::parse(url) {
        Ok(parsed_url) => match parsed_url.host() {
            Some(host) => match host {
                Host::Ipv4(ipv4) => Some(IpAddr::V4(ipv4)),
                Host::Ipv6(ipv6) => Some(IpAddr::V6(ipv6)),
                _ => None,
            },
            None => None,
        },
        Err(_) => None,
    }
}

/// Extract the host name or address (without port) from the given `url`.
pub(crate) fn url_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed_url| parsed_url.host_str().map(|host| host.to_string()))
}

/// Build the URL of a Sony REST endpoint on `host` (which may carry a port).
pub(crate) fn device_endpoint(host: &str, path: &str) -> String {
    format!("http://{}/sony/{}", host, path.trim_start_matches('/'))
}

/// Current unix time in seconds.
pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

// ================================================================================================
// Tests

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::{device_endpoint, url_host, url_ip_addr};

    #[test]
    fn ip_addr_from_url() {
        assert_eq!(
            url_ip_addr("http://192.168.1.50:8080/"),
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)))
        );
        assert!(url_ip_addr("http://[fd12:3456:789a:1::1]/").is_some());
        assert_eq!(url_ip_addr("http://tv.local/"), None);
        assert_eq!(url_ip_addr("not a url"), None);
    }

    #[test]
    fn host_from_url() {
        assert_eq!(
            url_host("http://192.168.1.50:52323/dmr.xml"),
            Some("192.168.1.50".to_string())
        );
        assert_eq!(url_host("garbage"), None);
    }

    #[test]
    fn endpoint_url() {
        assert_eq!(
            device_endpoint("192.168.1.50", "system"),
            "http://192.168.1.50/sony/system"
        );
        assert_eq!(
            device_endpoint("127.0.0.1:8080", "/IRCC"),
            "http://127.0.0.1:8080/sony/IRCC"
        );
    }
}
