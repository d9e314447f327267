use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use surge_ping::{Client, Config, PingIdentifier, ICMP};

use crate::helpers::url_ip_addr;

/// Checks whether a host answers on the network.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, host: &str, timeout: Duration) -> bool;
}

/// ICMP echo [`Pinger`] using `surge-ping`.
///
/// Raw ICMP sockets may not be available (e.g. missing privileges). In that case every host is
/// reported as reachable and the TV's own answers decide its state.
pub struct IcmpPinger {
    client_v4: Option<Client>,
    client_v6: Option<Client>,
}

impl Default for IcmpPinger {
    fn default() -> Self {
        Self::new()
    }
}

impl IcmpPinger {
    pub fn new() -> Self {
        let client_v4 = Client::new(&Config::default())
            .map_err(|e| warn!("Could not create IPv4 ping client; ping checks are unavailable: {:?}", e))
            .ok();

        let client_v6 = Client::new(&Config::builder().kind(ICMP::V6).build())
            .map_err(|e| debug!("Could not create IPv6 ping client: {:?}", e))
            .ok();

        IcmpPinger {
            client_v4,
            client_v6,
        }
    }
}

#[async_trait]
impl Pinger for IcmpPinger {
    async fn ping(&self, host: &str, timeout: Duration) -> bool {
        let Some(ip) = url_ip_addr(&format!("http://{}/", host)) else {
            warn!("Cannot ping '{}': not an IP address", host);
            return true;
        };

        let client = match ip {
            IpAddr::V4(_) => self.client_v4.as_ref(),
            IpAddr::V6(_) => self.client_v6.as_ref(),
        };

        let Some(client) = client else {
            return true;
        };

        let mut pinger = client.pinger(ip, PingIdentifier::from(1)).await;
        pinger.timeout(timeout);

        match pinger.ping(1.into(), &[0; 8]).await {
            Ok((_, rtt)) => {
                debug!("Ping reply from {} in {:?}", ip, rtt);
                true
            }
            Err(e) => {
                debug!("No ping reply from {}: {:?}", ip, e);
                false
            }
        }
    }
}

/// Ping `host` up to `attempts` times, stopping at the first reply. When `keep_trying` is `false`
/// (the TV was not on the network last time) only one ping is sent.
pub(crate) async fn probe_reachability(
    pinger: &dyn Pinger,
    host: &str,
    attempts: u32,
    timeout: Duration,
    keep_trying: bool,
) -> bool {
    for attempt in 1..=attempts.max(1) {
        if pinger.ping(host, timeout).await {
            return true;
        }

        if !keep_trying {
            break;
        }

        debug!("Ping attempt {} of {} to {} failed", attempt, attempts, host);
    }

    false
}

// ================================================================================================
// Tests
