//! Discover Sony TVs on the local network and merge them with the devices the caller has already
//! configured.
//!
//! Two discovery sources are supported:
//!
//! * [`discover_sony_devices`] performs an SSDP search (via `rupnp`) for the Sony ScalarWebAPI
//!   service.
//! * [`records_from_announcements`] adapts SSDP announcements captured by the caller. These are
//!   filtered on their `SERVER` header and their device descriptions are fetched over HTTP.
//!
//! Either source produces [`DeviceRecord`]s, which [`merge_with_configured`] turns into the rows a
//! caller presents for device setup.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::prelude::*;
use log::{debug, error, info, warn};
use rupnp::ssdp::{SearchTarget, URN};
use serde::Deserialize;

use crate::error::DiscoveryError;
use crate::helpers::url_host;

pub(crate) const DISCOVERY_DURATION: Duration = Duration::from_secs(2);
const DESCRIPTOR_FETCH_TIMEOUT: Duration = Duration::from_secs(2);
const SCALAR_WEB_API: URN = URN::service("schemas-sony-com", "ScalarWebAPI", 1);

const DEFAULT_VENDOR_MARKER: &str = "Fedora";
const PLACEHOLDER_MANUFACTURER: &str = "";
const PLACEHOLDER_MODEL: &str = "Model";
const PLACEHOLDER_NAME: &str = "Name";
const OFFLINE_LABEL: &str = "unknown";

// ------------------------------------------------------------------------------------------------
// Records

/// A discovered Sony TV.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceRecord {
    pub host: String,
    pub manufacturer: String,
    pub model_name: String,
    pub friendly_name: String,
}

impl fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) @ {}", self.friendly_name, self.model_name, self.host)
    }
}

/// Caller-side identifier of a configured device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

/// A device the caller has already configured.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConfiguredDeviceRef {
    pub instance_id: InstanceId,
    pub host: String,
}

/// What the caller needs to create a device instance for a discovered TV.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CreateSpec {
    pub host: String,
    /// Where the caller should place the new instance.
    pub location: Vec<String>,
}

/// One row of the merged discovered/configured device list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MergedDeviceRow {
    pub host: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    /// Set when the TV is already configured.
    pub instance_id: Option<InstanceId>,
    /// `None` for configured TVs which were not discovered.
    pub create: Option<CreateSpec>,
}

// ------------------------------------------------------------------------------------------------
// SSDP search

/// Scans the local network for Sony TVs offering the ScalarWebAPI service.
///
/// Devices are de-duplicated by host. No discovered TVs is indicated by an empty return vector.
pub async fn discover_sony_devices(duration: Duration) -> Result<Vec<DeviceRecord>, DiscoveryError> {
    let search_target = SearchTarget::URN(SCALAR_WEB_API);
    let mut seen_hosts: HashSet<String> = HashSet::new();
    let mut records: Vec<DeviceRecord> = Vec::new();

    info!("Performing UPnP discovery for Sony TV devices...");

    match rupnp::discover(&search_target, duration).await {
        Ok(discovered_devices) => {
            pin_utils::pin_mut!(discovered_devices);

            while let Some(device) = discovered_devices
                .try_next()
                .await
                .map_err(|e| DiscoveryError::Network(format!("UPnP discovery error: {}", e)))?
            {
                let Some(host) = url_host(&device.url().to_string()) else {
                    warn!("Ignoring Sony device with unusable URL: {}", device.url());
                    continue;
                };

                if !seen_hosts.insert(host.clone()) {
                    continue;
                }

                let record = DeviceRecord {
                    host,
                    manufacturer: device.manufacturer().to_string(),
                    model_name: device.model_name().to_string(),
                    friendly_name: device.friendly_name().to_string(),
                };

                info!("Sony TV device discovered: {}", &record);

                records.push(record);
            }
        }
        Err(e) => {
            error!("Sony TV UPnP discovery error: {:?}", e);
        }
    }

    info!(
        "Sony TV UPnP discovery found {} TV{}",
        records.len(),
        if records.len() == 1 { "" } else { "s" }
    );

    Ok(records)
}

// ------------------------------------------------------------------------------------------------
// Caller-supplied SSDP announcements

/// Headers of an SSDP announcement received by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SsdpAnnouncement {
    /// `SERVER` header.
    pub server: String,
    /// `LOCATION` header (device description URL).
    pub location: String,
    /// Address the announcement came from.
    pub ipv4: String,
}

/// Which announcements are considered to come from a Sony TV.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DiscoveryFilter {
    /// Case-sensitive substring of the `SERVER` header.
    pub vendor_marker: String,
}

impl Default for DiscoveryFilter {
    fn default() -> Self {
        DiscoveryFilter {
            vendor_marker: DEFAULT_VENDOR_MARKER.to_string(),
        }
    }
}

impl DiscoveryFilter {
    pub fn matches(&self, announcement: &SsdpAnnouncement) -> bool {
        announcement.server.contains(&self.vendor_marker)
    }
}

/// Retrieves UPnP device description documents.
#[async_trait]
pub trait DescriptorFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<String, DiscoveryError>;
}

/// [`DescriptorFetcher`] using plain HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpDescriptorFetcher {
    client: reqwest::Client,
}

impl HttpDescriptorFetcher {
    pub fn new() -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(DESCRIPTOR_FETCH_TIMEOUT)
            .build()
            .map_err(|e| DiscoveryError::Network(format!("Could not create HTTP client: {}", e)))?;

        Ok(HttpDescriptorFetcher { client })
    }
}

#[async_trait]
impl DescriptorFetcher for HttpDescriptorFetcher {
    async fn fetch(&self, location: &str) -> Result<String, DiscoveryError> {
        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| DiscoveryError::Network(format!("{}: {}", location, e)))?;

        response
            .text()
            .await
            .map_err(|e| DiscoveryError::Network(format!("{}: {}", location, e)))
    }
}

#[derive(Debug, Deserialize)]
struct DescriptorRoot {
    device: DeviceDescription,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceDescription {
    #[serde(default)]
    manufacturer: String,
    #[serde(default)]
    model_name: String,
    #[serde(default)]
    friendly_name: String,
}

fn parse_descriptor(xml: &str) -> Result<DeviceDescription, DiscoveryError> {
    let root: DescriptorRoot = quick_xml::de::from_str(xml)
        .map_err(|e| DiscoveryError::Parse(format!("Failed to parse device XML: {}", e)))?;

    Ok(root.device)
}

/// Turn caller-captured announcements into device records.
///
/// Announcements not matching `filter` are skipped. A descriptor which cannot be fetched or parsed
/// yields placeholder labels rather than failing the whole cycle.
pub async fn records_from_announcements(
    announcements: &[SsdpAnnouncement],
    filter: &DiscoveryFilter,
    fetcher: &dyn DescriptorFetcher,
) -> Vec<DeviceRecord> {
    let mut records = Vec::new();

    for announcement in announcements {
        if !filter.matches(announcement) {
            debug!(
                "Ignoring SSDP announcement from {} (server: {})",
                &announcement.ipv4, &announcement.server
            );
            continue;
        }

        let description = match fetcher.fetch(&announcement.location).await {
            Ok(xml) => parse_descriptor(&xml),
            Err(e) => Err(e),
        };

        let record = match description {
            Ok(description) => DeviceRecord {
                host: announcement.ipv4.clone(),
                manufacturer: description.manufacturer,
                model_name: description.model_name,
                friendly_name: description.friendly_name,
            },
            Err(e) => {
                warn!("No device description for {}: {}", &announcement.ipv4, e);

                DeviceRecord {
                    host: announcement.ipv4.clone(),
                    manufacturer: PLACEHOLDER_MANUFACTURER.to_string(),
                    model_name: PLACEHOLDER_MODEL.to_string(),
                    friendly_name: PLACEHOLDER_NAME.to_string(),
                }
            }
        };

        records.push(record);
    }

    records
}

// ------------------------------------------------------------------------------------------------
// Merge

/// Merge discovered TVs with the configured ones.
///
/// Discovered rows come first (in discovery order, one per host), linked to the configured
/// device with the same host. Configured devices which were not discovered follow as offline
/// rows, in configured order.
pub fn merge_with_configured(
    discovered: &[DeviceRecord],
    configured: &[ConfiguredDeviceRef],
    location: &[String],
) -> Vec<MergedDeviceRow> {
    let mut rows: Vec<MergedDeviceRow> = Vec::new();
    let mut seen_hosts: HashSet<&str> = HashSet::new();

    for record in discovered {
        if !seen_hosts.insert(record.host.as_str()) {
            continue;
        }

        rows.push(MergedDeviceRow {
            host: record.host.clone(),
            name: record.friendly_name.clone(),
            manufacturer: record.manufacturer.clone(),
            model: record.model_name.clone(),
            instance_id: configured
                .iter()
                .find(|device| device.host == record.host)
                .map(|device| device.instance_id),
            create: Some(CreateSpec {
                host: record.host.clone(),
                location: location.to_vec(),
            }),
        });
    }

    for device in configured {
        if seen_hosts.contains(device.host.as_str()) {
            continue;
        }

        rows.push(MergedDeviceRow {
            host: device.host.clone(),
            name: OFFLINE_LABEL.to_string(),
            manufacturer: OFFLINE_LABEL.to_string(),
            model: OFFLINE_LABEL.to_string(),
            instance_id: Some(device.instance_id),
            create: None,
        });
    }

    rows
}

// ================================================================================================
// Tests
