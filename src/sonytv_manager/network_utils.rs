use std::sync::Arc;

use log::info;

use crate::discovery::{
    discover_sony_devices, merge_with_configured, records_from_announcements, DescriptorFetcher,
    DeviceRecord, HttpDescriptorFetcher, DISCOVERY_DURATION,
};
use crate::error::DiscoveryError;
use crate::{DiscoveryRequest, ManagerError, ManagerOutputMessage};

use super::SonyTvManager;

// ------------------------------------------------------------------------------------------------
// Network-related helpers for discovery.
// ------------------------------------------------------------------------------------------------

impl SonyTvManager {
    /// Discover Sony TVs on the local network and merge them with the caller's configured TVs.
    ///
    /// Runs in a tracked task. The merged rows are sent back to the caller as a
    /// `ManagerOutputMessage::DiscoveredDevices` message, bracketed by `IsDiscovering` messages.
    pub(crate) fn discover(&mut self, request: DiscoveryRequest) {
        let output_tx = self.output_tx.clone();
        let fetcher_override = self.descriptor_fetcher.clone();

        self.task_tracker.spawn(async move {
            let _ = SonyTvManager::send_out_with_sender(
                &output_tx,
                ManagerOutputMessage::IsDiscovering(true),
            )
            .await;

            let discovered = match &request.announcements {
                None => discover_sony_devices(DISCOVERY_DURATION).await,
                Some(announcements) => {
                    match fetcher_override.map_or_else(default_fetcher, Ok) {
                        Ok(fetcher) => Ok(records_from_announcements(
                            announcements,
                            &request.filter,
                            fetcher.as_ref(),
                        )
                        .await),
                        Err(e) => Err(e),
                    }
                }
            };

            let message = match discovered {
                Ok(records) => {
                    log_discovered(&records);

                    ManagerOutputMessage::DiscoveredDevices(merge_with_configured(
                        &records,
                        &request.configured,
                        &request.location,
                    ))
                }
                Err(e) => ManagerOutputMessage::Error(ManagerError::Discovery(format!(
                    "Discovery failed: {e}"
                ))),
            };

            let _ = SonyTvManager::send_out_with_sender(&output_tx, message).await;

            let _ = SonyTvManager::send_out_with_sender(
                &output_tx,
                ManagerOutputMessage::IsDiscovering(false),
            )
            .await;
        });
    }
}

fn default_fetcher() -> Result<Arc<dyn DescriptorFetcher>, DiscoveryError> {
    Ok(Arc::new(HttpDescriptorFetcher::new()?))
}

fn log_discovered(records: &[DeviceRecord]) {
    info!("Discovered {} Sony TV(s)", records.len());

    for record in records {
        info!("Discovered: {}", record);
    }
}

// ================================================================================================
// Tests
