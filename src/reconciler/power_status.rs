use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::error::RpcError;
use crate::helpers::unix_timestamp;
use crate::rpc_client::{CallOptions, RpcOutcome, ERROR_ILLEGAL_STATE};
use crate::rpc_payloads::{result_item, PowerStatusPayload};
use crate::state::PowerState;
use crate::tv_commands::TvCommand;
use crate::tv_network_check::probe_reachability;

use super::{DeviceReconciler, PowerStatusOutcome};

// ------------------------------------------------------------------------------------------------
// Power-status determination.
// ------------------------------------------------------------------------------------------------

/// What a single getPowerStatus call told us.
enum PowerQuery {
    Status(String),
    DeviceError(i64),
}

impl DeviceReconciler {
    /// Determine the TV's power state.
    ///
    /// Does not write any observable; see [`DeviceReconciler::apply_power_state`].
    pub async fn determine_power_status(&mut self) -> PowerStatusOutcome {
        let host = self.settings.host.clone();
        let keep_trying = self.cache.last_power_state() != Some(PowerState::Off);

        if !probe_reachability(
            self.pinger.as_ref(),
            &host,
            self.settings.ping_attempts,
            self.settings.ping_timeout,
            keep_trying,
        )
        .await
        {
            debug!("{} is not on the network", &host);
            return PowerStatusOutcome::Determined(PowerState::Off);
        }

        let mut query = self.query_power_status().await;

        if let Err(e) = &query {
            debug!(
                "Power status query to {} failed ({}); retrying in {:?}",
                &host, e, self.settings.power_status_retry_delay
            );

            sleep(self.settings.power_status_retry_delay).await;
            query = self.query_power_status().await;
        }

        let status = match query {
            Ok(PowerQuery::Status(status)) => status,
            Ok(PowerQuery::DeviceError(code)) => {
                debug!("{} answered power status query with error {}; assuming boot phase", &host, code);
                self.record_failed_power_query();
                return PowerStatusOutcome::PendingBoot;
            }
            Err(e) => {
                info!("{} is on the network but not answering: {}", &host, e);
                self.record_failed_power_query();
                return PowerStatusOutcome::Determined(PowerState::Off);
            }
        };

        let state = match status.as_str() {
            "standby" => PowerState::Standby,
            "active" => PowerState::Active,
            other => {
                error!("{} reported unknown power status '{}'", &host, other);
                return PowerStatusOutcome::Determined(PowerState::Off);
            }
        };

        if state == PowerState::Active && self.is_within_boot_grace() && !self.is_content_ready().await {
            debug!("{} reports active but content is not ready yet", &host);
            return PowerStatusOutcome::PendingBoot;
        }

        PowerStatusOutcome::Determined(state)
    }

    // Private ------------------------------------------------------------------------------------

    async fn query_power_status(&self) -> Result<PowerQuery, RpcError> {
        match self
            .client
            .call(&TvCommand::GetPowerStatus, CallOptions::POWER_STATUS)
            .await
        {
            Ok(RpcOutcome::Result(result)) => Ok(PowerQuery::Status(
                result_item::<PowerStatusPayload>(&result, 0)?.status,
            )),
            Ok(RpcOutcome::Ignored { code, .. }) | Err(RpcError::Protocol { code, .. }) => {
                Ok(PowerQuery::DeviceError(code))
            }
            Err(e) => Err(e),
        }
    }

    /// Has a power-status query failed within the boot grace window.
    fn is_within_boot_grace(&self) -> bool {
        match self.cache.boot_phase_timestamp() {
            Some(timestamp) => {
                unix_timestamp().saturating_sub(timestamp) <= self.settings.boot_grace.as_secs()
            }
            None => false,
        }
    }

    /// Can the TV already tell us what it is playing.
    async fn is_content_ready(&self) -> bool {
        match self
            .client
            .call(&TvCommand::GetPlayingContentInfo, CallOptions::BOOT_PROBE)
            .await
        {
            Ok(RpcOutcome::Ignored { code, .. }) => code != ERROR_ILLEGAL_STATE,
            Ok(RpcOutcome::Result(_)) => true,
            Err(_) => false,
        }
    }

    fn record_failed_power_query(&mut self) {
        if let Err(e) = self.cache.record_failed_power_query(unix_timestamp()) {
            warn!("Could not persist boot-phase timestamp: {}", e);
        }
    }
}

// ================================================================================================
// Tests
