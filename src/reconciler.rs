mod catalogues;
mod controls;
mod power_status;
mod refresh;

use std::sync::Arc;

use log::warn;

use crate::device_cache::DeviceCache;
use crate::device_settings::DeviceSettings;
use crate::rpc_client::RpcClient;
use crate::state::{PowerState, TvState};
use crate::transport::Transport;
use crate::tv_network_check::Pinger;

/// Result of [`DeviceReconciler::determine_power_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerStatusOutcome {
    Determined(PowerState),
    /// The TV is on the network but still booting (or otherwise unable to answer reliably).
    /// Nothing should be updated.
    PendingBoot,
}

// ================================================================================================
// DeviceReconciler
//
// Design notes:
//
//  - One reconciler per TV. It owns the TV's cache (persisted lists, last power state, boot-phase
//    timestamp) and the locally observed TvState.
//  - Power determination runs in three stages: ICMP reachability, system.getPowerStatus (retried
//    once), then an optional content probe when "active" is reported shortly after a failure.
//    Sony TVs report "active" some time before their content services respond; during that
//    window the outcome is PendingBoot.
//  - Device lists are only written to the cache after a successful call. Control operations look
//    titles/names up in the cached lists.
// ================================================================================================

/// Polls a single Sony TV and reconciles its state into [`TvState`].
pub struct DeviceReconciler {
    settings: DeviceSettings,
    client: RpcClient,
    pinger: Arc<dyn Pinger>,
    cache: DeviceCache,
    state: TvState,
}

impl DeviceReconciler {
    pub fn new(
        settings: DeviceSettings,
        transport: Arc<dyn Transport>,
        pinger: Arc<dyn Pinger>,
        cache: DeviceCache,
    ) -> Self {
        let client = RpcClient::new(transport, &settings.host, &settings.psk, settings.rpc_id);

        let state = TvState {
            power_status: cache.last_power_state(),
            ..TvState::default()
        };

        DeviceReconciler {
            settings,
            client,
            pinger,
            cache,
            state,
        }
    }

    /// Apply new settings, keeping the cache and observed state.
    pub fn reconfigure(&mut self, settings: DeviceSettings, transport: Arc<dyn Transport>) {
        self.client = RpcClient::new(transport, &settings.host, &settings.psk, settings.rpc_id);
        self.settings = settings;
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn state(&self) -> &TvState {
        &self.state
    }

    pub fn cache(&self) -> &DeviceCache {
        &self.cache
    }

    /// Write `state` to the power-status observable and remember it for the next poll.
    pub fn apply_power_state(&mut self, state: PowerState) {
        self.state.power_status = Some(state);

        if let Err(e) = self.cache.set_last_power_state(state) {
            warn!("Could not persist power state: {}", e);
        }
    }
}
