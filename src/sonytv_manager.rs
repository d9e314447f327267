mod configuration;
mod message_senders;
mod network_utils;
mod out_emitters;
mod polling;
mod setters;
mod user_actions;

use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use tokio::select;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::time::Interval;
use tokio_util::task::TaskTracker;

pub use crate::associations::{AssociationKind, AssociationTable};
pub use crate::discovery::{
    ConfiguredDeviceRef, DiscoveryFilter, MergedDeviceRow, SsdpAnnouncement,
};
pub use crate::error::{ConfigurationError, ManagerError};
pub use crate::state::{PowerState, TvState};

use crate::device_settings::DeviceSettings;
use crate::discovery::DescriptorFetcher;
use crate::reconciler::DeviceReconciler;
use crate::store::KeyValueStore;
use crate::transport::Transport;
use crate::tv_network_check::Pinger;

use polling::next_poll;

#[cfg(doc)]
use crate::SonyTvManagerBuilder;

// CHANNEL MESSAGES -------------------------------------------------------------------------------

/// Messages sent from the caller to the [`SonyTvManager`].
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerMessage {
    /// Manage the TV described by the given settings. May be sent again to change settings.
    Configure(DeviceSettings),
    /// Whether the caller is ready for polling. Polls are skipped while the caller is not ready.
    HostReady(bool),
    /// Poll the TV now, outside the regular polling interval.
    Tick,
    /// Perform a [`UserAction`] on the TV.
    UserAction(UserAction),
    /// Re-read the TV's inputs, applications, and remote keys.
    RefreshCatalogues,
    /// Discover Sony TVs on the network and merge them with the caller's configured TVs.
    Discover(DiscoveryRequest),
    /// Describe the TV's model and API. The manager responds with
    /// [`ManagerOutputMessage::ApiInformation`].
    DescribeApi,
    /// Request sending of all currently-known Manager and TV state as instances of
    /// `ManagerOutputMessage`.
    EmitAllState,
    /// Shut down the [`SonyTvManager`]. Waits for discovery tasks and stops the manager task.
    ShutDown,
}

/// Actions a user can perform on the TV.
///
/// Index values refer to the matching [`AssociationTable`]. Negative indexes (the "nothing
/// selected" entry) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserAction {
    /// Switch on (`Active`) or off (any other state).
    SetPowerStatus(PowerState),
    SendRemoteKey(i64),
    SelectInputSource(i64),
    StartApplication(i64),
    SetAudioMute(bool),
    SetSpeakerVolume(u8),
    SetHeadphoneVolume(u8),
    RefreshSourceList,
    RefreshApplicationList,
}

/// Messages sent from the [`SonyTvManager`] back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerOutputMessage {
    /// Current manager status.
    Status(ManagerStatus),
    /// TV state (power, current volume and mute settings, etc). Only sent when it changes.
    TvState(TvState),
    /// A device list as a selectable value/label table.
    Associations(AssociationKind, AssociationTable),
    /// Is discovery being performed.
    IsDiscovering(bool),
    /// Discovered TVs merged with the configured TVs.
    DiscoveredDevices(Vec<MergedDeviceRow>),
    /// Model and API description of the TV.
    ApiInformation(String),
    /// A [`SonyTvManager`] error occurred.
    Error(ManagerError),
}

// ================================================================================================
// Additional structs

/// Status of the [`SonyTvManager`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ManagerStatus {
    /// No device settings have been received yet.
    Unconfigured,
    /// The most recent device settings were rejected.
    InvalidConfiguration(ConfigurationError),
    /// The TV answers (standby or active).
    Active,
    /// The TV is off or not on the network.
    Inactive,
}

/// Parameters of a discovery run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscoveryRequest {
    /// Devices the caller has already configured.
    pub configured: Vec<ConfiguredDeviceRef>,
    /// Where the caller places newly created devices (returned in each row's create spec).
    pub location: Vec<String>,
    /// SSDP announcements captured by the caller. When `None`, an SSDP search is performed.
    pub announcements: Option<Vec<SsdpAnnouncement>>,
    /// Filter applied to `announcements`.
    pub filter: DiscoveryFilter,
}

// ================================================================================================
// SonyTvManager
//
// Design notes:
//
//  - The manager expects to be run once by the caller, and to run until told to shut down.
//  - All input from the caller is received over a receiver channel. The same operations are also
//    available as async methods (configure, tick, user_action) for callers driving the manager
//    directly.
//  - All output to the caller is sent over a sender channel.
//  - Only one TV is managed. Its reconciler (and cache) is created on the first valid
//    configuration and kept across reconfigurations of the same host. A new host gets a new
//    reconciler with its own cache.
//  - Messages and polls are processed one at a time. A poll always completes before the next
//    message is looked at.
//  - Polls which find the TV booting produce no output at all. TvState is only sent when it has
//    changed since it was last sent.
//  - Discovery runs in a spawned task and reports back over the output channel.
// ================================================================================================

/// Manage a single Sony TV.
///
/// The interface to `SonyTvManager` (after instantiation with [`SonyTvManager::new()`] and
/// running with [`SonyTvManager::run()`]) is mostly contained to the sending and receiving of
/// [`ManagerMessage`] and [`ManagerOutputMessage`].
pub struct SonyTvManager {
    // General manager state
    manager_status: ManagerStatus,
    reconciler: Option<DeviceReconciler>,
    is_host_ready: bool,
    last_sent_tv_state: Option<TvState>,
    poll_interval: Option<Interval>,
    task_tracker: TaskTracker,

    // Manager in/out channels
    command_rx: Receiver<ManagerMessage>, // Receives ManagerMessage from the caller
    output_tx: Sender<ManagerOutputMessage>, // Sends ManagerOutputMessage back to the caller

    // Overrides (see SonyTvManagerBuilder)
    pub(crate) data_dir: Option<PathBuf>, // Where to store persisted data
    pub(crate) store: Option<Box<dyn KeyValueStore>>,
    is_store_injected: bool, // The builder's store has been handed to a TV
    pub(crate) transport: Option<Arc<dyn Transport>>,
    pub(crate) pinger: Option<Arc<dyn Pinger>>,
    pub(crate) descriptor_fetcher: Option<Arc<dyn DescriptorFetcher>>,
}

/// Usage example:
///
/// ```no_run
/// use sonytv_manager::{DeviceSettingsBuilder, ManagerMessage, SonyTvManager};
/// use tokio::sync::mpsc;
///
/// #[tokio::main]
/// async fn main() {
///     let (to_manager, to_manager_rx) = mpsc::channel(32);
///     let (mut manager, mut from_manager) = SonyTvManager::new(to_manager_rx);
///
///     to_manager
///         .send(ManagerMessage::Configure(
///             DeviceSettingsBuilder::new().with_host("192.168.1.50").build(),
///         ))
///         .await
///         .unwrap();
///
///     // Start a task to receive `ManagerOutputMessage` messages on `from_manager`
///
///     manager.run().await;
/// }
/// ```
impl SonyTvManager {
    /// Creates a `SonyTvManager` instance.
    ///
    /// Expects to be given a tokio mpsc `Receiver` of [`ManagerMessage`]s from the caller. Returns
    /// a tuple of itself and a `Receiver` of [`ManagerOutputMessage`]s back to the caller.
    ///
    /// Use [`SonyTvManagerBuilder`] to override any `SonyTvManager` defaults.
    pub fn new(
        command_rx: Receiver<ManagerMessage>,
    ) -> (SonyTvManager, Receiver<ManagerOutputMessage>) {
        let (output_tx, manager_channel_rx) = channel(32);

        let manager = SonyTvManager {
            manager_status: ManagerStatus::Unconfigured,
            reconciler: None,
            is_host_ready: true,
            last_sent_tv_state: None,
            poll_interval: None,
            task_tracker: TaskTracker::new(),
            command_rx,
            output_tx,
            data_dir: None,
            store: None,
            is_store_injected: false,
            transport: None,
            pinger: None,
            descriptor_fetcher: None,
        };

        (manager, manager_channel_rx)
    }

    /// Run the manager.
    ///
    /// Loops until [`ManagerMessage::ShutDown`] is received (or the caller's channel closes):
    ///
    /// * Accepting (and acting on) `ManagerMessage` messages from the caller.
    /// * Polling the TV every `update_interval` once configured.
    /// * Sending `ManagerOutputMessage` messages back to the caller.
    pub async fn run(&mut self) {
        info!("Manager starting up");

        self.emit_manager_status().await;

        info!("Manager ready to receive commands (send a Configure command first)");

        loop {
            select! {
                // FROM THE CALLER ----------------------------------------------------------------

                manager_msg = self.command_rx.recv() => {
                    let Some(manager_msg) = manager_msg else {
                        warn!("Command channel closed; shutting down");
                        break;
                    };

                    match manager_msg {
                        ManagerMessage::Configure(settings) => {
                            if let Err(e) = self.configure(settings).await {
                                let _ = self.send_out(ManagerOutputMessage::Error(e)).await;
                            }
                        }
                        ManagerMessage::HostReady(is_ready) => {
                            self.set_host_ready(is_ready);
                        }
                        ManagerMessage::Tick => {
                            self.tick().await;
                        }
                        ManagerMessage::UserAction(action) => {
                            if let Err(e) = self.user_action(action).await {
                                let _ = self.send_out(ManagerOutputMessage::Error(e)).await;
                            }
                        }
                        ManagerMessage::RefreshCatalogues => {
                            self.refresh_catalogues().await;
                        }
                        ManagerMessage::Discover(request) => {
                            self.discover(request);
                        }
                        ManagerMessage::DescribeApi => {
                            self.describe_api().await;
                        }
                        ManagerMessage::EmitAllState => {
                            self.emit_all_state().await;
                        }
                        ManagerMessage::ShutDown => {
                            info!("Manager shutting down");
                            break;
                        }
                    }
                }

                // POLLING ------------------------------------------------------------------------

                _ = next_poll(&mut self.poll_interval) => {
                    self.tick().await;
                }
            }
        }

        info!("Manager waiting for tasks to shut down");

        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("Manager shut down successfully");
    }

    /// Current manager status.
    pub fn status(&self) -> &ManagerStatus {
        &self.manager_status
    }

    /// Current TV state, if a TV has been configured.
    pub fn tv_state(&self) -> Option<&TvState> {
        self.reconciler.as_ref().map(|reconciler| reconciler.state())
    }

    // --------------------------------------------------------------------------------------------
    // Private

    /// Whether valid settings have been applied.
    fn is_configured(&self) -> bool {
        self.reconciler.is_some()
            && matches!(
                self.manager_status,
                ManagerStatus::Active | ManagerStatus::Inactive
            )
    }
}

// ================================================================================================
// Tests


#[cfg(test)]
mod tests {
    use super::test_helpers::{drain, test_manager, test_settings};
    use crate::associations::AssociationKind;
    use crate::device_settings::DeviceSettingsBuilder;
    use crate::reconciler::test_helpers::{APPLICATIONS_RESULT, REMOTE_KEYS_RESULT, SOURCES_RESULT};
    use crate::test_support::{ScriptedPinger, ScriptedTransport};
    use crate::{
        ConfigurationError, ManagerError, ManagerMessage, ManagerOutputMessage, ManagerStatus,
        PowerState, UserAction,
    };

    const STANDBY: &str = r#"{"result":[{"status":"standby"}],"id":1}"#;

    fn configured_transport() -> ScriptedTransport {
        let transport = ScriptedTransport::new();
        transport
            .reply("getPowerStatus", STANDBY)
            .reply("getCurrentExternalInputsStatus", SOURCES_RESULT)
            .reply("getApplicationList", APPLICATIONS_RESULT)
            .reply("getRemoteControllerInfo", REMOTE_KEYS_RESULT);

        transport
    }

    #[tokio::test]
    async fn run_processes_messages_until_shutdown() {
        let transport = configured_transport();
        let mut test = test_manager(&transport, ScriptedPinger::reachable());

        test.to_manager
            .send(ManagerMessage::Configure(test_settings()))
            .await
            .unwrap();
        test.to_manager.send(ManagerMessage::ShutDown).await.unwrap();

        test.manager.run().await;

        let messages = drain(&mut test.from_manager);

        assert_eq!(
            messages.first(),
            Some(&ManagerOutputMessage::Status(ManagerStatus::Unconfigured))
        );
        assert!(messages.contains(&ManagerOutputMessage::Status(ManagerStatus::Active)));
        assert!(messages.iter().any(|message| matches!(
            message,
            ManagerOutputMessage::TvState(state) if state.power_status == Some(PowerState::Standby)
        )));

        let kinds: Vec<AssociationKind> = messages
            .iter()
            .filter_map(|message| match message {
                ManagerOutputMessage::Associations(kind, _) => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                AssociationKind::InputSource,
                AssociationKind::Application,
                AssociationKind::RemoteKey
            ]
        );
    }

    #[tokio::test]
    async fn run_stops_when_caller_goes_away() {
        let transport = ScriptedTransport::new();
        let test = test_manager(&transport, ScriptedPinger::reachable());
        let mut manager = test.manager;

        drop(test.to_manager);
        manager.run().await;

        assert_eq!(manager.status(), &ManagerStatus::Unconfigured);
    }

    #[tokio::test]
    async fn invalid_settings_are_reported() {
        let transport = ScriptedTransport::new();
        let mut test = test_manager(&transport, ScriptedPinger::reachable());

        let result = test
            .manager
            .configure(DeviceSettingsBuilder::new().with_host("tv.local").build())
            .await;

        assert_eq!(
            result,
            Err(ManagerError::Configuration(ConfigurationError::HostInvalid(
                "tv.local".into()
            )))
        );
        assert_eq!(
            drain(&mut test.from_manager),
            vec![ManagerOutputMessage::Status(
                ManagerStatus::InvalidConfiguration(ConfigurationError::HostInvalid(
                    "tv.local".into()
                ))
            )]
        );
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn unreachable_tv_skips_catalogues() {
        let transport = configured_transport();
        let mut test = test_manager(&transport, ScriptedPinger::unreachable());

        test.manager.configure(test_settings()).await.unwrap();

        assert!(transport.requests().is_empty());
        assert_eq!(test.manager.status(), &ManagerStatus::Inactive);

        let messages = drain(&mut test.from_manager);
        assert!(messages.iter().any(|message| matches!(
            message,
            ManagerOutputMessage::TvState(state) if state.power_status == Some(PowerState::Off)
        )));

        // Uncached lists are sent as sentinel-only tables
        assert!(messages.iter().any(|message| matches!(
            message,
            ManagerOutputMessage::Associations(AssociationKind::InputSource, table)
                if table.entries.len() == 1
        )));
    }

    #[tokio::test]
    async fn user_action_requires_configuration() {
        let transport = ScriptedTransport::new();
        let mut test = test_manager(&transport, ScriptedPinger::reachable());

        assert!(matches!(
            test.manager.user_action(UserAction::SetAudioMute(true)).await,
            Err(ManagerError::Action(_))
        ));
    }

    #[tokio::test]
    async fn emit_all_state_resends_everything() {
        let transport = configured_transport();
        let mut test = test_manager(&transport, ScriptedPinger::reachable());

        test.manager.configure(test_settings()).await.unwrap();
        drain(&mut test.from_manager);

        test.to_manager.send(ManagerMessage::EmitAllState).await.unwrap();
        test.to_manager.send(ManagerMessage::ShutDown).await.unwrap();
        test.manager.run().await;

        let messages = drain(&mut test.from_manager);

        assert!(messages.contains(&ManagerOutputMessage::Status(ManagerStatus::Active)));
        assert_eq!(
            messages
                .iter()
                .filter(|message| matches!(message, ManagerOutputMessage::TvState(_)))
                .count(),
            1
        );
        assert_eq!(
            messages
                .iter()
                .filter(|message| matches!(message, ManagerOutputMessage::Associations(_, _)))
                .count(),
            3
        );
    }
}
