/*!
Asynchronous state polling and control manager for Sony Bravia TVs.

[`SonyTvManager`] keeps the state of a single Sony TV in sync by polling the TV's JSON-RPC
("ScalarWebAPI") interface, and forwards user actions (power, inputs, applications, remote keys,
volume) to the TV.

## Features

* Periodic polling of power status, volume, mute, and current input.
* Recognition of booting TVs, so a TV in the middle of switching on never reads as "off".
* Cached input, application, and remote key lists, exposed as selectable value/label tables.
* IRCC remote key presses.
* SSDP discovery of Sony TVs, merged with the TVs the caller has already configured.
* Persists the cached lists and last power state between sessions.

## Overview

A `SonyTvManager` instance:

1. Polls the configured TV every [`DeviceSettings::update_interval`].
2. Accepts [`ManagerMessage`] messages from the caller to:
    * Apply (or change) the [`DeviceSettings`] of the TV to manage.
    * Perform a [`UserAction`] on the TV.
    * Refresh the TV's input, application, and remote key lists.
    * Discover Sony TVs on the network.
    * Describe the TV's API.
3. Sends [`ManagerOutputMessage`] updates back to the caller:
    * Updates to the manager's [`ManagerStatus`].
    * Updates to the [`TvState`] (e.g. current volume level). Only sent when something changed.
    * [`AssociationTable`]s for inputs, applications, and remote keys.
    * Discovered TVs ([`MergedDeviceRow`]).
    * Any manager or TV errors.

## Instantiating

Instantiate a `SonyTvManager` with [`SonyTvManager::new()`], providing a channel that will be used
to send [`ManagerMessage`] messages to the manager. `SonyTvManager::new()` will return a tuple of
the manager instance itself, and another channel over which the manager will send
[`ManagerOutputMessage`] messages back to the caller.

```
use sonytv_manager::SonyTvManager;
use tokio::sync::mpsc;

let (to_manager, to_manager_rx) = mpsc::channel(32);
let (mut manager, mut from_manager) = SonyTvManager::new(to_manager_rx);

// Send messages with to_manager.send()
// Receive messages with from_manager.recv()
```

Optionally, manager settings can be configured using the [`SonyTvManagerBuilder`].

## Configuring

Start managing a TV by sending a [`ManagerMessage::Configure`] message to the manager. Use the
[`DeviceSettingsBuilder`] to create the settings. Only the host is required; the pre-shared key
defaults to `0000`.

```
use std::time::Duration;

use sonytv_manager::{DeviceSettingsBuilder, ManagerMessage::Configure};
use tokio::sync::mpsc;

# #[tokio::main]
# async fn main() {
let (to_manager, to_manager_rx) = mpsc::channel(32);

// <Instantiate and run the manager first>

let _ = to_manager
    .send(Configure(
        DeviceSettingsBuilder::new()
            .with_host("192.168.1.50")
            .with_psk("1234")
            .with_update_interval(Duration::from_secs(10))
            .build(),
    ))
    .await;
# }
```

Settings which fail validation put the manager in the [`ManagerStatus::InvalidConfiguration`]
state and stop polling until valid settings are received.

### Power status

The manager reports the TV as `Off`, `Standby`, or `Active`. A TV which has just been switched on
answers with errors or not at all for a while; during this boot grace period polls leave the last
known state untouched. A TV which does not answer a network ping is reported as `Off`.

The manager is `Active` while the TV answers (standby or active) and `Inactive` while it is off.

## User actions

User actions refer to entries of the association tables sent by the manager. An index of `-1`
(the "nothing selected" entry) is ignored. Failed actions are reported with
[`ManagerOutputMessage::Error`].

## Discovery

Send [`ManagerMessage::Discover`] to find Sony TVs on the local network. The manager sends
[`ManagerOutputMessage::IsDiscovering`] messages around the discovery run, and the merged list of
discovered and configured TVs with [`ManagerOutputMessage::DiscoveredDevices`]. Callers which
capture SSDP announcements themselves can pass them in the [`DiscoveryRequest`].

## Examples

(Note: This example relies on the third-party crates `env_logger` and `tokio`).

```no_run
use sonytv_manager::{
    DeviceSettingsBuilder, ManagerMessage, ManagerOutputMessage, SonyTvManager, UserAction,
};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), ()> {
    let (to_manager, to_manager_rx) = mpsc::channel(32);
    let (mut manager, mut from_manager) = SonyTvManager::new(to_manager_rx);

    env_logger::Builder::new()
        .filter(None, log::LevelFilter::Info)
        .init();

    tokio::spawn(async move {
        while let Some(manager_output_msg) = from_manager.recv().await {
            println!("<<< Received message from SonyTvManager: {:?}", manager_output_msg);

            if let ManagerOutputMessage::Associations(_, table) = &manager_output_msg {
                println!("{} entries", table.entries.len());
            }
        }
    });

    to_manager
        .send(ManagerMessage::Configure(
            DeviceSettingsBuilder::new().with_host("192.168.1.50").build(),
        ))
        .await
        .map_err(|_| ())?;

    to_manager
        .send(ManagerMessage::UserAction(UserAction::SetSpeakerVolume(15)))
        .await
        .map_err(|_| ())?;

    manager.run().await;

    Ok(())
}
```
*/

mod associations;
mod device_cache;
mod device_settings;
mod discovery;
mod error;
mod helpers;
mod reconciler;
mod rpc_client;
mod rpc_payloads;
mod sonytv_manager;
mod sonytv_manager_builder;
mod state;
mod store;
#[cfg(test)]
mod test_support;
mod transport;
mod tv_commands;
mod tv_network_check;

pub use associations::{
    build_association_table, Association, AssociationKind, AssociationTable, Labelled,
    NONE_SELECTED_LABEL, NONE_SELECTED_VALUE,
};
pub use device_cache::DeviceCache;
pub use device_settings::{DeviceSettings, DeviceSettingsBuilder};
pub use discovery::{
    discover_sony_devices, merge_with_configured, records_from_announcements, ConfiguredDeviceRef,
    CreateSpec, DescriptorFetcher, DeviceRecord, DiscoveryFilter, HttpDescriptorFetcher,
    InstanceId, MergedDeviceRow, SsdpAnnouncement,
};
pub use error::{
    ConfigurationError, DiscoveryError, ManagerError, RpcError, StoreError, TransportError,
    TransportErrorKind,
};
pub use reconciler::{DeviceReconciler, PowerStatusOutcome};
pub use rpc_payloads::{ApplicationItem, RemoteKey, SourceItem};
pub use sonytv_manager::{
    DiscoveryRequest, ManagerMessage, ManagerOutputMessage, ManagerStatus, SonyTvManager,
    UserAction,
};
pub use sonytv_manager_builder::SonyTvManagerBuilder;
pub use state::{PowerState, TvState};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use transport::{HttpTransport, Transport, TransportRequest};
pub use tv_commands::{TvCommand, VolumeTarget};
pub use tv_network_check::{IcmpPinger, Pinger};
