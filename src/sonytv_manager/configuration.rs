use std::sync::Arc;

use log::{debug, info, warn};

use crate::device_cache::DeviceCache;
use crate::device_settings::DeviceSettings;
use crate::error::RpcError;
use crate::reconciler::DeviceReconciler;
use crate::store::{FileStore, KeyValueStore, MemoryStore};
use crate::transport::{HttpTransport, Transport};
use crate::tv_network_check::IcmpPinger;
use crate::{ManagerError, ManagerStatus, PowerState};

use super::SonyTvManager;

// ------------------------------------------------------------------------------------------------
// Applying device settings.
// ------------------------------------------------------------------------------------------------

impl SonyTvManager {
    /// Manage the TV described by `settings`.
    ///
    /// Invalid settings stop polling and put the manager in the `InvalidConfiguration` state.
    /// Valid settings (re)start polling, poll once, and refresh the TV's inputs, applications, and
    /// remote keys when the TV answers.
    pub async fn configure(&mut self, settings: DeviceSettings) -> Result<(), ManagerError> {
        if let Err(e) = settings.validate() {
            warn!("Rejecting device settings: {}", e);

            self.poll_interval = None;
            self.set_manager_status(ManagerStatus::InvalidConfiguration(e.clone()))
                .await;

            return Err(e.into());
        }

        let transport = self.transport_for(&settings)?;

        let previous_host = self
            .reconciler
            .as_ref()
            .map(|reconciler| reconciler.settings().host.clone());
        let is_same_host = previous_host.as_deref() == Some(settings.host.as_str());

        match self.reconciler.as_mut().filter(|_| is_same_host) {
            Some(reconciler) => reconciler.reconfigure(settings.clone(), transport),
            None => {
                if let Some(previous_host) = previous_host {
                    info!(
                        "Switching from Sony TV at {} to {}; cached device data is not carried over",
                        &previous_host, &settings.host
                    );
                }

                let cache = DeviceCache::new(self.open_store(&settings.host));
                let pinger = self
                    .pinger
                    .get_or_insert_with(|| Arc::new(IcmpPinger::new()))
                    .clone();

                self.reconciler = Some(DeviceReconciler::new(
                    settings.clone(),
                    transport,
                    pinger,
                    cache,
                ));
                self.last_sent_tv_state = None;
            }
        }

        info!("Managing Sony TV at {}", &settings.host);

        if !self.is_configured() {
            self.set_manager_status(ManagerStatus::Inactive).await;
        }

        self.start_polling(settings.update_interval);
        self.tick().await;

        let is_reachable = matches!(
            self.tv_state().and_then(|state| state.power_status),
            Some(PowerState::Standby | PowerState::Active)
        );

        if self.is_host_ready && is_reachable {
            self.refresh_catalogues().await;
        } else {
            self.emit_all_associations().await;
        }

        Ok(())
    }

    // Private ------------------------------------------------------------------------------------

    fn transport_for(&self, settings: &DeviceSettings) -> Result<Arc<dyn Transport>, ManagerError> {
        if let Some(transport) = &self.transport {
            return Ok(transport.clone());
        }

        let transport = HttpTransport::new(settings.connect_timeout, settings.request_timeout)
            .map_err(RpcError::from)?;

        Ok(Arc::new(transport))
    }

    /// The store given to the builder (for the first TV only; later TVs get a volatile store),
    /// else the host's file store in the data directory. A file store which cannot be opened is
    /// replaced with a volatile one.
    fn open_store(&mut self, host: &str) -> Box<dyn KeyValueStore> {
        if let Some(store) = self.store.take() {
            self.is_store_injected = true;
            return store;
        }

        if self.is_store_injected {
            debug!("Using a volatile store for {}", host);
            return Box::new(MemoryStore::new());
        }

        match FileStore::open(self.data_dir.clone(), host) {
            Ok(store) => Box::new(store),
            Err(e) => {
                warn!("Could not open persisted data; state will not survive restarts: {}", e);
                Box::new(MemoryStore::new())
            }
        }
    }
}

// ================================================================================================
// Tests

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::device_settings::DeviceSettingsBuilder;
    use crate::reconciler::test_helpers::{APPLICATIONS_RESULT, REMOTE_KEYS_RESULT, SOURCES_RESULT};
    use crate::sonytv_manager::test_helpers::{drain, test_manager, test_settings};
    use crate::test_support::{ScriptedPinger, ScriptedTransport};
    use crate::{
        AssociationKind, ConfigurationError, ManagerError, ManagerOutputMessage, ManagerStatus,
        PowerState, UserAction,
    };

    #[tokio::test]
    async fn reconfigure_keeps_cached_lists() {
        let transport = ScriptedTransport::new();
        transport
            .reply("getPowerStatus", r#"{"result":[{"status":"standby"}],"id":1}"#)
            .reply(
                "getCurrentExternalInputsStatus",
                r#"{"result":[[{"uri":"extInput:hdmi?port=1","title":"HDMI 1"}]],"id":1}"#,
            )
            .fail("getApplicationList", crate::error::TransportErrorKind::Timeout)
            .fail("getRemoteControllerInfo", crate::error::TransportErrorKind::Timeout);

        let mut test = test_manager(&transport, ScriptedPinger::reachable());

        test.manager.configure(test_settings()).await.unwrap();

        let messages = drain(&mut test.from_manager);
        assert_eq!(
            messages
                .iter()
                .filter(|message| matches!(message, ManagerOutputMessage::Error(_)))
                .count(),
            2
        );

        // New PSK, same TV; the source list survives
        let settings = DeviceSettingsBuilder::new()
            .with_host("192.168.1.50")
            .with_psk("4321")
            .with_update_interval(Duration::ZERO)
            .with_power_delays(Duration::ZERO, Duration::ZERO)
            .with_ping(1, Duration::ZERO)
            .build();

        test.manager.configure(settings).await.unwrap();

        let last = transport.requests().pop().unwrap();
        assert!(last
            .headers
            .contains(&("X-Auth-PSK".to_string(), "4321".to_string())));

        assert_eq!(test.manager.status(), &ManagerStatus::Active);
        assert!(drain(&mut test.from_manager).iter().any(|message| matches!(
            message,
            ManagerOutputMessage::Associations(crate::AssociationKind::InputSource, table)
                if table.label_of(0) == Some("HDMI 1")
        )));
    }

    #[tokio::test]
    async fn invalid_settings_stop_polling() {
        let transport = ScriptedTransport::new();
        transport.reply("getPowerStatus", r#"{"result":[{"status":"standby"}],"id":1}"#);

        let mut test = test_manager(&transport, ScriptedPinger::reachable());

        let settings = DeviceSettingsBuilder::new()
            .with_host("192.168.1.50")
            .with_update_interval(Duration::from_secs(10))
            .with_ping(1, Duration::ZERO)
            .build();

        // Catalogue calls fail (no scripted replies); that does not fail the configuration
        test.manager.configure(settings).await.unwrap();
        assert!(test.manager.poll_interval.is_some());

        assert!(test
            .manager
            .configure(DeviceSettingsBuilder::new().build())
            .await
            .is_err());

        assert!(test.manager.poll_interval.is_none());
        assert!(!test.manager.is_configured());

        let calls = transport.requests().len();
        test.manager.tick().await;
        assert_eq!(transport.requests().len(), calls);
    }

    #[tokio::test]
    async fn new_host_starts_without_previous_tv_data() {
        let transport = ScriptedTransport::new();
        transport
            .reply("getPowerStatus", r#"{"result":[{"status":"standby"}],"id":1}"#)
            .reply("getCurrentExternalInputsStatus", SOURCES_RESULT)
            .reply("getApplicationList", APPLICATIONS_RESULT)
            .reply("getRemoteControllerInfo", REMOTE_KEYS_RESULT)
            .reply("setPlayContent", r#"{"result":[],"id":1}"#);

        // The first TV answers its ping; the second one never does
        let pinger = Arc::new(ScriptedPinger::with_results(vec![true], false));
        let mut test = test_manager(&transport, pinger);

        test.manager.configure(test_settings()).await.unwrap();
        drain(&mut test.from_manager);

        let settings = DeviceSettingsBuilder::new()
            .with_host("192.168.1.60")
            .with_update_interval(Duration::ZERO)
            .with_power_delays(Duration::ZERO, Duration::ZERO)
            .with_ping(1, Duration::ZERO)
            .build();

        test.manager.configure(settings).await.unwrap();

        let messages = drain(&mut test.from_manager);

        assert!(messages.contains(&ManagerOutputMessage::Status(ManagerStatus::Inactive)));
        assert!(messages.iter().any(|message| matches!(
            message,
            ManagerOutputMessage::TvState(state) if state.power_status == Some(PowerState::Off)
        )));

        let inputs = messages
            .iter()
            .find_map(|message| match message {
                ManagerOutputMessage::Associations(AssociationKind::InputSource, table) => {
                    Some(table.clone())
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(inputs.entries.len(), 1);
        assert_eq!(inputs.label_of(0), None);

        assert_eq!(
            test.manager
                .user_action(UserAction::SelectInputSource(0))
                .await,
            Err(ManagerError::Configuration(
                ConfigurationError::SourceListMissing
            ))
        );
        assert_eq!(transport.count("setPlayContent"), 0);
    }
}
