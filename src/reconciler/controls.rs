use log::{debug, info, warn};
use tokio::time::sleep;

use crate::associations::{decode_html_entities, Labelled};
use crate::error::{ConfigurationError, ManagerError};
use crate::rpc_client::CallOptions;
use crate::rpc_payloads::RemoteKey;
use crate::state::PowerState;
use crate::tv_commands::{TvCommand, VolumeTarget};

use super::{DeviceReconciler, PowerStatusOutcome};

/// Remote key sent after switching on. Some sets keep the screen dark after `setPowerStatus`.
const POWER_ON_REMOTE_KEY: &str = "TvPower";

// ------------------------------------------------------------------------------------------------
// Control operations.
//
// Every operation succeeds only when the TV answers with a result. Observables are written after
// that answer, never optimistically.
// ------------------------------------------------------------------------------------------------

impl DeviceReconciler {
    /// Switch the TV on or off, then re-read its power state.
    pub async fn set_power(&mut self, on: bool) -> Result<(), ManagerError> {
        if let Err(e) = self
            .client
            .call_for_result(&TvCommand::SetPowerStatus(on), CallOptions::SET_POWER)
            .await
        {
            // The observable only; the persisted last state is left for the next poll.
            self.state.power_status = Some(PowerState::Off);
            return Err(e.into());
        }

        info!("Power {} requested on {}", if on { "on" } else { "off" }, self.client.host());

        if on {
            self.send_power_on_key().await;
        }

        sleep(self.settings.power_settle_delay).await;

        match self.determine_power_status().await {
            PowerStatusOutcome::Determined(state) => self.apply_power_state(state),
            PowerStatusOutcome::PendingBoot => debug!("Power state pending after power request"),
        }

        Ok(())
    }

    /// Switch to the physical input with the given title.
    pub async fn set_input_source(&mut self, title: &str) -> Result<(), ManagerError> {
        let sources = self
            .cache
            .source_list()
            .ok_or(ConfigurationError::SourceListMissing)?;

        let source = find_by_label(&sources, title)
            .ok_or_else(|| ConfigurationError::UnknownSource(title.to_string()))?;

        self.client
            .call_for_result(&TvCommand::SetPlayContent(source.uri.clone()), CallOptions::STRICT)
            .await?;

        Ok(())
    }

    /// Switch to the input at `index` of the cached source list and select it.
    pub async fn select_input_source(&mut self, index: i64) -> Result<(), ManagerError> {
        let sources = self
            .cache
            .source_list()
            .ok_or(ConfigurationError::SourceListMissing)?;
        let title = item_at(&sources, index)?.title.clone();

        self.state.input_source = Some(index);
        self.set_input_source(&title).await
    }

    /// Launch the installed application with the given title.
    pub async fn start_application(&mut self, title: &str) -> Result<(), ManagerError> {
        let applications = self
            .cache
            .application_list()
            .ok_or(ConfigurationError::ApplicationListMissing)?;

        let application = find_by_label(&applications, title)
            .ok_or_else(|| ConfigurationError::UnknownApplication(title.to_string()))?;

        self.client
            .call_for_result(&TvCommand::SetActiveApp(application.uri.clone()), CallOptions::STRICT)
            .await?;

        Ok(())
    }

    /// Launch the application at `index` of the cached application list and select it.
    pub async fn start_application_at(&mut self, index: i64) -> Result<(), ManagerError> {
        let applications = self
            .cache
            .application_list()
            .ok_or(ConfigurationError::ApplicationListMissing)?;
        let title = item_at(&applications, index)?.title.clone();

        self.state.application = Some(index);
        self.start_application(&title).await
    }

    pub async fn set_audio_mute(&mut self, mute: bool) -> Result<(), ManagerError> {
        self.client
            .call_for_result(&TvCommand::SetAudioMute(mute), CallOptions::STRICT)
            .await?;

        self.state.audio_mute = Some(mute);

        Ok(())
    }

    pub async fn set_speaker_volume(&mut self, volume: u8) -> Result<(), ManagerError> {
        self.set_volume(VolumeTarget::Speaker, volume).await?;
        self.state.speaker_volume = Some(volume);

        Ok(())
    }

    pub async fn set_headphone_volume(&mut self, volume: u8) -> Result<(), ManagerError> {
        self.set_volume(VolumeTarget::Headphone, volume).await?;
        self.state.headphone_volume = Some(volume);

        Ok(())
    }

    /// Send the IRCC code of the named remote key.
    pub async fn send_remote_key(&mut self, name: &str) -> Result<(), ManagerError> {
        let keys = self
            .cache
            .remote_keys()
            .ok_or(ConfigurationError::RemoteKeysMissing)?;

        let key = find_by_label(&keys, name)
            .ok_or_else(|| ConfigurationError::UnknownRemoteKey(name.to_string()))?;

        self.client.send_ircc(&key.value).await?;

        Ok(())
    }

    /// Send the remote key at `index` of the cached catalogue and select it.
    pub async fn send_remote_key_at(&mut self, index: i64) -> Result<(), ManagerError> {
        let keys = self
            .cache
            .remote_keys()
            .ok_or(ConfigurationError::RemoteKeysMissing)?;
        let name = item_at(&keys, index)?.name.clone();

        self.state.remote_key = Some(index);
        self.send_remote_key(&name).await
    }

    // Private ------------------------------------------------------------------------------------

    async fn set_volume(&self, target: VolumeTarget, volume: u8) -> Result<(), ManagerError> {
        self.client
            .call_for_result(&TvCommand::SetAudioVolume(target, volume), CallOptions::STRICT)
            .await?;

        Ok(())
    }

    async fn send_power_on_key(&self) {
        let keys: Vec<RemoteKey> = self.cache.remote_keys().unwrap_or_default();

        match keys.iter().find(|key| key.name == POWER_ON_REMOTE_KEY) {
            Some(key) => {
                if let Err(e) = self.client.send_ircc(&key.value).await {
                    warn!("Could not send {} key: {}", POWER_ON_REMOTE_KEY, e);
                }
            }
            None => debug!("No {} key in remote key list", POWER_ON_REMOTE_KEY),
        }
    }
}

/// Find an item by label, as reported by the TV or as shown to the user (entity-decoded).
fn find_by_label<'a, T: Labelled>(items: &'a [T], label: &str) -> Option<&'a T> {
    items
        .iter()
        .find(|item| item.label() == label || decode_html_entities(item.label()) == label)
}

fn item_at<T>(items: &[T], index: i64) -> Result<&T, ConfigurationError> {
    usize::try_from(index)
        .ok()
        .and_then(|index| items.get(index))
        .ok_or(ConfigurationError::IndexOutOfRange(index))
}

// ================================================================================================
// Tests
