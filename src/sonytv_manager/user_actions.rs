use log::{debug, info, warn};

use crate::associations::AssociationKind;
use crate::reconciler::DeviceReconciler;
use crate::{ManagerError, ManagerOutputMessage, PowerState, UserAction};

use super::polling::status_for_power;
use super::SonyTvManager;

// ------------------------------------------------------------------------------------------------
// User actions and other on-demand requests from the caller.
// ------------------------------------------------------------------------------------------------

impl SonyTvManager {
    /// Perform `action` on the TV.
    ///
    /// Any resulting change to the TV state is sent to the caller, including when the action
    /// fails. Refreshed device lists are sent as association tables.
    pub async fn user_action(&mut self, action: UserAction) -> Result<(), ManagerError> {
        if !self.is_configured() {
            return Err(ManagerError::Action(format!(
                "Cannot perform {:?} before valid device settings are applied",
                action
            )));
        }

        debug!("Performing user action: {:?}", &action);

        let result = match action {
            UserAction::SendRemoteKey(index)
            | UserAction::SelectInputSource(index)
            | UserAction::StartApplication(index)
                if index < 0 =>
            {
                debug!("Ignoring action on the unselected entry: {:?}", &action);
                return Ok(());
            }
            UserAction::RefreshSourceList => {
                self.refresh_catalogue(AssociationKind::InputSource).await
            }
            UserAction::RefreshApplicationList => {
                self.refresh_catalogue(AssociationKind::Application).await
            }
            _ => match self.reconciler.as_mut() {
                Some(reconciler) => perform(reconciler, action).await,
                None => Err(ManagerError::Action("No TV configured".into())),
            },
        };

        if let UserAction::SetPowerStatus(_) = action {
            if let Some(power_status) = self.tv_state().and_then(|state| state.power_status) {
                self.set_manager_status(status_for_power(power_status)).await;
            }
        }

        self.emit_tv_state_if_changed().await;

        result
    }

    /// Refresh all device lists, sending each resulting association table to the caller. Failed
    /// refreshes are reported as errors and the cached table is sent instead.
    pub(crate) async fn refresh_catalogues(&mut self) {
        if !self.is_configured() {
            warn!("Cannot refresh device lists before valid device settings are applied");
            return;
        }

        for kind in [
            AssociationKind::InputSource,
            AssociationKind::Application,
            AssociationKind::RemoteKey,
        ] {
            if let Err(e) = self.refresh_catalogue(kind).await {
                let _ = self.send_out(ManagerOutputMessage::Error(e)).await;

                if let Some(reconciler) = &self.reconciler {
                    self.emit_associations(kind, reconciler.association_table(kind))
                        .await;
                }
            }
        }
    }

    /// Send the TV's model and API description to the caller.
    pub(crate) async fn describe_api(&mut self) {
        let Some(reconciler) = self.reconciler.as_ref().filter(|_| self.is_configured()) else {
            let _ = self
                .send_out(ManagerOutputMessage::Error(ManagerError::Action(
                    "Cannot describe the API before valid device settings are applied".into(),
                )))
                .await;
            return;
        };

        let message = match reconciler.api_information().await {
            Ok(text) => {
                info!("Retrieved API information");
                ManagerOutputMessage::ApiInformation(text)
            }
            Err(e) => ManagerOutputMessage::Error(ManagerError::Device(e)),
        };

        let _ = self.send_out(message).await;
    }

    // Private ------------------------------------------------------------------------------------

    async fn refresh_catalogue(&mut self, kind: AssociationKind) -> Result<(), ManagerError> {
        let Some(reconciler) = self.reconciler.as_mut() else {
            return Err(ManagerError::Action("No TV configured".into()));
        };

        let table = match kind {
            AssociationKind::InputSource => reconciler.refresh_source_list().await?,
            AssociationKind::Application => reconciler.refresh_application_list().await?,
            AssociationKind::RemoteKey => reconciler.refresh_remote_keys().await?,
        };

        self.emit_associations(kind, table).await;

        Ok(())
    }
}

async fn perform(reconciler: &mut DeviceReconciler, action: UserAction) -> Result<(), ManagerError> {
    match action {
        UserAction::SetPowerStatus(state) => reconciler.set_power(state == PowerState::Active).await,
        UserAction::SendRemoteKey(index) => reconciler.send_remote_key_at(index).await,
        UserAction::SelectInputSource(index) => reconciler.select_input_source(index).await,
        UserAction::StartApplication(index) => reconciler.start_application_at(index).await,
        UserAction::SetAudioMute(mute) => reconciler.set_audio_mute(mute).await,
        UserAction::SetSpeakerVolume(volume) => reconciler.set_speaker_volume(volume).await,
        UserAction::SetHeadphoneVolume(volume) => reconciler.set_headphone_volume(volume).await,
        UserAction::RefreshSourceList | UserAction::RefreshApplicationList => Ok(()),
    }
}

// ================================================================================================
// Tests

#[cfg(test)]
mod tests {
    use crate::reconciler::test_helpers::{APPLICATIONS_RESULT, REMOTE_KEYS_RESULT, SOURCES_RESULT};
    use crate::sonytv_manager::test_helpers::{drain, test_manager, test_settings};
    use crate::test_support::{ScriptedPinger, ScriptedTransport};
    use crate::{
        AssociationKind, ConfigurationError, ManagerError, ManagerMessage, ManagerOutputMessage,
        ManagerStatus, PowerState, UserAction,
    };

    const OK: &str = r#"{"result":[],"id":1}"#;
    const STANDBY: &str = r#"{"result":[{"status":"standby"}],"id":1}"#;

    fn transport() -> ScriptedTransport {
        let transport = ScriptedTransport::new();
        transport
            .reply("getPowerStatus", STANDBY)
            .reply("getCurrentExternalInputsStatus", SOURCES_RESULT)
            .reply("getApplicationList", APPLICATIONS_RESULT)
            .reply("getRemoteControllerInfo", REMOTE_KEYS_RESULT)
            .reply("setPlayContent", OK)
            .reply("setAudioVolume", OK)
            .reply("IRCC", "");

        transport
    }

    #[tokio::test]
    async fn negative_indexes_are_ignored() {
        let transport = transport();
        let mut test = test_manager(&transport, ScriptedPinger::reachable());
        test.manager.configure(test_settings()).await.unwrap();
        let calls = transport.requests().len();

        for action in [
            UserAction::SelectInputSource(-1),
            UserAction::StartApplication(-1),
            UserAction::SendRemoteKey(-1),
        ] {
            test.manager.user_action(action).await.unwrap();
        }

        assert_eq!(transport.requests().len(), calls);
    }

    #[tokio::test]
    async fn selecting_an_input_updates_state() {
        let transport = transport();
        let mut test = test_manager(&transport, ScriptedPinger::reachable());
        test.manager.configure(test_settings()).await.unwrap();
        drain(&mut test.from_manager);

        test.manager
            .user_action(UserAction::SelectInputSource(1))
            .await
            .unwrap();

        assert!(transport.requests().last().unwrap().body.contains("extInput:hdmi?port=2"));

        let messages = drain(&mut test.from_manager);
        assert!(matches!(
            messages.as_slice(),
            [ManagerOutputMessage::TvState(state)] if state.input_source == Some(1)
        ));
    }

    #[tokio::test]
    async fn out_of_range_index_is_a_configuration_error() {
        let transport = transport();
        let mut test = test_manager(&transport, ScriptedPinger::reachable());
        test.manager.configure(test_settings()).await.unwrap();

        assert_eq!(
            test.manager.user_action(UserAction::SendRemoteKey(9)).await,
            Err(ManagerError::Configuration(ConfigurationError::IndexOutOfRange(9)))
        );
    }

    #[tokio::test]
    async fn volume_change_is_sent_once() {
        let transport = transport();
        let mut test = test_manager(&transport, ScriptedPinger::reachable());
        test.manager.configure(test_settings()).await.unwrap();
        drain(&mut test.from_manager);

        test.manager
            .user_action(UserAction::SetSpeakerVolume(12))
            .await
            .unwrap();
        test.manager
            .user_action(UserAction::SetSpeakerVolume(12))
            .await
            .unwrap();

        let states: Vec<ManagerOutputMessage> = drain(&mut test.from_manager);
        assert_eq!(states.len(), 1);
        assert!(matches!(
            &states[0],
            ManagerOutputMessage::TvState(state) if state.speaker_volume == Some(12)
        ));
    }

    #[tokio::test]
    async fn failed_power_on_reports_off_and_error() {
        let transport = transport();
        transport.reply("setPowerStatus", r#"{"error":[40000,"Unsupported"],"id":1}"#);

        let mut test = test_manager(&transport, ScriptedPinger::reachable());
        test.manager.configure(test_settings()).await.unwrap();
        drain(&mut test.from_manager);

        test.to_manager
            .send(ManagerMessage::UserAction(UserAction::SetPowerStatus(
                PowerState::Active,
            )))
            .await
            .unwrap();
        test.to_manager.send(ManagerMessage::ShutDown).await.unwrap();
        test.manager.run().await;

        let messages = drain(&mut test.from_manager);

        assert!(messages.contains(&ManagerOutputMessage::Status(ManagerStatus::Inactive)));
        assert!(messages.iter().any(|message| matches!(
            message,
            ManagerOutputMessage::TvState(state) if state.power_status == Some(PowerState::Off)
        )));
        assert!(messages.iter().any(|message| matches!(
            message,
            ManagerOutputMessage::Error(ManagerError::Device(_))
        )));
    }

    #[tokio::test]
    async fn refresh_actions_send_tables() {
        let transport = transport();
        let mut test = test_manager(&transport, ScriptedPinger::reachable());
        test.manager.configure(test_settings()).await.unwrap();
        drain(&mut test.from_manager);

        test.manager
            .user_action(UserAction::RefreshApplicationList)
            .await
            .unwrap();

        assert!(matches!(
            drain(&mut test.from_manager).as_slice(),
            [ManagerOutputMessage::Associations(AssociationKind::Application, table)]
                if table.label_of(1) == Some("Tom & Jerry")
        ));
    }

    #[tokio::test]
    async fn describe_api_before_configuration_is_an_error() {
        let transport = ScriptedTransport::new();
        let mut test = test_manager(&transport, ScriptedPinger::reachable());

        test.manager.describe_api().await;

        assert!(matches!(
            drain(&mut test.from_manager).as_slice(),
            [ManagerOutputMessage::Error(ManagerError::Action(_))]
        ));
    }
}
