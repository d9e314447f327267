use log::{debug, warn};
use serde_json::Value;

use crate::associations::NONE_SELECTED_VALUE;
use crate::error::RpcError;
use crate::rpc_client::{CallOptions, RpcOutcome};
use crate::rpc_payloads::{result_item, PlayingContentInfo, VolumeInformation};
use crate::tv_commands::TvCommand;

use super::DeviceReconciler;

// ------------------------------------------------------------------------------------------------
// Refreshes run while the TV is active.
// ------------------------------------------------------------------------------------------------

impl DeviceReconciler {
    /// Read mute and volume for every audio output.
    pub async fn refresh_volume(&mut self) -> Result<(), RpcError> {
        let result = self
            .client
            .call_for_result(&TvCommand::GetVolumeInformation, CallOptions::STRICT)
            .await?;

        let entries: Vec<Value> = result_item(&result, 0)?;

        for entry in entries {
            let info = match serde_json::from_value::<VolumeInformation>(entry.clone()) {
                Ok(info) => info,
                Err(e) => {
                    warn!("Skipping unreadable volume entry {} ({})", entry, e);
                    continue;
                }
            };

            let volume = info.volume.clamp(0, u8::MAX as i64) as u8;

            match info.target.as_str() {
                "speaker" => {
                    self.state.audio_mute = Some(info.mute);
                    self.state.speaker_volume = Some(volume);
                }
                "headphone" => {
                    self.state.audio_mute = Some(info.mute);
                    self.state.headphone_volume = Some(volume);
                }
                other => warn!("Unknown volume target '{}'", other),
            }
        }

        Ok(())
    }

    /// Match the currently playing URI against the cached source list.
    ///
    /// The input index is set to `-1` whenever the current input cannot be determined. A match
    /// also clears the application selection.
    pub async fn refresh_input_source(&mut self) -> Result<(), RpcError> {
        let playing_uri = match self
            .client
            .call(&TvCommand::GetPlayingContentInfo, CallOptions::CONTENT_INFO)
            .await
        {
            Ok(RpcOutcome::Result(result)) => match result_item::<PlayingContentInfo>(&result, 0) {
                Ok(info) => Some(info.uri),
                Err(e) => {
                    self.state.input_source = Some(NONE_SELECTED_VALUE);
                    return Err(e);
                }
            },
            Ok(RpcOutcome::Ignored { code, .. }) => {
                debug!("No playing content (error {})", code);
                None
            }
            Err(e) => {
                self.state.input_source = Some(NONE_SELECTED_VALUE);
                return Err(e);
            }
        };

        let index = playing_uri.and_then(|uri| {
            self.cache
                .source_list()
                .and_then(|sources| sources.iter().position(|source| source.uri == uri))
        });

        match index {
            Some(index) => {
                self.state.input_source = Some(index as i64);
                self.state.application = Some(NONE_SELECTED_VALUE);
            }
            None => self.state.input_source = Some(NONE_SELECTED_VALUE),
        }

        Ok(())
    }
}

// ================================================================================================
// Tests

#[cfg(test)]
mod tests {
    use crate::error::{RpcError, TransportErrorKind};
    use crate::reconciler::test_helpers::{test_reconciler, SOURCES_RESULT};
    use crate::rpc_payloads::SourceItem;
    use crate::test_support::{ScriptedPinger, ScriptedTransport};

    fn sources() -> Vec<SourceItem> {
        vec![
            SourceItem {
                title: "HDMI 1".into(),
                uri: "extInput:hdmi?port=1".into(),
            },
            SourceItem {
                title: "HDMI 2".into(),
                uri: "extInput:hdmi?port=2".into(),
            },
        ]
    }

    #[tokio::test]
    async fn volume_targets_update_observables() {
        let transport = ScriptedTransport::new();
        transport.reply(
            "getVolumeInformation",
            r#"{"result":[[
                {"target":"speaker","volume":18,"mute":false,"maxVolume":100,"minVolume":0},
                {"target":"headphone","volume":7,"mute":false,"maxVolume":100,"minVolume":0},
                {"target":"subwoofer","volume":3,"mute":false}
            ]],"id":1}"#,
        );

        let mut reconciler = test_reconciler(&transport, ScriptedPinger::reachable());
        reconciler.refresh_volume().await.unwrap();

        assert_eq!(reconciler.state().speaker_volume, Some(18));
        assert_eq!(reconciler.state().headphone_volume, Some(7));
        assert_eq!(reconciler.state().audio_mute, Some(false));
    }

    #[tokio::test]
    async fn volume_refresh_failure_leaves_state() {
        let transport = ScriptedTransport::new();
        transport.reply("getVolumeInformation", r#"{"error":[40005,"Display Is Turned off"],"id":1}"#);

        let mut reconciler = test_reconciler(&transport, ScriptedPinger::reachable());

        assert!(matches!(
            reconciler.refresh_volume().await,
            Err(RpcError::Protocol { code: 40005, .. })
        ));
        assert_eq!(reconciler.state().speaker_volume, None);
    }

    #[tokio::test]
    async fn matching_input_clears_application() {
        let transport = ScriptedTransport::new();
        transport.reply(
            "getPlayingContentInfo",
            r#"{"result":[{"uri":"extInput:hdmi?port=2","source":"extInput:hdmi","title":"HDMI 2"}],"id":1}"#,
        );

        let mut reconciler = test_reconciler(&transport, ScriptedPinger::reachable());
        reconciler.cache.set_source_list(&sources()).unwrap();
        reconciler.state.application = Some(3);

        reconciler.refresh_input_source().await.unwrap();

        assert_eq!(reconciler.state().input_source, Some(1));
        assert_eq!(reconciler.state().application, Some(-1));
    }

    #[tokio::test]
    async fn unmatched_input_is_none_selected() {
        let transport = ScriptedTransport::new();
        transport.reply(
            "getPlayingContentInfo",
            r#"{"result":[{"uri":"tv:dvbt?trip=1.2.3","source":"tv:dvbt"}],"id":1}"#,
        );

        let mut reconciler = test_reconciler(&transport, ScriptedPinger::reachable());
        reconciler.cache.set_source_list(&sources()).unwrap();
        reconciler.state.input_source = Some(0);
        reconciler.state.application = Some(3);

        reconciler.refresh_input_source().await.unwrap();

        assert_eq!(reconciler.state().input_source, Some(-1));
        assert_eq!(reconciler.state().application, Some(3));
    }

    #[tokio::test]
    async fn illegal_state_and_failures_are_none_selected() {
        let transport = ScriptedTransport::new();
        transport.reply("getPlayingContentInfo", r#"{"error":[7,"Illegal State"],"id":1}"#);

        let mut reconciler = test_reconciler(&transport, ScriptedPinger::reachable());
        reconciler.cache.set_source_list(&sources()).unwrap();
        reconciler.state.input_source = Some(0);

        reconciler.refresh_input_source().await.unwrap();
        assert_eq!(reconciler.state().input_source, Some(-1));

        let failing = ScriptedTransport::new();
        failing.fail("getPlayingContentInfo", TransportErrorKind::Connect);

        let mut reconciler = test_reconciler(&failing, ScriptedPinger::reachable());
        reconciler.state.input_source = Some(0);

        assert!(reconciler.refresh_input_source().await.is_err());
        assert_eq!(reconciler.state().input_source, Some(-1));
    }

    #[tokio::test]
    async fn input_without_source_list_is_none_selected() {
        let transport = ScriptedTransport::new();
        transport
            .reply(
                "getPlayingContentInfo",
                r#"{"result":[{"uri":"extInput:hdmi?port=1"}],"id":1}"#,
            )
            .reply("getCurrentExternalInputsStatus", SOURCES_RESULT);

        let mut reconciler = test_reconciler(&transport, ScriptedPinger::reachable());

        reconciler.refresh_input_source().await.unwrap();
        assert_eq!(reconciler.state().input_source, Some(-1));

        // Once the list is known the same URI resolves
        reconciler.refresh_source_list().await.unwrap();
        reconciler.refresh_input_source().await.unwrap();
        assert_eq!(reconciler.state().input_source, Some(0));
    }
}
