use std::future::pending;
use std::time::Duration;

use log::{debug, info};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::reconciler::PowerStatusOutcome;
use crate::{ManagerStatus, PowerState};

use super::SonyTvManager;

// ------------------------------------------------------------------------------------------------
// Periodic polling of the TV.
// ------------------------------------------------------------------------------------------------

impl SonyTvManager {
    /// Poll the TV once.
    ///
    /// Does nothing while the caller is not ready or no valid settings have been applied. A TV
    /// which is still booting leaves all state untouched. Otherwise the power status is updated,
    /// and an active TV also has its volume and current input refreshed.
    pub async fn tick(&mut self) {
        if !self.is_host_ready {
            debug!("Skipping poll: caller not ready");
            return;
        }

        if !self.is_configured() {
            return;
        }

        let Some(reconciler) = self.reconciler.as_mut() else {
            return;
        };

        let state = match reconciler.determine_power_status().await {
            PowerStatusOutcome::PendingBoot => {
                debug!("TV is booting; keeping the current state");
                return;
            }
            PowerStatusOutcome::Determined(state) => state,
        };

        reconciler.apply_power_state(state);

        if state == PowerState::Active {
            // Failures are logged by the RPC client; the next poll tries again
            if let Err(e) = reconciler.refresh_volume().await {
                debug!("Volume refresh failed: {}", e);
            }

            if let Err(e) = reconciler.refresh_input_source().await {
                debug!("Input refresh failed: {}", e);
            }
        }

        self.set_manager_status(status_for_power(state)).await;
        self.emit_tv_state_if_changed().await;
    }

    /// Pause or resume polling on behalf of the caller.
    pub(crate) fn set_host_ready(&mut self, is_ready: bool) {
        if is_ready != self.is_host_ready {
            info!("Caller is {}ready for polling", if is_ready { "" } else { "not " });
        }

        self.is_host_ready = is_ready;
    }

    /// Poll every `period`, starting one period from now. A zero period disables polling.
    pub(crate) fn start_polling(&mut self, period: Duration) {
        if period.is_zero() {
            debug!("Polling disabled");
            self.poll_interval = None;
            return;
        }

        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.poll_interval = Some(interval);
    }
}

pub(crate) fn status_for_power(state: PowerState) -> ManagerStatus {
    match state {
        PowerState::Off => ManagerStatus::Inactive,
        PowerState::Standby | PowerState::Active => ManagerStatus::Active,
    }
}

/// Resolves at the next poll time; never resolves while polling is disabled.
pub(crate) async fn next_poll(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending::<()>().await,
    }
}

// ================================================================================================
// Tests

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::error::TransportErrorKind;
    use crate::sonytv_manager::test_helpers::{drain, test_manager, test_settings};
    use crate::test_support::{ScriptedPinger, ScriptedTransport};
    use crate::{ManagerOutputMessage, ManagerStatus, PowerState};

    use super::next_poll;

    const ACTIVE: &str = r#"{"result":[{"status":"active"}],"id":1}"#;
    const STANDBY: &str = r#"{"result":[{"status":"standby"}],"id":1}"#;
    const VOLUME: &str = r#"{"result":[[{"target":"speaker","volume":21,"mute":false}]],"id":1}"#;
    const PLAYING: &str = r#"{"result":[{"uri":"extInput:hdmi?port=2","source":"extInput:hdmi"}],"id":1}"#;
    const SOURCES: &str = r#"{"result":[[
        {"uri":"extInput:hdmi?port=1","title":"HDMI 1"},
        {"uri":"extInput:hdmi?port=2","title":"HDMI 2"}
    ]],"id":1}"#;

    #[tokio::test]
    async fn standby_updates_power_only() {
        let transport = ScriptedTransport::new();
        transport.reply("getPowerStatus", STANDBY);

        let mut test = test_manager(&transport, ScriptedPinger::reachable());
        test.manager.configure(test_settings()).await.unwrap();
        drain(&mut test.from_manager);

        test.manager.tick().await;

        assert_eq!(transport.count("getVolumeInformation"), 0);
        assert_eq!(transport.count("getPlayingContentInfo"), 0);

        // Nothing changed since the configure poll
        assert!(drain(&mut test.from_manager).is_empty());
    }

    #[tokio::test]
    async fn active_refreshes_volume_and_input() {
        let transport = ScriptedTransport::new();
        transport
            .reply("getPowerStatus", ACTIVE)
            .reply("getVolumeInformation", VOLUME)
            .reply("getPlayingContentInfo", PLAYING)
            .reply("getCurrentExternalInputsStatus", SOURCES);

        let mut test = test_manager(&transport, ScriptedPinger::reachable());
        test.manager.configure(test_settings()).await.unwrap();

        // The configure poll ran before the source list was known
        assert_eq!(test.manager.tv_state().unwrap().input_source, Some(-1));
        drain(&mut test.from_manager);

        test.manager.tick().await;

        let state = test.manager.tv_state().unwrap().clone();
        assert_eq!(state.power_status, Some(PowerState::Active));
        assert_eq!(state.speaker_volume, Some(21));
        assert_eq!(state.input_source, Some(1));
        assert_eq!(state.application, Some(-1));

        assert_eq!(
            drain(&mut test.from_manager),
            vec![ManagerOutputMessage::TvState(state)]
        );

        // Same answers again; no new output
        test.manager.tick().await;
        assert!(drain(&mut test.from_manager).is_empty());
    }

    #[tokio::test]
    async fn pending_boot_emits_nothing() {
        let transport = ScriptedTransport::new();
        transport
            .reply("getPowerStatus", STANDBY)
            .reply("getPowerStatus", r#"{"error":[404,"Not Found"],"id":1}"#);

        let mut test = test_manager(&transport, ScriptedPinger::reachable());
        test.manager.configure(test_settings()).await.unwrap();
        drain(&mut test.from_manager);

        test.manager.tick().await;

        assert!(drain(&mut test.from_manager).is_empty());
        assert_eq!(
            test.manager.tv_state().unwrap().power_status,
            Some(PowerState::Standby)
        );
        assert_eq!(test.manager.status(), &ManagerStatus::Active);
    }

    #[tokio::test]
    async fn tv_going_away_is_inactive() {
        let transport = ScriptedTransport::new();
        transport
            .reply("getPowerStatus", STANDBY)
            .fail("getPowerStatus", TransportErrorKind::Connect);

        let mut test = test_manager(&transport, ScriptedPinger::reachable());
        test.manager.configure(test_settings()).await.unwrap();
        drain(&mut test.from_manager);

        test.manager.tick().await;

        let messages = drain(&mut test.from_manager);
        assert_eq!(messages[0], ManagerOutputMessage::Status(ManagerStatus::Inactive));
        assert!(matches!(
            &messages[1],
            ManagerOutputMessage::TvState(state) if state.power_status == Some(PowerState::Off)
        ));
    }

    #[tokio::test]
    async fn caller_not_ready_skips_polls() {
        let transport = ScriptedTransport::new();
        transport.reply("getPowerStatus", STANDBY);

        let mut test = test_manager(&transport, ScriptedPinger::reachable());
        test.manager.set_host_ready(false);
        test.manager.configure(test_settings()).await.unwrap();

        assert!(transport.requests().is_empty());

        test.manager.set_host_ready(true);
        test.manager.tick().await;

        assert_eq!(transport.count("getPowerStatus"), 1);
    }

    #[tokio::test]
    async fn polling_interval() {
        let transport = ScriptedTransport::new();
        let mut test = test_manager(&transport, ScriptedPinger::reachable());

        test.manager.start_polling(Duration::ZERO);
        assert!(test.manager.poll_interval.is_none());

        test.manager.start_polling(Duration::from_millis(10));
        assert!(test.manager.poll_interval.is_some());

        tokio::time::timeout(
            Duration::from_secs(5),
            next_poll(&mut test.manager.poll_interval),
        )
        .await
        .unwrap();
    }
}
