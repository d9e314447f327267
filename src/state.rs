use std::fmt;

use serde::{Deserialize, Serialize};

/// Externally visible power state of a TV.
///
/// `Off` covers both "switched off" and "not reachable on the network".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum PowerState {
    Off = 0,
    Standby = 1,
    Active = 2,
}

impl From<PowerState> for i64 {
    fn from(state: PowerState) -> Self {
        state as i64
    }
}

impl TryFrom<i64> for PowerState {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PowerState::Off),
            1 => Ok(PowerState::Standby),
            2 => Ok(PowerState::Active),
            other => Err(format!("Invalid power state: {}", other)),
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Off => write!(f, "off"),
            PowerState::Standby => write!(f, "standby"),
            PowerState::Active => write!(f, "active"),
        }
    }
}

/// Current TV state for the managed Sony TV.
///
/// Index fields refer to the association tables of the matching device list; `-1` means nothing
/// is selected or the current selection is unknown.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct TvState {
    pub power_status: Option<PowerState>,
    pub audio_mute: Option<bool>,
    pub speaker_volume: Option<u8>,
    pub headphone_volume: Option<u8>,
    pub input_source: Option<i64>,
    pub application: Option<i64>,
    pub remote_key: Option<i64>,
}

// ================================================================================================
// Tests

#[cfg(test)]
mod tests {
    use super::{PowerState, TvState};

    #[test]
    fn tv_state_default() {
        assert_eq!(
            TvState::default(),
            TvState {
                power_status: None,
                audio_mute: None,
                speaker_volume: None,
                headphone_volume: None,
                input_source: None,
                application: None,
                remote_key: None,
            }
        );
    }

    #[test]
    fn power_state_values() {
        assert_eq!(i64::from(PowerState::Off), 0);
        assert_eq!(i64::from(PowerState::Standby), 1);
        assert_eq!(i64::from(PowerState::Active), 2);

        assert_eq!(PowerState::try_from(2), Ok(PowerState::Active));
        assert!(PowerState::try_from(3).is_err());

        assert_eq!(serde_json::to_string(&PowerState::Standby).unwrap(), "1");
        assert_eq!(
            serde_json::from_str::<PowerState>("0").unwrap(),
            PowerState::Off
        );
    }
}
