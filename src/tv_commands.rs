//! Sony TV REST commands.
//!
//! Each [`TvCommand`] knows which service endpoint it is posted to, the JSON-RPC method name, and
//! its parameters. The request envelope is rendered with [`TvCommand::payload`].

use std::fmt;

use serde_json::{json, Value};

use crate::rpc_payloads::{RpcRequest, RPC_VERSION};

/// Audio output targeted by a volume change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeTarget {
    Speaker,
    Headphone,
}

impl VolumeTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeTarget::Speaker => "speaker",
            VolumeTarget::Headphone => "headphone",
        }
    }
}

/// Sony REST commands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TvCommand {
    /// `appControl.getApplicationList`
    GetApplicationList,
    /// `avContent.getCurrentExternalInputsStatus`
    GetCurrentExternalInputsStatus,
    /// `guide.getMethodTypes` on the given service.
    GetMethodTypes(String),
    /// `avContent.getPlayingContentInfo`
    GetPlayingContentInfo,
    /// `system.getPowerStatus`
    GetPowerStatus,
    /// `system.getRemoteControllerInfo`
    GetRemoteControllerInfo,
    /// `guide.getServiceProtocols`
    GetServiceProtocols,
    /// `system.getSystemInformation`
    GetSystemInformation,
    /// `audio.getVolumeInformation`
    GetVolumeInformation,
    /// `appControl.setActiveApp` with the application URI.
    SetActiveApp(String),
    /// `audio.setAudioMute` (`true` is muted).
    SetAudioMute(bool),
    /// `audio.setAudioVolume` for one output.
    SetAudioVolume(VolumeTarget, u8),
    /// `avContent.setPlayContent` with the source URI.
    SetPlayContent(String),
    /// `system.setPowerStatus` (`true` is on).
    SetPowerStatus(bool),
}

impl TvCommand {
    /// Service endpoint below `/sony/`.
    pub fn service(&self) -> &str {
        match self {
            TvCommand::GetApplicationList | TvCommand::SetActiveApp(_) => "appControl",
            TvCommand::GetCurrentExternalInputsStatus
            | TvCommand::GetPlayingContentInfo
            | TvCommand::SetPlayContent(_) => "avContent",
            TvCommand::GetMethodTypes(service) => service,
            TvCommand::GetPowerStatus
            | TvCommand::GetRemoteControllerInfo
            | TvCommand::GetSystemInformation
            | TvCommand::SetPowerStatus(_) => "system",
            TvCommand::GetServiceProtocols => "guide",
            TvCommand::GetVolumeInformation
            | TvCommand::SetAudioMute(_)
            | TvCommand::SetAudioVolume(_, _) => "audio",
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            TvCommand::GetApplicationList => "getApplicationList",
            TvCommand::GetCurrentExternalInputsStatus => "getCurrentExternalInputsStatus",
            TvCommand::GetMethodTypes(_) => "getMethodTypes",
            TvCommand::GetPlayingContentInfo => "getPlayingContentInfo",
            TvCommand::GetPowerStatus => "getPowerStatus",
            TvCommand::GetRemoteControllerInfo => "getRemoteControllerInfo",
            TvCommand::GetServiceProtocols => "getServiceProtocols",
            TvCommand::GetSystemInformation => "getSystemInformation",
            TvCommand::GetVolumeInformation => "getVolumeInformation",
            TvCommand::SetActiveApp(_) => "setActiveApp",
            TvCommand::SetAudioMute(_) => "setAudioMute",
            TvCommand::SetAudioVolume(_, _) => "setAudioVolume",
            TvCommand::SetPlayContent(_) => "setPlayContent",
            TvCommand::SetPowerStatus(_) => "setPowerStatus",
        }
    }

    pub fn params(&self) -> Value {
        match self {
            TvCommand::GetMethodTypes(_) => json!([""]),
            TvCommand::SetActiveApp(uri) | TvCommand::SetPlayContent(uri) => json!([{ "uri": uri }]),
            TvCommand::SetAudioMute(status) | TvCommand::SetPowerStatus(status) => {
                json!([{ "status": status }])
            }
            TvCommand::SetAudioVolume(target, volume) => json!([{
                "target": target.as_str(),
                "volume": volume.to_string(),
            }]),
            _ => json!([]),
        }
    }

    pub(crate) fn request(&self, id: u64) -> RpcRequest {
        RpcRequest {
            method: self.method().to_string(),
            params: self.params(),
            id,
            version: RPC_VERSION.to_string(),
        }
    }

    /// Render the JSON-RPC request envelope for this command.
    pub fn payload(&self, id: u64) -> String {
        serde_json::to_string(&self.request(id)).unwrap_or_else(|_| String::new())
    }
}

impl fmt::Display for TvCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.service(), self.method())
    }
}

// ================================================================================================
// Tests
