//! Message payloads for the Sony REST (JSON-RPC) protocol.
//!
//! Every call is a POST of an [`RpcRequest`] envelope to `http://{host}/sony/{service}`. A TV
//! answers either with `{"result": [...], "id": n}` or with `{"error": [code, message], "id": n}`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::associations::Labelled;
use crate::error::RpcError;

pub(crate) const RPC_VERSION: &str = "1.0";

// ------------------------------------------------------------------------------------------------
// Requests

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct RpcRequest {
    pub method: String,
    pub params: Value,
    pub id: u64,
    pub version: String,
}

// ------------------------------------------------------------------------------------------------
// Responses

/// A well-formed response envelope.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RpcReply {
    Result(Value),
    Error { code: i64, message: String },
}

/// Parse a raw response body into an [`RpcReply`].
///
/// An `error` member wins over a `result` member. Anything that is not an object with one of the
/// two is a data-integrity failure.
pub(crate) fn parse_reply(body: &str) -> Result<RpcReply, RpcError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| RpcError::DataIntegrity(format!("invalid JSON ({}): {}", e, body)))?;

    let Value::Object(envelope) = value else {
        return Err(RpcError::DataIntegrity(format!("not an object: {}", body)));
    };

    if let Some(error) = envelope.get("error") {
        let code = error.get(0).and_then(Value::as_i64).ok_or_else(|| {
            RpcError::DataIntegrity(format!("malformed error member: {}", error))
        })?;

        let message = error
            .get(1)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        return Ok(RpcReply::Error { code, message });
    }

    // The guide service answers with "results"
    match envelope.get("result").or_else(|| envelope.get("results")) {
        Some(result) => Ok(RpcReply::Result(result.clone())),
        None => Err(RpcError::DataIntegrity(format!(
            "neither result nor error in response: {}",
            body
        ))),
    }
}

/// Deserialize `result[index]` into `T`.
pub(crate) fn result_item<T>(result: &Value, index: usize) -> Result<T, RpcError>
where
    T: for<'de> Deserialize<'de>,
{
    let item = result
        .get(index)
        .ok_or_else(|| RpcError::DataIntegrity(format!("missing result[{}]: {}", index, result)))?;

    serde_json::from_value(item.clone())
        .map_err(|e| RpcError::DataIntegrity(format!("unexpected result[{}] ({}): {}", index, e, item)))
}

// Payloads ---------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct PowerStatusPayload {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VolumeInformation {
    pub target: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub volume: i64,
    #[serde(default)]
    pub mute: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct PlayingContentInfo {
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct ExternalInputStatus {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct SystemInformation {
    #[serde(default)]
    pub model: String,
}

/// A physical input of the TV.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SourceItem {
    pub title: String,
    pub uri: String,
}

/// An application installed on the TV.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ApplicationItem {
    pub title: String,
    pub uri: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// A remote-control key and its IRCC code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct RemoteKey {
    pub name: String,
    pub value: String,
}

impl Labelled for SourceItem {
    fn label(&self) -> &str {
        &self.title
    }
}

impl Labelled for ApplicationItem {
    fn label(&self) -> &str {
        &self.title
    }
}

impl Labelled for RemoteKey {
    fn label(&self) -> &str {
        &self.name
    }
}

/// Some firmware reports volumes as strings.
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("not an integer: {}", number))),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("not an integer: {}", text))),
        other => Err(serde::de::Error::custom(format!("not an integer: {}", other))),
    }
}

// ================================================================================================
// Tests
