//! JSON-RPC calls to a single TV.
//!
//! Every call site passes [`CallOptions`] naming the transport failures and device error codes it
//! expects. An expected device error comes back as [`RpcOutcome::Ignored`]; an unexpected one is
//! an [`RpcError::Protocol`].

use std::sync::Arc;

use log::{debug, error, info};
use serde_json::Value;

use crate::error::{RpcError, TransportErrorKind};
use crate::rpc_payloads::{parse_reply, RpcReply};
use crate::transport::{Transport, TransportRequest};
use crate::tv_commands::TvCommand;

pub(crate) const ERROR_ILLEGAL_STATE: i64 = 7;
pub(crate) const ERROR_FORBIDDEN: i64 = 403;
pub(crate) const ERROR_NOT_FOUND: i64 = 404;

const IRCC_PATH: &str = "IRCC";
const IRCC_SOAP_ACTION: &str = "\"urn:schemas-sony-com:service:IRCC:1#X_SendIRCC\"";

/// Failures a call site is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallOptions {
    pub ignored_transport_errors: &'static [TransportErrorKind],
    pub ignored_error_codes: &'static [i64],
}

impl CallOptions {
    pub const STRICT: CallOptions = CallOptions {
        ignored_transport_errors: &[],
        ignored_error_codes: &[],
    };

    /// `system.getPowerStatus` while polling; booting TVs time out or answer 404.
    pub const POWER_STATUS: CallOptions = CallOptions {
        ignored_transport_errors: &[TransportErrorKind::Timeout],
        ignored_error_codes: &[ERROR_NOT_FOUND],
    };

    /// Content query used to double-check an "active" answer shortly after a failure.
    pub const BOOT_PROBE: CallOptions = CallOptions {
        ignored_transport_errors: &[TransportErrorKind::Timeout],
        ignored_error_codes: &[ERROR_ILLEGAL_STATE, ERROR_FORBIDDEN],
    };

    /// Content query while refreshing the current input.
    pub const CONTENT_INFO: CallOptions = CallOptions {
        ignored_transport_errors: &[],
        ignored_error_codes: &[ERROR_ILLEGAL_STATE, ERROR_FORBIDDEN],
    };

    pub const SET_POWER: CallOptions = CallOptions {
        ignored_transport_errors: &[TransportErrorKind::Timeout],
        ignored_error_codes: &[],
    };

    pub const METHOD_TYPES: CallOptions = CallOptions {
        ignored_transport_errors: &[],
        ignored_error_codes: &[ERROR_NOT_FOUND],
    };
}

/// Outcome of a call that reached the device and produced a valid envelope.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RpcOutcome {
    Result(Value),
    Ignored { code: i64, message: String },
}

pub(crate) struct RpcClient {
    transport: Arc<dyn Transport>,
    host: String,
    psk: String,
    rpc_id: u64,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn Transport>, host: &str, psk: &str, rpc_id: u64) -> Self {
        RpcClient {
            transport,
            host: host.to_string(),
            psk: psk.to_string(),
            rpc_id,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Invoke `command`, classifying device errors against `options`.
    pub async fn call(
        &self,
        command: &TvCommand,
        options: CallOptions,
    ) -> Result<RpcOutcome, RpcError> {
        let request = TransportRequest {
            host: self.host.clone(),
            path: command.service().to_string(),
            headers: self.json_headers(),
            body: command.payload(self.rpc_id),
            ignored_errors: options.ignored_transport_errors.to_vec(),
        };

        let body = self.transport.post(&request).await?;

        match parse_reply(&body) {
            Ok(RpcReply::Result(result)) => Ok(RpcOutcome::Result(result)),
            Ok(RpcReply::Error { code, message }) => {
                if options.ignored_error_codes.contains(&code) {
                    debug!("{} answered with ignored error {}: {}", command, code, &message);
                    Ok(RpcOutcome::Ignored { code, message })
                } else {
                    info!("{} answered with error {}: {}", command, code, &message);
                    Err(RpcError::Protocol { code, message })
                }
            }
            Err(e) => {
                error!("{} :: {}", command, e);
                Err(e)
            }
        }
    }

    /// Invoke `command` and require a `result`. Ignored device errors are reported as protocol
    /// errors.
    pub async fn call_for_result(
        &self,
        command: &TvCommand,
        options: CallOptions,
    ) -> Result<Value, RpcError> {
        match self.call(command, options).await? {
            RpcOutcome::Result(result) => Ok(result),
            RpcOutcome::Ignored { code, message } => Err(RpcError::Protocol { code, message }),
        }
    }

    /// Send an infrared remote-control code through the IRCC SOAP endpoint. The response body
    /// carries nothing of interest, so only transport success is checked.
    pub async fn send_ircc(&self, code: &str) -> Result<(), RpcError> {
        let request = TransportRequest {
            host: self.host.clone(),
            path: IRCC_PATH.to_string(),
            headers: vec![
                ("X-Auth-PSK".to_string(), self.psk.clone()),
                (
                    "Content-Type".to_string(),
                    "text/xml; charset=UTF-8".to_string(),
                ),
                ("SOAPAction".to_string(), IRCC_SOAP_ACTION.to_string()),
            ],
            body: ircc_envelope(code),
            ignored_errors: vec![],
        };

        self.transport.post(&request).await?;

        Ok(())
    }

    fn json_headers(&self) -> Vec<(String, String)> {
        vec![
            ("Accept".to_string(), "*/*".to_string()),
            ("Cache-Control".to_string(), "no-cache".to_string()),
            ("Connection".to_string(), "close".to_string()),
            (
                "Content-Type".to_string(),
                "application/json; charset=UTF-8".to_string(),
            ),
            ("Pragma".to_string(), "no-cache".to_string()),
            ("X-Auth-PSK".to_string(), self.psk.clone()),
        ]
    }
}

pub(crate) fn ircc_envelope(code: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">"#,
            r#"<s:Body><u:X_SendIRCC xmlns:u="urn:schemas-sony-com:service:IRCC:1">"#,
            "<IRCCCode>{}</IRCCCode>",
            "</u:X_SendIRCC></s:Body></s:Envelope>"
        ),
        code
    )
}

// ================================================================================================
// Tests
