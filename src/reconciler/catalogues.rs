use std::fmt::Write;

use log::{info, warn};
use serde_json::Value;

use crate::associations::{build_association_table, AssociationKind, AssociationTable};
use crate::error::{ManagerError, RpcError};
use crate::rpc_client::{CallOptions, RpcOutcome};
use crate::rpc_payloads::{
    result_item, ApplicationItem, ExternalInputStatus, RemoteKey, SourceItem, SystemInformation,
};
use crate::tv_commands::TvCommand;

use super::DeviceReconciler;

/// URI schemes of physical inputs. Other external inputs (screen mirroring, etc) are skipped.
const PHYSICAL_INPUT_SCHEMES: [&str; 3] = ["extInput:hdmi", "extInput:composite", "extInput:component"];

// ------------------------------------------------------------------------------------------------
// Device lists (inputs, applications, remote keys) and API description.
// ------------------------------------------------------------------------------------------------

impl DeviceReconciler {
    /// Fetch the physical inputs, cache them, and build their association table.
    pub async fn refresh_source_list(&mut self) -> Result<AssociationTable, ManagerError> {
        let result = self
            .client
            .call_for_result(&TvCommand::GetCurrentExternalInputsStatus, CallOptions::STRICT)
            .await?;

        let sources: Vec<SourceItem> = result_item::<Vec<ExternalInputStatus>>(&result, 0)?
            .into_iter()
            .filter(|input| is_physical_input(&input.uri))
            .map(|input| SourceItem {
                title: input.title,
                uri: input.uri,
            })
            .collect();

        self.cache.set_source_list(&sources)?;
        info!("Source list updated: {} inputs", sources.len());

        Ok(self.association_table(AssociationKind::InputSource))
    }

    /// Fetch the installed applications, cache them, and build their association table.
    pub async fn refresh_application_list(&mut self) -> Result<AssociationTable, ManagerError> {
        let result = self
            .client
            .call_for_result(&TvCommand::GetApplicationList, CallOptions::STRICT)
            .await?;

        let applications: Vec<ApplicationItem> = result_item(&result, 0)?;

        self.cache.set_application_list(&applications)?;
        info!("Application list updated: {} applications", applications.len());

        Ok(self.association_table(AssociationKind::Application))
    }

    /// Fetch the remote-control key catalogue, cache it, and build its association table.
    pub async fn refresh_remote_keys(&mut self) -> Result<AssociationTable, ManagerError> {
        let result = self
            .client
            .call_for_result(&TvCommand::GetRemoteControllerInfo, CallOptions::STRICT)
            .await?;

        // result[0] describes the remote bundle; the keys follow
        let keys: Vec<RemoteKey> = result_item(&result, 1)?;

        self.cache.set_remote_keys(&keys)?;
        info!("Remote key list updated: {} keys", keys.len());

        Ok(self.association_table(AssociationKind::RemoteKey))
    }

    /// Build the association table of a cached list. An uncached list yields only the sentinel.
    pub fn association_table(&self, kind: AssociationKind) -> AssociationTable {
        let cap = self.settings.max_associations;

        match kind {
            AssociationKind::InputSource => build_association_table(
                kind,
                &self.cache.source_list().unwrap_or_default(),
                cap,
            ),
            AssociationKind::Application => build_association_table(
                kind,
                &self.cache.application_list().unwrap_or_default(),
                cap,
            ),
            AssociationKind::RemoteKey => build_association_table(
                kind,
                &self.cache.remote_keys().unwrap_or_default(),
                cap,
            ),
        }
    }

    /// Describe the TV model and every API method it offers, one service at a time.
    pub async fn api_information(&self) -> Result<String, RpcError> {
        let result = self
            .client
            .call_for_result(&TvCommand::GetSystemInformation, CallOptions::STRICT)
            .await?;
        let system_information: SystemInformation = result_item(&result, 0)?;

        let protocols = self
            .client
            .call_for_result(&TvCommand::GetServiceProtocols, CallOptions::STRICT)
            .await?;

        let mut text = String::new();
        let _ = writeln!(text, "Model: {}", system_information.model);

        for service in protocols
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|protocol| protocol.get(0).and_then(Value::as_str))
        {
            let _ = writeln!(text, "\n{}", service);

            match self
                .client
                .call(&TvCommand::GetMethodTypes(service.to_string()), CallOptions::METHOD_TYPES)
                .await
            {
                Ok(RpcOutcome::Result(methods)) => {
                    for line in methods.as_array().into_iter().flatten().filter_map(describe_method) {
                        let _ = writeln!(text, "  {}", line);
                    }
                }
                Ok(RpcOutcome::Ignored { .. }) => {
                    let _ = writeln!(text, "  (no method list)");
                }
                Err(e) => {
                    warn!("Could not list methods of '{}': {}", service, e);
                    let _ = writeln!(text, "  (error: {})", e);
                }
            }
        }

        Ok(text)
    }
}

fn is_physical_input(uri: &str) -> bool {
    let scheme = uri.split('?').next().unwrap_or_default();
    PHYSICAL_INPUT_SCHEMES.contains(&scheme)
}

/// Render one `getMethodTypes` entry (`[name, [params], [returns], version]`).
fn describe_method(method: &Value) -> Option<String> {
    let name = method.get(0)?.as_str()?;

    if name == "getMethodTypes" || name == "getVersions" {
        return None;
    }

    let join = |value: Option<&Value>| -> String {
        value
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default()
    };

    let version = method.get(3).and_then(Value::as_str).unwrap_or_default();

    Some(format!(
        "{}({}): {} - Version: {}",
        name,
        join(method.get(1)),
        join(method.get(2)),
        version
    ))
}

// ================================================================================================
// Tests
