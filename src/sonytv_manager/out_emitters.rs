use crate::associations::{build_association_table, AssociationKind, AssociationTable};
use crate::rpc_payloads::SourceItem;
use crate::ManagerOutputMessage;

use super::SonyTvManager;

const ALL_ASSOCIATION_KINDS: [AssociationKind; 3] = [
    AssociationKind::InputSource,
    AssociationKind::Application,
    AssociationKind::RemoteKey,
];

// ------------------------------------------------------------------------------------------------
// Emit various ManagerOutputMessages to the caller.
// ------------------------------------------------------------------------------------------------

impl SonyTvManager {
    /// Emit the manager status, TV state, and association tables to the caller.
    pub(crate) async fn emit_all_state(&mut self) {
        self.emit_manager_status().await;

        if let Some(tv_state) = self.tv_state().cloned() {
            let _ = self
                .send_out(ManagerOutputMessage::TvState(tv_state.clone()))
                .await;
            self.last_sent_tv_state = Some(tv_state);
        }

        self.emit_all_associations().await;
    }

    /// Send the current `ManagerStatus` to the caller.
    pub(crate) async fn emit_manager_status(&self) {
        let _ = self
            .send_out(ManagerOutputMessage::Status(self.manager_status.clone()))
            .await;
    }

    /// Send the current `TvState` to the caller if it differs from what was last sent.
    pub(crate) async fn emit_tv_state_if_changed(&mut self) {
        let Some(tv_state) = self.tv_state().cloned() else {
            return;
        };

        if self.last_sent_tv_state.as_ref() == Some(&tv_state) {
            return;
        }

        let _ = self
            .send_out(ManagerOutputMessage::TvState(tv_state.clone()))
            .await;
        self.last_sent_tv_state = Some(tv_state);
    }

    /// Send an association table to the caller.
    pub(crate) async fn emit_associations(&self, kind: AssociationKind, table: AssociationTable) {
        let _ = self
            .send_out(ManagerOutputMessage::Associations(kind, table))
            .await;
    }

    /// Send the association tables of all cached device lists. Lists not yet known are sent as
    /// sentinel-only tables.
    pub(crate) async fn emit_all_associations(&self) {
        for kind in ALL_ASSOCIATION_KINDS {
            let table = match &self.reconciler {
                Some(reconciler) => reconciler.association_table(kind),
                None => build_association_table::<SourceItem>(kind, &[], 1),
            };

            self.emit_associations(kind, table).await;
        }
    }
}
