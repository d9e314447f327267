use log::debug;

use crate::ManagerStatus;

use super::SonyTvManager;

// ------------------------------------------------------------------------------------------------
// Various SonyTvManager state setters.
// ------------------------------------------------------------------------------------------------

impl SonyTvManager {
    /// Update the current manager status and announce the change to the caller.
    pub(crate) async fn set_manager_status(&mut self, status: ManagerStatus) {
        if status == self.manager_status {
            return;
        }

        debug!("Manager status: {:?} -> {:?}", &self.manager_status, &status);

        self.manager_status = status;
        self.emit_manager_status().await;
    }
}
