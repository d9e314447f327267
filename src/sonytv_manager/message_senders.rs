use log::warn;
use tokio::sync::mpsc::Sender;

use crate::ManagerOutputMessage;

use super::SonyTvManager;

// ------------------------------------------------------------------------------------------------
// Send messages to the caller.
// ------------------------------------------------------------------------------------------------

impl SonyTvManager {
    /// Send a `ManagerOutputMessage` back to the caller.
    pub(crate) async fn send_out(&self, message: ManagerOutputMessage) -> Result<(), ()> {
        SonyTvManager::send_out_with_sender(&self.output_tx, message).await
    }

    /// Send a `ManagerOutputMessage` back to the caller using the given `sender`. Used by tasks
    /// which outlive a borrow of the manager.
    pub(crate) async fn send_out_with_sender(
        sender: &Sender<ManagerOutputMessage>,
        message: ManagerOutputMessage,
    ) -> Result<(), ()> {
        sender.send(message).await.map_err(|_| {
            warn!("Output channel unexpectedly closed");
        })
    }
}
