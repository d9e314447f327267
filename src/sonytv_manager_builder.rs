use std::path::PathBuf;
use std::sync::Arc;

use log::debug;
use tokio::sync::mpsc::Receiver;

use crate::discovery::DescriptorFetcher;
use crate::store::KeyValueStore;
use crate::transport::Transport;
use crate::tv_network_check::Pinger;
use crate::{ManagerMessage, ManagerOutputMessage, SonyTvManager};

/// Build a [`SonyTvManager`] instance.
///
/// ```
/// use std::path::Path;
///
/// use sonytv_manager::SonyTvManagerBuilder;
/// use tokio::sync::mpsc;
///
/// let (to_manager_tx, to_manager_rx) = mpsc::channel(32);
///
/// let (mut manager, mut from_manager_rx) = SonyTvManagerBuilder::new(to_manager_rx)
///     .with_data_dir(Path::new("/data/file/path/test").to_path_buf())
///     .build();
/// ```
pub struct SonyTvManagerBuilder {
    manager: SonyTvManager,
    out_channel: Receiver<ManagerOutputMessage>,
}

impl SonyTvManagerBuilder {
    pub fn new(command_receiver: Receiver<ManagerMessage>) -> Self {
        debug!("Builder is instantiating a SonyTvManager instance");
        let (manager, out_channel) = SonyTvManager::new(command_receiver);

        SonyTvManagerBuilder {
            manager,
            out_channel,
        }
    }

    /// Override the default persisted data directory (where the cached device lists and last
    /// power state are stored).
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        debug!("Builder is overriding data_dir: {:?}", data_dir);

        self.manager.data_dir = Some(data_dir);

        self
    }

    /// Persist into `store` instead of a file in the data directory. The store belongs to the
    /// first configured TV; TVs configured later (at another host) get a volatile store.
    pub fn with_store(mut self, store: Box<dyn KeyValueStore>) -> Self {
        debug!("Builder is overriding the persisted store");

        self.manager.store = Some(store);

        self
    }

    /// Send all TV calls over `transport` instead of HTTP.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        debug!("Builder is overriding the TV transport");

        self.manager.transport = Some(transport);

        self
    }

    /// Check TV reachability with `pinger` instead of ICMP.
    pub fn with_pinger(mut self, pinger: Arc<dyn Pinger>) -> Self {
        debug!("Builder is overriding the network pinger");

        self.manager.pinger = Some(pinger);

        self
    }

    /// Retrieve the device descriptions of caller-supplied SSDP announcements with `fetcher`.
    pub fn with_descriptor_fetcher(mut self, fetcher: Arc<dyn DescriptorFetcher>) -> Self {
        debug!("Builder is overriding the device description fetcher");

        self.manager.descriptor_fetcher = Some(fetcher);

        self
    }

    pub fn build(self) -> (SonyTvManager, Receiver<ManagerOutputMessage>) {
        (self.manager, self.out_channel)
    }
}
