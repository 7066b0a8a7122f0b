use std::net::SocketAddr;
use std::sync::Arc;

use osd_messenger::{Inbox, Messenger, TcpMessenger};
use osd_protocol::OsdCodec;
use osd_store::{FileObjectStore, InMemoryObjectStore, ObjectStore};
use tracing::info;

use crate::config::{OsdConfig, StoreBackend};
use crate::dispatcher::{DispatchOutcome, DispatchStats, Osd};
use crate::error::OsdResult;

/// A daemon bound to a TCP port: store opened, messenger listening.
pub struct OsdServer {
    osd: Osd,
    messenger: Arc<TcpMessenger>,
    inbox: Inbox,
}

impl OsdServer {
    /// Open the configured store and bind the messenger.
    pub async fn bind(config: &OsdConfig) -> OsdResult<Self> {
        config.validate()?;
        let store: Arc<dyn ObjectStore> = match config.store {
            StoreBackend::Memory => Arc::new(InMemoryObjectStore::new()),
            StoreBackend::File => Arc::new(FileObjectStore::open(&config.data_dir, config.whoami)?),
        };
        let codec = OsdCodec::new(config.max_message_size);
        let (messenger, inbox) =
            TcpMessenger::bind(config.bind_addr, config.local_peer_addr(), codec).await?;

        let osd = Osd::new(config.identity(), store, messenger.clone())
            .with_liveness(config.liveness_policy())
            .with_max_message_size(config.max_message_size);
        info!(
            osd = config.whoami,
            addr = %messenger.bound_addr(),
            store = ?config.store,
            "osd bound"
        );
        Ok(Self {
            osd,
            messenger,
            inbox,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.messenger.bound_addr()
    }

    /// Handle for stopping the server from outside the dispatch loop.
    pub fn messenger(&self) -> Arc<TcpMessenger> {
        Arc::clone(&self.messenger)
    }

    /// Dispatch inbound messages one at a time until a Shutdown message
    /// arrives or the messenger is shut down externally.
    pub async fn serve(mut self) -> OsdResult<DispatchStats> {
        info!(osd = self.osd.whoami().get(), "osd serving");
        while let Some(envelope) = self.inbox.recv().await {
            if self.osd.dispatch(envelope) == DispatchOutcome::Shutdown {
                break;
            }
        }
        self.messenger.shutdown();
        let stats = self.osd.stats();
        info!(
            received = stats.received,
            replied = stats.replied,
            failed = stats.failed,
            dropped = stats.dropped,
            "osd stopped"
        );
        Ok(stats)
    }
}
