//! Chatline server.
//!
//! A line-oriented chat server over TCP. Clients register an account, log in
//! under it, then exchange room-wide messages and private whispers with every
//! other logged-in client.
//!
//! # Architecture
//!
//! Every accepted socket gets one Tokio task running the connection state
//! machine ([`handler`]) and one writer task draining that connection's
//! outbound queue ([`outbound`]). The tasks share three services:
//!
//! - [`AccountStore`]: registered identities, loaded from and appended to an
//!   [`AccountStorage`] backend
//! - [`SessionRegistry`]: which identities are logged in, and their queues
//! - [`MessageRouter`]: broadcast and whisper fan-out over the registry
//!
//! No connection ever writes to another connection's socket; cross-session
//! traffic only ever passes through the recipient's bounded queue.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod accounts;
mod error;
pub mod handler;
pub mod line_codec;
pub mod outbound;
mod registry;
mod router;
pub mod storage;

use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

pub use accounts::{AccountRecord, AccountStore, AuthError, RegisterError};
pub use error::ServerError;
pub use handler::{ConnectionContext, ConnectionState, serve_connection};
pub use outbound::{Delivery, OutboundHandle};
pub use registry::{SessionError, SessionRegistry};
pub use router::{MessageRouter, WhisperOutcome};
pub use storage::{AccountStorage, FileStorage, MemoryStorage, StorageError};
use tokio::{net::TcpListener, sync::Semaphore};
use tracing::Instrument;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:59001")
    pub bind_address: String,
    /// Account file, created on first registration
    pub accounts_path: PathBuf,
    /// Maximum concurrent connections; further accepts wait for a slot
    pub max_connections: usize,
    /// Lines queued per session before it is treated as stalled
    pub outbound_capacity: usize,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", chatline_proto::DEFAULT_PORT),
            accounts_path: PathBuf::from("accounts.dat"),
            max_connections: 500,
            outbound_capacity: 256,
        }
    }
}

impl ServerRuntimeConfig {
    fn validate(&self) -> Result<(), ServerError> {
        if self.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be positive".to_string()));
        }
        if self.outbound_capacity == 0 {
            return Err(ServerError::Config("outbound_capacity must be positive".to_string()));
        }
        Ok(())
    }
}

/// Production chat server.
///
/// Owns the listening socket and the shared services. `S` is the account
/// storage backend.
pub struct Server<S: AccountStorage = FileStorage> {
    listener: TcpListener,
    accounts: Arc<AccountStore<S>>,
    registry: Arc<SessionRegistry>,
    config: ServerRuntimeConfig,
}

impl Server<FileStorage> {
    /// Load accounts from `config.accounts_path` and bind.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let storage = FileStorage::new(config.accounts_path.clone());
        Self::with_storage(config, storage).await
    }
}

impl<S: AccountStorage> Server<S> {
    /// Load accounts from `storage` and bind.
    ///
    /// Accounts are fully loaded before the socket starts listening.
    pub async fn with_storage(
        config: ServerRuntimeConfig,
        storage: S,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let accounts = AccountStore::load(storage)?;
        tracing::info!(accounts = accounts.len(), "account store loaded");

        let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
            ServerError::Config(format!("failed to bind {}: {}", config.bind_address, e))
        })?;

        Ok(Self {
            listener,
            accounts: Arc::new(accounts),
            registry: Arc::new(SessionRegistry::new()),
            config,
        })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared account store.
    pub fn accounts(&self) -> Arc<AccountStore<S>> {
        Arc::clone(&self.accounts)
    }

    /// Shared session registry.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until the task is dropped.
    ///
    /// Accept errors are logged and the loop continues. Each connection runs
    /// in its own task; a failure in one never reaches another.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.local_addr()?);

        let ctx = ConnectionContext {
            accounts: Arc::clone(&self.accounts),
            router: MessageRouter::new(Arc::clone(&self.registry)),
            registry: Arc::clone(&self.registry),
            outbound_capacity: self.config.outbound_capacity,
        };
        let limit = Arc::new(Semaphore::new(self.config.max_connections));
        let next_session_id = AtomicU64::new(1);

        loop {
            let permit = Arc::clone(&limit)
                .acquire_owned()
                .await
                .map_err(|e| ServerError::Internal(format!("connection limiter closed: {e}")))?;

            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                    continue;
                },
            };

            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(%peer, error = %e, "failed to disable Nagle");
            }

            let session_id = next_session_id.fetch_add(1, Ordering::Relaxed);
            let ctx = ctx.clone();
            let span = tracing::info_span!("connection", session_id, %peer);

            tokio::spawn(
                async move {
                    tracing::debug!("connection accepted");
                    let (reader, writer) = stream.into_split();

                    if let Err(e) = serve_connection(session_id, reader, writer, ctx).await {
                        tracing::debug!("Connection error: {}", e);
                    }

                    drop(permit);
                    tracing::debug!("connection finished");
                }
                .instrument(span),
            );
        }
    }
}
