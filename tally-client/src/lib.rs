//! Tally Client
//!
//! Front-end plumbing for talking to the Tally backend in token store mode:
//!
//! - [`TokenStore`]: sole owner of the persisted access token
//! - [`GatewayClient`]: bearer-authenticated HTTP calls
//! - [`SessionController`]: the one authoritative [`tally_core::Session`]
//! - [`Resources`]: cached reads and cache-invalidating mutations
//!
//! [`TallyClient`] wires all of them from a [`ClientConfig`].

pub mod config;
pub mod error;
pub mod gateway_client;
pub mod resources;
pub mod session;
pub mod token_store;

pub use config::{CacheSettings, ClientConfig, ConfigError, TokenStoreConfig};
pub use error::{ClientError, ClientResult};
pub use gateway_client::{GatewayClient, LoginResponse};
pub use resources::Resources;
pub use session::SessionController;
pub use token_store::{FileStore, KeyValueStore, MemoryStore, TokenStore, TokenStoreError};

use tally_cache::ResourceCache;
use tally_core::Session;

/// Everything a front end needs, sharing one token store and one HTTP
/// client.
#[derive(Clone)]
pub struct TallyClient {
    session: SessionController,
    resources: Resources,
}

impl TallyClient {
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        config
            .validate()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        let tokens = TokenStore::from_config(&config.token_store);
        let gateway = GatewayClient::new(config, tokens)?;
        let cache = ResourceCache::new(gateway.clone(), config.cache.to_cache_config());
        Ok(Self {
            session: SessionController::new(gateway.clone()),
            resources: Resources::new(gateway, cache),
        })
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Sign out and drop every cached collection.
    ///
    /// The cache is cleared whatever the session state was, including a
    /// session that never learned its tenants.
    pub fn sign_out(&self) -> Session {
        self.session.sign_out();
        self.resources.cache().clear();
        self.session.current()
    }
}
