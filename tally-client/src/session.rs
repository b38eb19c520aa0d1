//! The authoritative session for a running client.
//!
//! [`SessionController`] is the only writer of the [`Session`] value.
//! Readers get a snapshot through [`SessionController::current`] or a
//! [`watch::Receiver`] through [`SessionController::subscribe`].
//!
//! Every `refresh` and `sign_out` takes a new epoch. A refresh publishes
//! its outcome only if no later operation has started, so a slow identity
//! fetch can never overwrite a newer sign-out or a newer refresh.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tally_core::Session;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::ClientResult;
use crate::gateway_client::GatewayClient;
use crate::token_store::TokenStore;

struct Inner {
    client: GatewayClient,
    state: watch::Sender<Session>,
    epoch: Mutex<u64>,
}

#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// A controller in the initial `Loading` state. Call
    /// [`SessionController::refresh`] to settle it.
    pub fn new(client: GatewayClient) -> Self {
        let (state, _) = watch::channel(Session::loading());
        Self {
            inner: Arc::new(Inner {
                client,
                state,
                epoch: Mutex::new(0),
            }),
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        self.inner.client.tokens()
    }

    pub fn current(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Re-derive the session from the token store and the backend.
    ///
    /// Returns the session as published once this call settles, which is
    /// a later operation's result if this refresh was superseded.
    pub async fn refresh(&self) -> Session {
        let epoch = self.begin(Session::loading());
        debug!(epoch, "Session refresh started");

        if !self.tokens().is_valid() {
            debug!(epoch, "No valid token; session is anonymous");
            return self.settle(epoch, Session::anonymous());
        }

        let outcome = match self.inner.client.fetch_identity().await {
            Ok(identity) => Session::authenticated(identity),
            Err(err) => {
                warn!(epoch, error = %err, "Identity fetch failed; session is anonymous");
                Session::anonymous_with_error(err.to_string())
            }
        };
        self.settle(epoch, outcome)
    }

    /// Forget the local session. Makes no network call.
    pub fn sign_out(&self) {
        let mut epoch = self.lock_epoch();
        *epoch += 1;
        if let Err(err) = self.tokens().clear() {
            warn!(error = %err, "Failed to clear token store on sign-out");
        }
        self.inner.state.send_replace(Session::anonymous());
        debug!(epoch = *epoch, "Signed out");
    }

    /// Log in, persist the token, then refresh.
    ///
    /// A failed login leaves the token store and the session untouched.
    pub async fn sign_in(&self, identifier: &str, secret: &str) -> ClientResult<Session> {
        let record = self.inner.client.login(identifier, secret).await?;
        self.tokens().set_record(&record)?;
        Ok(self.refresh().await)
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.inner
            .epoch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, session: Session) -> u64 {
        let mut epoch = self.lock_epoch();
        *epoch += 1;
        self.inner.state.send_replace(session);
        *epoch
    }

    fn settle(&self, started: u64, session: Session) -> Session {
        let epoch = self.lock_epoch();
        if *epoch == started {
            debug!(epoch = started, status = ?session.status, "Session settled");
            self.inner.state.send_replace(session.clone());
            session
        } else {
            debug!(
                started,
                current = *epoch,
                "Dropping superseded session refresh"
            );
            self.current()
        }
    }
}
