//! Remote collaborator abstraction
//!
//! The store never talks HTTP itself. Effects call into a [`RemoteClient`],
//! which returns typed entities and page cursors or a [`RemoteError`]. The
//! production implementation is [`http::MastodonClient`]; [`mock::MockRemote`]
//! scripts responses for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::pagination::{Page, PageRequest};
use crate::types::{Account, Notification, Status};

pub mod http;

// Available outside cfg(test) so integration tests and the CLI's dry runs can use it
pub mod mock;

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// OAuth application registered on an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRegistration {
    pub client_id: String,
    pub client_secret: String,
}

/// Credentials for authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub instance: String,
    pub access_token: String,
}

impl Session {
    pub fn new(instance: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            access_token: access_token.into(),
        }
    }
}

/// Status collections that can be paged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatusSource {
    Home,
    Favourites,
    /// Statuses posted by the account with this id
    Account(String),
}

/// Account collections that can be paged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccountSource {
    Followers(String),
    Following(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Favourite(bool),
    Reblog(bool),
}

/// Remote API used by effects.
///
/// Every method either yields typed values or a [`RemoteError`]; transport
/// details stay behind this trait.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Register this client as an OAuth application on `instance`.
    async fn register_app(&self, instance: &str) -> RemoteResult<AppRegistration>;

    /// URL the user opens to authorize the application.
    fn authorization_url(&self, instance: &str, app: &AppRegistration) -> RemoteResult<String>;

    /// Trade an authorization code for an access token.
    async fn exchange_code(
        &self,
        instance: &str,
        app: &AppRegistration,
        code: &str,
    ) -> RemoteResult<String>;

    /// The account owning the session's token.
    async fn verify_credentials(&self, session: &Session) -> RemoteResult<Account>;

    async fn fetch_account(&self, session: &Session, account_id: &str) -> RemoteResult<Account>;

    async fn fetch_statuses(
        &self,
        session: &Session,
        source: &StatusSource,
        request: &PageRequest,
    ) -> RemoteResult<Page<Status>>;

    async fn fetch_accounts(
        &self,
        session: &Session,
        source: &AccountSource,
        request: &PageRequest,
    ) -> RemoteResult<Page<Account>>;

    async fn fetch_notifications(
        &self,
        session: &Session,
        request: &PageRequest,
    ) -> RemoteResult<Page<Notification>>;

    async fn fetch_pinned(
        &self,
        session: &Session,
        account_id: &str,
        limit: usize,
    ) -> RemoteResult<Vec<Status>>;

    /// Apply a favourite or reblog change and return the updated status.
    ///
    /// The returned status is always the one identified by `status_id`, never
    /// a boost wrapper around it.
    async fn update_status(
        &self,
        session: &Session,
        status_id: &str,
        change: StatusChange,
    ) -> RemoteResult<Status>;
}
